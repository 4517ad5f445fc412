//! Dependency tracking for formula recalculation

use ahash::{AHashMap, AHashSet};
use vault_sheets_core::CellAddress;

/// Dependency graph for formula cells
///
/// Tracks which cells each formula reads, so that the grid can be
/// recalculated in dependency order.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Cell → Cells it depends on (precedents)
    precedents: AHashMap<CellAddress, AHashSet<CellAddress>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: CellAddress, dependent: CellAddress) {
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Get cells that the given cell depends on
    pub fn get_precedents(&self, cell: CellAddress) -> impl Iterator<Item = CellAddress> + '_ {
        self.precedents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Order `cells` so that every cell comes after its precedents
    ///
    /// Only cells in `cells` appear in the result. Cells on a cycle are still
    /// emitted (in an arbitrary position); use [`Self::circular_cells`] to
    /// find them first.
    pub fn evaluation_order(&self, cells: &[CellAddress]) -> Vec<CellAddress> {
        let wanted: AHashSet<CellAddress> = cells.iter().copied().collect();
        let mut result = Vec::with_capacity(cells.len());
        let mut visited = AHashSet::new();

        // Sorted roots keep the order stable between runs
        let mut roots = cells.to_vec();
        roots.sort();

        for cell in roots {
            self.visit_precedents(cell, &wanted, &mut result, &mut visited);
        }

        result
    }

    /// Post-order DFS over precedents, with an explicit stack so deep
    /// chains cannot overflow the call stack
    fn visit_precedents(
        &self,
        root: CellAddress,
        wanted: &AHashSet<CellAddress>,
        result: &mut Vec<CellAddress>,
        visited: &mut AHashSet<CellAddress>,
    ) {
        if !visited.insert(root) {
            return;
        }

        let mut stack = vec![(root, self.sorted_precedents(root))];

        while let Some((cell, pending)) = stack.last_mut() {
            match pending.pop() {
                Some(next) => {
                    if visited.insert(next) {
                        let children = self.sorted_precedents(next);
                        stack.push((next, children));
                    }
                }
                None => {
                    let cell = *cell;
                    stack.pop();
                    if wanted.contains(&cell) {
                        result.push(cell);
                    }
                }
            }
        }
    }

    /// Precedents in reverse address order, so popping yields ascending order
    fn sorted_precedents(&self, cell: CellAddress) -> Vec<CellAddress> {
        let mut precedents: Vec<CellAddress> = self.get_precedents(cell).collect();
        precedents.sort_by(|a, b| b.cmp(a));
        precedents
    }

    /// Every cell that lies on a dependency cycle
    ///
    /// Tarjan's strongly connected components: a component of more than one
    /// cell, or a cell that references itself, is circular.
    pub fn circular_cells(&self) -> AHashSet<CellAddress> {
        let mut tarjan = Tarjan::default();
        let mut nodes: Vec<CellAddress> = self.precedents.keys().copied().collect();
        nodes.sort();

        for node in nodes {
            if !tarjan.index.contains_key(&node) {
                tarjan.run(self, node);
            }
        }

        let mut circular = AHashSet::new();
        for component in tarjan.components {
            if component.len() > 1 {
                circular.extend(component);
            } else if let Some(&cell) = component.first() {
                if self.get_precedents(cell).any(|p| p == cell) {
                    circular.insert(cell);
                }
            }
        }
        circular
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.precedents.clear();
    }
}

#[derive(Default)]
struct Tarjan {
    next_index: usize,
    index: AHashMap<CellAddress, usize>,
    lowlink: AHashMap<CellAddress, usize>,
    on_stack: AHashSet<CellAddress>,
    stack: Vec<CellAddress>,
    components: Vec<Vec<CellAddress>>,
}

impl Tarjan {
    /// Iterative form of the classic recursive algorithm
    fn run(&mut self, graph: &DependencyGraph, root: CellAddress) {
        let mut work: Vec<(CellAddress, Vec<CellAddress>)> = Vec::new();
        self.open(root);
        work.push((root, graph.get_precedents(root).collect()));

        while let Some((cell, pending)) = work.last_mut() {
            let cell = *cell;
            if let Some(next) = pending.pop() {
                if !self.index.contains_key(&next) {
                    self.open(next);
                    work.push((next, graph.get_precedents(next).collect()));
                } else if self.on_stack.contains(&next) {
                    let low = self.lowlink[&cell].min(self.index[&next]);
                    self.lowlink.insert(cell, low);
                }
                continue;
            }

            work.pop();
            if let Some((parent, _)) = work.last() {
                let low = self.lowlink[parent].min(self.lowlink[&cell]);
                self.lowlink.insert(*parent, low);
            }

            if self.lowlink[&cell] == self.index[&cell] {
                let mut component = Vec::new();
                while let Some(member) = self.stack.pop() {
                    self.on_stack.remove(&member);
                    component.push(member);
                    if member == cell {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }

    fn open(&mut self, cell: CellAddress) {
        self.index.insert(cell, self.next_index);
        self.lowlink.insert(cell, self.next_index);
        self.next_index += 1;
        self.stack.push(cell);
        self.on_stack.insert(cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    #[test]
    fn test_add_dependency() {
        let mut graph = DependencyGraph::new();

        let a1 = addr("A1");
        let b1 = addr("B1");

        graph.add_dependency(a1, b1);
        graph.add_dependency(a1, b1);

        assert_eq!(graph.get_precedents(b1).collect::<Vec<_>>(), vec![a1]);
        assert_eq!(graph.get_precedents(a1).count(), 0);

        graph.clear();
        assert_eq!(graph.get_precedents(b1).count(), 0);
    }

    #[test]
    fn test_evaluation_order() {
        let mut graph = DependencyGraph::new();

        // C1 = A1 + B1, B1 = A1, D1 = C1
        graph.add_dependency(addr("A1"), addr("C1"));
        graph.add_dependency(addr("B1"), addr("C1"));
        graph.add_dependency(addr("A1"), addr("B1"));
        graph.add_dependency(addr("C1"), addr("D1"));

        let order = graph.evaluation_order(&[addr("D1"), addr("C1"), addr("B1")]);
        assert_eq!(order, vec![addr("B1"), addr("C1"), addr("D1")]);
    }

    #[test]
    fn test_circular_reference() {
        let mut graph = DependencyGraph::new();

        let a1 = addr("A1");
        let b1 = addr("B1");
        let c1 = addr("C1");
        let d1 = addr("D1");

        // A1 -> B1 -> C1 -> A1 (circular), D1 depends on the cycle but is not on it
        graph.add_dependency(a1, b1);
        graph.add_dependency(b1, c1);
        graph.add_dependency(c1, a1);
        graph.add_dependency(c1, d1);

        let circular = graph.circular_cells();
        assert!(circular.contains(&a1));
        assert!(circular.contains(&b1));
        assert!(circular.contains(&c1));
        assert!(!circular.contains(&d1));
    }

    #[test]
    fn test_self_reference() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency(addr("A1"), addr("A1"));
        graph.add_dependency(addr("A2"), addr("A3"));

        let circular = graph.circular_cells();
        assert_eq!(circular.len(), 1);
        assert!(circular.contains(&addr("A1")));
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let mut graph = DependencyGraph::new();
        let cells: Vec<CellAddress> = (0..50_000).map(|r| CellAddress::new(r, 0)).collect();
        for pair in cells.windows(2) {
            graph.add_dependency(pair[0], pair[1]);
        }

        let order = graph.evaluation_order(&cells[1..]);
        assert_eq!(order.len(), cells.len() - 1);
        assert_eq!(order[0], cells[1]);
        assert!(graph.circular_cells().is_empty());
    }
}
