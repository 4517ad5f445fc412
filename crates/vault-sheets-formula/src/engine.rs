//! The recalculating engine behind [`EvaluationEngine`]
//!
//! Holds a sparse grid of literals and parsed formulas. Every write batch
//! triggers a full recalculation in dependency order.

use crate::ast::{FormulaExpr, Reference};
use crate::dependency::DependencyGraph;
use crate::error::FormulaError;
use crate::evaluator::{evaluate, CellSource, EvaluationContext, FormulaValue};
use crate::parser::parse_formula;
use ahash::AHashMap;
use thiserror::Error;
use vault_sheets_core::{
    CellAddress, CellContent, CellRange, CellWrite, EngineErrorValue, EngineValue, ErrorCode,
    EvaluationEngine,
};

/// Engine behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Reject a write batch containing an unparsable formula. When off, the
    /// cell is kept and evaluates to `#ERROR!`.
    pub strict: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Errors raised by [`FormulaEngine::write`]
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid formula in {address}: {source}")]
    InvalidFormula {
        address: CellAddress,
        #[source]
        source: FormulaError,
    },
}

#[derive(Debug, Clone)]
enum Slot {
    Literal(FormulaValue),
    Formula(FormulaExpr),
    /// Unparsable formula kept in lenient mode
    Broken(String),
}

#[derive(Debug, Clone)]
struct Computed {
    value: FormulaValue,
    message: Option<String>,
}

impl Computed {
    fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            value: FormulaValue::Error(code),
            message: Some(message.into()),
        }
    }
}

/// A spreadsheet formula engine over a single grid
#[derive(Debug, Default)]
pub struct FormulaEngine {
    options: EngineOptions,
    cells: AHashMap<CellAddress, Slot>,
    graph: DependencyGraph,
    /// Bounding box of `cells`
    extent: Option<CellRange>,
    computed: AHashMap<CellAddress, Computed>,
}

impl FormulaEngine {
    /// Create an empty engine with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty engine
    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn stage(&self, write: &CellWrite) -> Result<Option<Slot>, EngineError> {
        let slot = match &write.content {
            CellContent::Empty => None,
            CellContent::Literal(value) => Some(Slot::Literal(value.clone().into())),
            CellContent::Formula(text) => match parse_formula(text) {
                Ok(ast) => Some(Slot::Formula(ast)),
                Err(source) if self.options.strict => {
                    return Err(EngineError::InvalidFormula {
                        address: write.address,
                        source,
                    })
                }
                Err(e) => {
                    tracing::warn!(address = %write.address, error = %e, "keeping unparsable formula");
                    Some(Slot::Broken(e.to_string()))
                }
            },
        };
        Ok(slot)
    }

    fn apply(&mut self, address: CellAddress, slot: Option<Slot>) {
        match slot {
            Some(slot) => {
                self.cells.insert(address, slot);
            }
            None => {
                self.cells.remove(&address);
            }
        }
    }

    /// Re-derive every edge from the current cells
    ///
    /// A range contributes one edge per populated cell inside it, never one
    /// per address it spans.
    fn rebuild_graph(&mut self) {
        self.graph.clear();
        self.extent = self
            .cells
            .keys()
            .map(|address| CellRange::single(*address))
            .reduce(|a, b| a.union(&b));

        for (address, slot) in &self.cells {
            let Slot::Formula(ast) = slot else {
                continue;
            };
            for reference in ast.references() {
                match reference {
                    Reference::Cell(precedent) => self.graph.add_dependency(precedent, *address),
                    Reference::Range(range) => {
                        for precedent in self.cells.keys().filter(|c| range.contains(c)) {
                            self.graph.add_dependency(*precedent, *address);
                        }
                    }
                }
            }
        }
    }

    /// Evaluate every formula cell from scratch
    fn recalculate(&mut self) {
        self.computed.clear();

        let formulas: Vec<CellAddress> = self
            .cells
            .iter()
            .filter(|(_, slot)| !matches!(slot, Slot::Literal(_)))
            .map(|(address, _)| *address)
            .collect();

        for address in self.graph.circular_cells() {
            if matches!(self.cells.get(&address), Some(Slot::Formula(_))) {
                tracing::debug!(address = %address, "circular reference");
                self.computed.insert(
                    address,
                    Computed::error(ErrorCode::Ref, FormulaError::CircularReference.to_string()),
                );
            }
        }

        for address in self.graph.evaluation_order(&formulas) {
            if self.computed.contains_key(&address) {
                continue;
            }

            let result = match self.cells.get(&address) {
                Some(Slot::Formula(ast)) => {
                    let view = GridView {
                        cells: &self.cells,
                        computed: &self.computed,
                        extent: self.extent,
                    };
                    let ctx = EvaluationContext::new(&view, address);
                    match evaluate(ast, &ctx) {
                        Ok(FormulaValue::Array(_)) => Computed::error(
                            ErrorCode::Value,
                            "formula produced an array where a single value was expected",
                        ),
                        Ok(value) => Computed {
                            value,
                            message: None,
                        },
                        Err(e) => {
                            tracing::debug!(address = %address, error = %e, "formula evaluation failed");
                            Computed::error(e.error_code(), e.to_string())
                        }
                    }
                }
                Some(Slot::Broken(message)) => Computed::error(ErrorCode::Error, message.clone()),
                Some(Slot::Literal(_)) | None => continue,
            };

            self.computed.insert(address, result);
        }

        tracing::debug!(
            cells = self.cells.len(),
            formulas = formulas.len(),
            "recalculated"
        );
    }
}

/// Read-only view of the grid during recalculation
struct GridView<'a> {
    cells: &'a AHashMap<CellAddress, Slot>,
    computed: &'a AHashMap<CellAddress, Computed>,
    extent: Option<CellRange>,
}

impl CellSource for GridView<'_> {
    fn value(&self, address: CellAddress) -> FormulaValue {
        if let Some(computed) = self.computed.get(&address) {
            return computed.value.clone();
        }
        match self.cells.get(&address) {
            Some(Slot::Literal(value)) => value.clone(),
            _ => FormulaValue::Empty,
        }
    }

    fn extent(&self) -> Option<CellRange> {
        self.extent
    }
}

/// Fallback explanation for error values that carry no specific message
fn describe(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::Ref => "reference to a cell that cannot be resolved",
        ErrorCode::Div0 => "division by zero",
        ErrorCode::Value => "wrong type of argument or operand",
        ErrorCode::Name => "unrecognized function or name",
        ErrorCode::Na => "value not available",
        ErrorCode::Num => "invalid numeric value",
        ErrorCode::Error => "formula could not be evaluated",
    }
}

fn to_engine_value(value: &FormulaValue, message: Option<&str>) -> EngineValue {
    match value {
        FormulaValue::Empty => EngineValue::Empty,
        FormulaValue::Number(n) => EngineValue::Number(*n),
        FormulaValue::String(s) => EngineValue::Text(s.clone()),
        FormulaValue::Boolean(b) => EngineValue::Boolean(*b),
        FormulaValue::Error(code) => EngineValue::Error(EngineErrorValue {
            code: code.as_str().to_string(),
            message: message.unwrap_or_else(|| describe(*code)).to_string(),
        }),
        FormulaValue::Array(_) => to_engine_value(&FormulaValue::Error(ErrorCode::Value), None),
    }
}

impl EvaluationEngine for FormulaEngine {
    type Error = EngineError;

    fn write(&mut self, writes: &[CellWrite]) -> Result<(), EngineError> {
        // Parse everything first so a rejected batch leaves the grid untouched
        let staged = writes
            .iter()
            .map(|w| Ok((w.address, self.stage(w)?)))
            .collect::<Result<Vec<_>, EngineError>>()?;

        for (address, slot) in staged {
            self.apply(address, slot);
        }

        self.rebuild_graph();
        self.recalculate();
        Ok(())
    }

    fn read(&self, address: CellAddress) -> EngineValue {
        if let Some(computed) = self.computed.get(&address) {
            return to_engine_value(&computed.value, computed.message.as_deref());
        }
        match self.cells.get(&address) {
            Some(Slot::Literal(value)) => to_engine_value(value, None),
            _ => EngineValue::Empty,
        }
    }
}
