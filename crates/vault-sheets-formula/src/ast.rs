//! Formula Abstract Syntax Tree types

use vault_sheets_core::{CellAddress, CellRange, ErrorCode};

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    Number(f64),
    String(String),
    Boolean(bool),
    Error(ErrorCode),

    // === References ===
    CellRef(CellReference),
    RangeRef(RangeReference),
    /// Defined name; workbooks carry none, so these evaluate to #NAME?
    NameRef(String),

    // === Operators ===
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },

    // === Array ===
    Array(Vec<Vec<FormulaExpr>>),
}

impl FormulaExpr {
    /// Every cell and range the expression reads, in source order.
    ///
    /// Ranges are kept whole. References qualified with a sheet name point
    /// outside the single grid and are skipped.
    pub fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references(&self, refs: &mut Vec<Reference>) {
        match self {
            FormulaExpr::CellRef(cell_ref) if cell_ref.sheet.is_none() => {
                refs.push(Reference::Cell(cell_ref.address))
            }
            FormulaExpr::RangeRef(range_ref) if range_ref.sheet.is_none() => {
                refs.push(Reference::Range(range_ref.range))
            }
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.collect_references(refs);
                right.collect_references(refs);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.collect_references(refs),
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.collect_references(refs);
                }
            }
            FormulaExpr::Array(rows) => {
                for cell in rows.iter().flatten() {
                    cell.collect_references(refs);
                }
            }
            FormulaExpr::CellRef(_)
            | FormulaExpr::RangeRef(_)
            | FormulaExpr::Number(_)
            | FormulaExpr::String(_)
            | FormulaExpr::Boolean(_)
            | FormulaExpr::Error(_)
            | FormulaExpr::NameRef(_) => {}
        }
    }
}

/// A precedent read by a formula
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Cell(CellAddress),
    Range(CellRange),
}

/// Cell reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub address: CellAddress,
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub range: CellRange,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,

    // Range between two non-reference operands
    Range,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Percent,
}

#[cfg(test)]
mod tests {
    use super::Reference;
    use crate::parse_formula;
    use vault_sheets_core::{CellAddress, CellRange};

    #[test]
    fn test_references() {
        let refs = parse_formula("=A1").unwrap().references();
        assert_eq!(refs, vec![Reference::Cell(CellAddress::new(0, 0))]);

        let refs = parse_formula("=SUM(A1:A1048576)").unwrap().references();
        assert_eq!(
            refs,
            vec![Reference::Range(CellRange::parse("A1:A1048576").unwrap())]
        );

        let refs = parse_formula("=A1+B2*C3").unwrap().references();
        assert_eq!(refs.len(), 3);

        let refs = parse_formula("=Other!A1+1").unwrap().references();
        assert!(refs.is_empty());
    }
}
