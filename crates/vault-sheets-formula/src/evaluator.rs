//! Formula evaluator
//!
//! Evaluates formula ASTs against a [`CellSource`] to produce values.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;
use std::cmp::Ordering;
use std::sync::OnceLock;
use vault_sheets_core::{CellAddress, CellRange, ErrorCode, EvaluatedValue, LiteralValue};

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

fn get_function_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(ErrorCode),
    Array(Vec<Vec<FormulaValue>>),
    Empty,
}

impl FormulaValue {
    /// Convert to number, if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(true) => Some(1.0),
            FormulaValue::Boolean(false) => Some(0.0),
            FormulaValue::String(s) => s.trim().parse().ok(),
            FormulaValue::Empty => Some(0.0),
            _ => None,
        }
    }

    /// Force conversion to number for arithmetic
    pub fn to_number(&self) -> FormulaResult<f64> {
        self.as_number().ok_or_else(|| {
            FormulaError::Evaluation(format!("cannot use a {} as a number", self.type_name()))
        })
    }

    /// Convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(*n != 0.0),
            FormulaValue::Empty => Some(false),
            FormulaValue::String(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Some(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => format_number(*n),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(_) => ErrorCode::Value.to_string(),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<ErrorCode> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            FormulaValue::Number(_) => "number",
            FormulaValue::String(_) => "text value",
            FormulaValue::Boolean(_) => "boolean",
            FormulaValue::Error(_) => "error",
            FormulaValue::Array(_) => "array",
            FormulaValue::Empty => "blank",
        }
    }

    /// Iterate scalar values, flattening arrays row by row
    pub fn scalars(&self) -> Box<dyn Iterator<Item = &FormulaValue> + '_> {
        match self {
            FormulaValue::Array(rows) => Box::new(rows.iter().flatten().flat_map(|v| v.scalars())),
            other => Box::new(std::iter::once(other)),
        }
    }
}

/// Render a number without trailing zeros
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<LiteralValue> for FormulaValue {
    fn from(value: LiteralValue) -> Self {
        match value {
            LiteralValue::Number(n) => FormulaValue::Number(n),
            LiteralValue::Boolean(b) => FormulaValue::Boolean(b),
            LiteralValue::Text(s) => FormulaValue::String(s),
        }
    }
}

impl From<FormulaValue> for EvaluatedValue {
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Empty => EvaluatedValue::Empty,
            FormulaValue::Number(n) => EvaluatedValue::Number(n),
            FormulaValue::String(s) => EvaluatedValue::Text(s),
            FormulaValue::Boolean(b) => EvaluatedValue::Boolean(b),
            FormulaValue::Error(e) => EvaluatedValue::Error(e),
            FormulaValue::Array(_) => EvaluatedValue::Error(ErrorCode::Value),
        }
    }
}

/// Where cell references are resolved during evaluation
pub trait CellSource {
    /// Current value of a cell; blank cells are [`FormulaValue::Empty`]
    fn value(&self, address: CellAddress) -> FormulaValue;

    /// Smallest range covering every non-blank cell, when known
    ///
    /// Range reads are clipped to it, so `A1:A1048576` over a small grid
    /// only visits the populated rows.
    fn extent(&self) -> Option<CellRange> {
        None
    }
}

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    /// Cell lookups, if any
    pub source: Option<&'a dyn CellSource>,
    /// Cell whose formula is being evaluated
    pub current: CellAddress,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(source: &'a dyn CellSource, current: CellAddress) -> Self {
        Self {
            source: Some(source),
            current,
        }
    }

    /// Create a simple context without cells (for testing)
    pub fn simple() -> Self {
        Self {
            source: None,
            current: CellAddress::new(0, 0),
        }
    }

    /// Get a cell value
    pub fn get_cell_value(&self, sheet: Option<&str>, address: CellAddress) -> FormulaValue {
        // A single grid; anything qualified by sheet cannot be resolved
        if sheet.is_some() {
            return FormulaValue::Error(ErrorCode::Ref);
        }
        match self.source {
            Some(source) => source.value(address),
            None => FormulaValue::Empty,
        }
    }

    /// Get a range of cell values as an array
    pub fn get_range_values(&self, sheet: Option<&str>, range: &CellRange) -> FormulaValue {
        if sheet.is_some() {
            return FormulaValue::Error(ErrorCode::Ref);
        }

        // Blanks outside the extent contribute nothing to range functions
        let range = match self.source.and_then(|source| source.extent()) {
            Some(extent) => match range.intersection(&extent) {
                Some(clipped) => clipped,
                None => return FormulaValue::Array(Vec::new()),
            },
            None => *range,
        };

        let mut rows: Vec<Vec<FormulaValue>> = Vec::with_capacity(range.row_count() as usize);
        for address in range.cells() {
            if address.col == range.start.col {
                rows.push(Vec::with_capacity(range.col_count() as usize));
            }
            if let Some(row) = rows.last_mut() {
                row.push(self.get_cell_value(None, address));
            }
        }

        FormulaValue::Array(rows)
    }
}

/// Evaluate a formula expression
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        FormulaExpr::Error(e) => Ok(FormulaValue::Error(*e)),

        // === References ===
        FormulaExpr::CellRef(cell_ref) => {
            Ok(ctx.get_cell_value(cell_ref.sheet.as_deref(), cell_ref.address))
        }

        FormulaExpr::RangeRef(range_ref) => {
            Ok(ctx.get_range_values(range_ref.sheet.as_deref(), &range_ref.range))
        }

        // Defined names are not supported
        FormulaExpr::NameRef(_) => Ok(FormulaValue::Error(ErrorCode::Name)),

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),

        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),

        // === Arrays ===
        FormulaExpr::Array(rows) => {
            let mut result_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let mut result_row = Vec::with_capacity(row.len());
                for expr in row {
                    result_row.push(evaluate(expr, ctx)?);
                }
                result_rows.push(result_row);
            }
            Ok(FormulaValue::Array(result_rows))
        }
    }
}

/// A finite number, or #NUM!
fn checked_number(n: f64) -> FormulaValue {
    if n.is_finite() {
        FormulaValue::Number(n)
    } else {
        FormulaValue::Error(ErrorCode::Num)
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    // Evaluate operands first
    let left_val = evaluate(left, ctx)?;
    let right_val = evaluate(right, ctx)?;

    // Propagate errors
    if let Some(e) = left_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    if let Some(e) = right_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    let comparison = || compare_values(&left_val, &right_val);

    match op {
        // Arithmetic operators
        BinaryOperator::Add => Ok(checked_number(
            left_val.to_number()? + right_val.to_number()?,
        )),
        BinaryOperator::Subtract => Ok(checked_number(
            left_val.to_number()? - right_val.to_number()?,
        )),
        BinaryOperator::Multiply => Ok(checked_number(
            left_val.to_number()? * right_val.to_number()?,
        )),
        BinaryOperator::Divide => {
            let l = left_val.to_number()?;
            let r = right_val.to_number()?;
            if r == 0.0 {
                Ok(FormulaValue::Error(ErrorCode::Div0))
            } else {
                Ok(checked_number(l / r))
            }
        }
        BinaryOperator::Power => {
            let l = left_val.to_number()?;
            let r = right_val.to_number()?;
            if l == 0.0 && r == 0.0 {
                return Ok(FormulaValue::Error(ErrorCode::Num));
            }
            if l == 0.0 && r < 0.0 {
                return Ok(FormulaValue::Error(ErrorCode::Div0));
            }
            Ok(checked_number(l.powf(r)))
        }

        // Comparison operators
        BinaryOperator::Equal => Ok(FormulaValue::Boolean(comparison() == Ordering::Equal)),
        BinaryOperator::NotEqual => Ok(FormulaValue::Boolean(comparison() != Ordering::Equal)),
        BinaryOperator::LessThan => Ok(FormulaValue::Boolean(comparison() == Ordering::Less)),
        BinaryOperator::LessEqual => Ok(FormulaValue::Boolean(comparison() != Ordering::Greater)),
        BinaryOperator::GreaterThan => {
            Ok(FormulaValue::Boolean(comparison() == Ordering::Greater))
        }
        BinaryOperator::GreaterEqual => Ok(FormulaValue::Boolean(comparison() != Ordering::Less)),

        // Concatenation
        BinaryOperator::Concat => {
            let l = left_val.as_string();
            let r = right_val.as_string();
            Ok(FormulaValue::String(l + &r))
        }

        // Only reached when one side is not a plain cell reference
        BinaryOperator::Range => Err(FormulaError::Evaluation(
            "range operator needs two cell references".into(),
        )),
    }
}

/// Compare two values for ordering
///
/// Blank compares as zero against numbers and as "" against text. Across
/// types: numbers < text < booleans.
fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    use FormulaValue::*;

    match (left, right) {
        (Empty, Empty) => Ordering::Equal,
        (Empty, String(s)) => "".cmp(s.to_lowercase().as_str()),
        (String(s), Empty) => s.to_lowercase().as_str().cmp(""),
        (Empty, Boolean(b)) => false.cmp(b),
        (Boolean(b), Empty) => b.cmp(&false),
        (Empty, other) => compare_values(&Number(0.0), other),
        (other, Empty) => compare_values(other, &Number(0.0)),

        (Number(l), Number(r)) => l.partial_cmp(r).unwrap_or(Ordering::Equal),
        (String(l), String(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (Boolean(l), Boolean(r)) => l.cmp(r),

        (Number(_), String(_) | Boolean(_)) => Ordering::Less,
        (String(_), Number(_)) => Ordering::Greater,
        (String(_), Boolean(_)) => Ordering::Less,
        (Boolean(_), Number(_) | String(_)) => Ordering::Greater,

        (Error(l), Error(r)) => l.cmp(r),

        _ => Ordering::Equal,
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let val = evaluate(operand, ctx)?;

    // Propagate errors
    if let Some(e) = val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    match op {
        UnaryOperator::Negate => Ok(FormulaValue::Number(-val.to_number()?)),
        UnaryOperator::Percent => Ok(FormulaValue::Number(val.to_number()? / 100.0)),
    }
}

/// Evaluate a function call
fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let registry = get_function_registry();

    let func = registry
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    // Check argument count
    if args.len() < func.min_args {
        return Err(FormulaError::ArgumentCount {
            function: func.name.to_string(),
            expected: format!("at least {}", func.min_args),
            actual: args.len(),
        });
    }

    if let Some(max) = func.max_args {
        if args.len() > max {
            return Err(FormulaError::ArgumentCount {
                function: func.name.to_string(),
                expected: format!("at most {}", max),
                actual: args.len(),
            });
        }
    }

    // Evaluate arguments
    let mut evaluated_args = Vec::with_capacity(args.len());
    for arg in args {
        evaluated_args.push(evaluate(arg, ctx)?);
    }

    // Call the function
    let result = (func.implementation)(&evaluated_args, ctx)?;
    Ok(match result {
        FormulaValue::Number(n) => checked_number(n),
        other => other,
    })
}
