//! Counting and statistical functions

use super::{arg, collect_numbers};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use vault_sheets_core::ErrorCode;

/// COUNT - numbers only; errors are not counted and do not propagate
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .flat_map(|a| a.scalars())
        .filter(|v| matches!(v, FormulaValue::Number(_)))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTA - every non-blank value, errors included
pub fn fn_counta(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .flat_map(|a| a.scalars())
        .filter(|v| !matches!(v, FormulaValue::Empty))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// MEDIAN function
pub fn fn_median(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut numbers = arg!(collect_numbers(args));

    if numbers.is_empty() {
        return Ok(FormulaValue::Error(ErrorCode::Num));
    }

    numbers.sort_by(|a, b| a.total_cmp(b));
    let mid = numbers.len() / 2;
    let median = if numbers.len() % 2 == 0 {
        (numbers[mid - 1] + numbers[mid]) / 2.0
    } else {
        numbers[mid]
    };

    Ok(FormulaValue::Number(median))
}
