//! Text functions
//!
//! Lengths and positions count characters, not bytes.

use super::{arg, number_arg, text_arg};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use vault_sheets_core::ErrorCode;

/// LEN function
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = arg!(text_arg(args, 0));
    Ok(FormulaValue::Number(text.chars().count() as f64))
}

/// UPPER function
pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = arg!(text_arg(args, 0));
    Ok(FormulaValue::String(text.to_uppercase()))
}

/// LOWER function
pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = arg!(text_arg(args, 0));
    Ok(FormulaValue::String(text.to_lowercase()))
}

/// TRIM - strip leading/trailing spaces and collapse runs of interior spaces
pub fn fn_trim(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = arg!(text_arg(args, 0));
    let trimmed = text.split(' ').filter(|s| !s.is_empty()).collect::<Vec<_>>();
    Ok(FormulaValue::String(trimmed.join(" ")))
}

/// CONCATENATE / CONCAT - ranges contribute every cell in row order
pub fn fn_concat(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut result = String::new();

    for value in args.iter().flat_map(|a| a.scalars()) {
        if let FormulaValue::Error(e) = value {
            return Ok(FormulaValue::Error(*e));
        }
        result.push_str(&value.as_string());
    }

    Ok(FormulaValue::String(result))
}

fn char_count_arg(args: &[FormulaValue]) -> Result<usize, ErrorCode> {
    let count = number_arg(args, 1, 1.0)?;
    if count < 0.0 {
        return Err(ErrorCode::Value);
    }
    Ok(count.trunc() as usize)
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = arg!(text_arg(args, 0));
    let count = arg!(char_count_arg(args));
    Ok(FormulaValue::String(text.chars().take(count).collect()))
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = arg!(text_arg(args, 0));
    let count = arg!(char_count_arg(args));
    let len = text.chars().count();
    Ok(FormulaValue::String(
        text.chars().skip(len.saturating_sub(count)).collect(),
    ))
}
