//! Logical functions

use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use vault_sheets_core::ErrorCode;

/// IF(condition, if_true, [if_false])
pub fn fn_if(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let condition = match &args[0] {
        FormulaValue::Error(e) => return Ok(FormulaValue::Error(*e)),
        value => match value.as_bool() {
            Some(b) => b,
            None => return Ok(FormulaValue::Error(ErrorCode::Value)),
        },
    };

    if condition {
        Ok(args[1].clone())
    } else {
        Ok(args.get(2).cloned().unwrap_or(FormulaValue::Boolean(false)))
    }
}

/// Fold the logical values of all arguments
///
/// Text and blanks inside ranges are skipped; direct text that is not
/// TRUE/FALSE is a type error, as is having nothing logical at all.
fn fold_logical(args: &[FormulaValue], init: bool, f: fn(bool, bool) -> bool) -> FormulaValue {
    let mut acc = init;
    let mut seen = false;

    for arg in args {
        match arg {
            FormulaValue::Error(e) => return FormulaValue::Error(*e),
            FormulaValue::Array(_) => {
                for value in arg.scalars() {
                    match value {
                        FormulaValue::Error(e) => return FormulaValue::Error(*e),
                        FormulaValue::Boolean(_) | FormulaValue::Number(_) => {
                            acc = f(acc, value.as_bool().unwrap_or(false));
                            seen = true;
                        }
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            value => match value.as_bool() {
                Some(b) => {
                    acc = f(acc, b);
                    seen = true;
                }
                None => return FormulaValue::Error(ErrorCode::Value),
            },
        }
    }

    if seen {
        FormulaValue::Boolean(acc)
    } else {
        FormulaValue::Error(ErrorCode::Value)
    }
}

/// AND function
pub fn fn_and(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(fold_logical(args, true, |a, b| a && b))
}

/// OR function
pub fn fn_or(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(fold_logical(args, false, |a, b| a || b))
}

/// NOT function
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match &args[0] {
        FormulaValue::Error(e) => Ok(FormulaValue::Error(*e)),
        value => Ok(value
            .as_bool()
            .map(|b| FormulaValue::Boolean(!b))
            .unwrap_or(FormulaValue::Error(ErrorCode::Value))),
    }
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match &args[0] {
        FormulaValue::Error(_) => Ok(args[1].clone()),
        value => Ok(value.clone()),
    }
}

/// IFNA(value, value_if_na) - like IFERROR but only catches #N/A
pub fn fn_ifna(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match &args[0] {
        FormulaValue::Error(ErrorCode::Na) => Ok(args[1].clone()),
        value => Ok(value.clone()),
    }
}

/// TRUE()
pub fn fn_true(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(true))
}

/// FALSE()
pub fn fn_false(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(false))
}
