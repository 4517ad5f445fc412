//! Math functions

use super::{arg, collect_numbers, number_arg};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use vault_sheets_core::ErrorCode;

/// SUM function
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let numbers = arg!(collect_numbers(args));
    Ok(FormulaValue::Number(numbers.iter().sum()))
}

/// AVERAGE function
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let numbers = arg!(collect_numbers(args));
    if numbers.is_empty() {
        return Ok(FormulaValue::Error(ErrorCode::Div0));
    }
    Ok(FormulaValue::Number(
        numbers.iter().sum::<f64>() / numbers.len() as f64,
    ))
}

/// MIN function; 0 when there are no numbers
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let numbers = arg!(collect_numbers(args));
    let min = numbers.into_iter().reduce(f64::min).unwrap_or(0.0);
    Ok(FormulaValue::Number(min))
}

/// MAX function; 0 when there are no numbers
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let numbers = arg!(collect_numbers(args));
    let max = numbers.into_iter().reduce(f64::max).unwrap_or(0.0);
    Ok(FormulaValue::Number(max))
}

/// PRODUCT function; 0 when there are no numbers
pub fn fn_product(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let numbers = arg!(collect_numbers(args));
    if numbers.is_empty() {
        return Ok(FormulaValue::Number(0.0));
    }
    Ok(FormulaValue::Number(numbers.iter().product()))
}

/// ABS function
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let number = arg!(number_arg(args, 0, 0.0));
    Ok(FormulaValue::Number(number.abs()))
}

/// Round half away from zero at `digits` decimal places (negative digits
/// round to the left of the decimal point)
fn round_with(number: f64, digits: f64, mode: fn(f64) -> f64) -> f64 {
    let multiplier = 10_f64.powi(digits.trunc() as i32);
    let scaled = number.abs() * multiplier;
    // Absorb binary representation noise like 2.675 * 100 = 267.49999999999997
    let scaled = (scaled * 1e9).round() / 1e9;
    mode(scaled) / multiplier * number.signum()
}

/// ROUND(number, [digits]) - round half away from zero
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let number = arg!(number_arg(args, 0, 0.0));
    let digits = arg!(number_arg(args, 1, 0.0));
    Ok(FormulaValue::Number(round_with(number, digits, f64::round)))
}

/// ROUNDUP(number, [digits]) - away from zero
pub fn fn_roundup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let number = arg!(number_arg(args, 0, 0.0));
    let digits = arg!(number_arg(args, 1, 0.0));
    Ok(FormulaValue::Number(round_with(number, digits, f64::ceil)))
}

/// ROUNDDOWN(number, [digits]) - toward zero
pub fn fn_rounddown(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let number = arg!(number_arg(args, 0, 0.0));
    let digits = arg!(number_arg(args, 1, 0.0));
    Ok(FormulaValue::Number(round_with(number, digits, f64::floor)))
}

/// INT(number) - round down to the nearest integer
pub fn fn_int(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let number = arg!(number_arg(args, 0, 0.0));
    Ok(FormulaValue::Number(number.floor()))
}

/// MOD(number, divisor)
///
/// `number - divisor * floor(number / divisor)`, so the result takes the
/// sign of the divisor.
pub fn fn_mod(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let number = arg!(number_arg(args, 0, 0.0));
    let divisor = arg!(number_arg(args, 1, 0.0));

    if divisor == 0.0 {
        return Ok(FormulaValue::Error(ErrorCode::Div0));
    }

    Ok(FormulaValue::Number(
        number - divisor * (number / divisor).floor(),
    ))
}

/// SQRT function
pub fn fn_sqrt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let number = arg!(number_arg(args, 0, 0.0));
    if number < 0.0 {
        return Ok(FormulaValue::Error(ErrorCode::Num));
    }
    Ok(FormulaValue::Number(number.sqrt()))
}

/// POWER(base, exponent)
pub fn fn_power(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let base = arg!(number_arg(args, 0, 0.0));
    let exponent = arg!(number_arg(args, 1, 0.0));

    if base == 0.0 && exponent == 0.0 {
        return Ok(FormulaValue::Error(ErrorCode::Num));
    }
    if base == 0.0 && exponent < 0.0 {
        return Ok(FormulaValue::Error(ErrorCode::Div0));
    }

    // NaN/inf are turned into #NUM! by the evaluator
    Ok(FormulaValue::Number(base.powf(exponent)))
}

/// PI function
pub fn fn_pi(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(std::f64::consts::PI))
}

#[cfg(test)]
mod tests {
    use crate::evaluator::{evaluate, EvaluationContext, FormulaValue};
    use crate::parser::parse_formula;
    use vault_sheets_core::ErrorCode;

    fn eval(formula: &str) -> FormulaValue {
        let ast = parse_formula(formula).unwrap();
        evaluate(&ast, &EvaluationContext::simple()).unwrap()
    }

    fn num(formula: &str) -> f64 {
        match eval(formula) {
            FormulaValue::Number(n) => n,
            other => panic!("{} gave {:?}", formula, other),
        }
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(num("=SUM(1,2,3)"), 6.0);
        assert_eq!(num("=SUM({1,2;3,4},TRUE)"), 11.0);
        assert_eq!(num("=AVERAGE(2,4,6)"), 4.0);
        assert_eq!(num("=MIN(5,2,8,1)"), 1.0);
        assert_eq!(num("=MAX(5,2,8,1)"), 8.0);
        assert_eq!(num("=MAX({\"a\"})"), 0.0);
        assert_eq!(num("=PRODUCT(2,3,4)"), 24.0);
        assert_eq!(eval("=AVERAGE({\"a\"})"), FormulaValue::Error(ErrorCode::Div0));
        assert_eq!(eval("=SUM(1,\"x\")"), FormulaValue::Error(ErrorCode::Value));
        assert_eq!(eval("=SUM(1,#N/A)"), FormulaValue::Error(ErrorCode::Na));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(num("=ROUND(2.5,0)"), 3.0);
        assert_eq!(num("=ROUND(-2.5,0)"), -3.0);
        assert_eq!(num("=ROUND(2.675,2)"), 2.68);
        assert_eq!(num("=ROUND(1234,-2)"), 1200.0);
        assert_eq!(num("=ROUNDUP(3.141,2)"), 3.15);
        assert_eq!(num("=ROUNDUP(-3.141,1)"), -3.2);
        assert_eq!(num("=ROUNDDOWN(3.149,2)"), 3.14);
        assert_eq!(num("=ROUNDDOWN(-3.149,1)"), -3.1);
        assert_eq!(num("=INT(-2.5)"), -3.0);
        assert_eq!(num("=ABS(-7)"), 7.0);
    }

    #[test]
    fn test_mod() {
        assert_eq!(num("=MOD(10,3)"), 1.0);
        assert_eq!(num("=MOD(-10,3)"), 2.0);
        assert_eq!(num("=MOD(10,-3)"), -2.0);
        assert_eq!(eval("=MOD(1,0)"), FormulaValue::Error(ErrorCode::Div0));
    }

    #[test]
    fn test_sqrt_power_pi() {
        assert_eq!(num("=SQRT(16)"), 4.0);
        assert_eq!(eval("=SQRT(-1)"), FormulaValue::Error(ErrorCode::Num));
        assert_eq!(num("=POWER(2,8)"), 256.0);
        assert_eq!(eval("=POWER(-8,0.5)"), FormulaValue::Error(ErrorCode::Num));
        assert_eq!(eval("=POWER(0,-1)"), FormulaValue::Error(ErrorCode::Div0));
        assert!((num("=PI()") - std::f64::consts::PI).abs() < 1e-12);
    }
}
