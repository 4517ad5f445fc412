//! Built-in spreadsheet functions

pub mod info;
pub mod logical;
pub mod math;
pub mod statistical;
pub mod text;

use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use ahash::AHashMap;
use vault_sheets_core::ErrorCode;

/// Function implementation signature
pub type FunctionImpl = fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionDef>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_info_functions();
        registry.register_text_functions();
        registry.register_statistical_functions();

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name.to_ascii_uppercase().as_str())
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    fn add(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.register(FunctionDef {
            name,
            min_args,
            max_args,
            implementation,
        });
    }

    fn register_math_functions(&mut self) {
        self.add("SUM", 1, None, math::fn_sum);
        self.add("AVERAGE", 1, None, math::fn_average);
        self.add("MIN", 1, None, math::fn_min);
        self.add("MAX", 1, None, math::fn_max);
        self.add("PRODUCT", 1, None, math::fn_product);
        self.add("ABS", 1, Some(1), math::fn_abs);
        self.add("ROUND", 1, Some(2), math::fn_round);
        self.add("ROUNDUP", 1, Some(2), math::fn_roundup);
        self.add("ROUNDDOWN", 1, Some(2), math::fn_rounddown);
        self.add("INT", 1, Some(1), math::fn_int);
        self.add("MOD", 2, Some(2), math::fn_mod);
        self.add("SQRT", 1, Some(1), math::fn_sqrt);
        self.add("POWER", 2, Some(2), math::fn_power);
        self.add("PI", 0, Some(0), math::fn_pi);
    }

    fn register_logical_functions(&mut self) {
        self.add("IF", 2, Some(3), logical::fn_if);
        self.add("AND", 1, None, logical::fn_and);
        self.add("OR", 1, None, logical::fn_or);
        self.add("NOT", 1, Some(1), logical::fn_not);
        self.add("IFERROR", 2, Some(2), logical::fn_iferror);
        self.add("IFNA", 2, Some(2), logical::fn_ifna);
        self.add("TRUE", 0, Some(0), logical::fn_true);
        self.add("FALSE", 0, Some(0), logical::fn_false);
    }

    fn register_info_functions(&mut self) {
        self.add("ISNUMBER", 1, Some(1), info::fn_isnumber);
        self.add("ISTEXT", 1, Some(1), info::fn_istext);
        self.add("ISBLANK", 1, Some(1), info::fn_isblank);
        self.add("ISERROR", 1, Some(1), info::fn_iserror);
        self.add("ISNA", 1, Some(1), info::fn_isna);
        self.add("NA", 0, Some(0), info::fn_na);
    }

    fn register_text_functions(&mut self) {
        self.add("LEN", 1, Some(1), text::fn_len);
        self.add("UPPER", 1, Some(1), text::fn_upper);
        self.add("LOWER", 1, Some(1), text::fn_lower);
        self.add("TRIM", 1, Some(1), text::fn_trim);
        self.add("CONCATENATE", 1, None, text::fn_concat);
        self.add("CONCAT", 1, None, text::fn_concat);
        self.add("LEFT", 1, Some(2), text::fn_left);
        self.add("RIGHT", 1, Some(2), text::fn_right);
    }

    fn register_statistical_functions(&mut self) {
        self.add("COUNT", 1, None, statistical::fn_count);
        self.add("COUNTA", 1, None, statistical::fn_counta);
        self.add("MEDIAN", 1, None, statistical::fn_median);
    }
}

// === Argument helpers ===

/// Coerce one argument to a number
///
/// A missing argument yields `default`; an error value or a non-numeric
/// text value comes back as the error code the function should return.
pub(crate) fn number_arg(
    args: &[FormulaValue],
    index: usize,
    default: f64,
) -> Result<f64, ErrorCode> {
    match args.get(index) {
        None => Ok(default),
        Some(FormulaValue::Error(e)) => Err(*e),
        Some(FormulaValue::Array(_)) => Err(ErrorCode::Value),
        Some(value) => value.as_number().ok_or(ErrorCode::Value),
    }
}

/// Coerce one argument to text
pub(crate) fn text_arg(args: &[FormulaValue], index: usize) -> Result<String, ErrorCode> {
    match args.get(index) {
        None => Ok(String::new()),
        Some(FormulaValue::Error(e)) => Err(*e),
        Some(FormulaValue::Array(_)) => Err(ErrorCode::Value),
        Some(value) => Ok(value.as_string()),
    }
}

/// Numbers from a list of arguments
///
/// Direct arguments are coerced (booleans, numeric text); inside ranges and
/// arrays only actual numbers count. The first error encountered wins.
pub(crate) fn collect_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, ErrorCode> {
    let mut numbers = Vec::new();

    for arg in args {
        match arg {
            FormulaValue::Number(n) => numbers.push(*n),
            FormulaValue::Error(e) => return Err(*e),
            FormulaValue::Boolean(b) => numbers.push(if *b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => match s.trim().parse() {
                Ok(n) => numbers.push(n),
                Err(_) => return Err(ErrorCode::Value),
            },
            FormulaValue::Empty => {}
            FormulaValue::Array(_) => {
                for value in arg.scalars() {
                    match value {
                        FormulaValue::Number(n) => numbers.push(*n),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
        }
    }

    Ok(numbers)
}

/// Unwrap a helper result or return its error code as the function result
macro_rules! arg {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(code) => return Ok(FormulaValue::Error(code)),
        }
    };
}
pub(crate) use arg;
