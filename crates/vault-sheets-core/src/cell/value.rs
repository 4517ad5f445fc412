//! Cell value types
//!
//! Three vocabularies live here:
//! - [`LiteralValue`]: what a workbook author (or client) writes into a cell
//! - [`ErrorCode`]: the closed set of formula error codes
//! - [`EvaluatedValue`]: what a cell reads back as after recalculation

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Literal cell content: a number, a piece of text or a boolean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Number(f64),
    Boolean(bool),
    Text(String),
}

impl LiteralValue {
    /// Create a text literal
    pub fn text<S: Into<String>>(s: S) -> Self {
        LiteralValue::Text(s.into())
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            LiteralValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the type name for messages
    pub fn type_name(&self) -> &'static str {
        match self {
            LiteralValue::Number(_) => "number",
            LiteralValue::Boolean(_) => "boolean",
            LiteralValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Number(n) => write!(f, "{}", n),
            LiteralValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            LiteralValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for LiteralValue {
    fn from(n: f64) -> Self {
        LiteralValue::Number(n)
    }
}

impl From<i32> for LiteralValue {
    fn from(n: i32) -> Self {
        LiteralValue::Number(n as f64)
    }
}

impl From<bool> for LiteralValue {
    fn from(b: bool) -> Self {
        LiteralValue::Boolean(b)
    }
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        LiteralValue::text(s)
    }
}

impl From<String> for LiteralValue {
    fn from(s: String) -> Self {
        LiteralValue::Text(s)
    }
}

/// Formula error codes
///
/// This set is closed: anything an evaluation engine reports is flattened to
/// one of these before it leaves the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorCode {
    /// #REF! - Invalid cell reference
    Ref,
    /// #DIV/0! - Division by zero
    Div0,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #NAME? - Unrecognized function or name
    Name,
    /// #N/A - Value not available
    Na,
    /// #NUM! - Invalid numeric value
    Num,
    /// #ERROR! - General error, usually a formula syntax problem
    Error,
}

impl ErrorCode {
    /// Every error code, in display order
    pub const ALL: [ErrorCode; 7] = [
        ErrorCode::Ref,
        ErrorCode::Div0,
        ErrorCode::Value,
        ErrorCode::Name,
        ErrorCode::Na,
        ErrorCode::Num,
        ErrorCode::Error,
    ];

    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Ref => "#REF!",
            ErrorCode::Div0 => "#DIV/0!",
            ErrorCode::Value => "#VALUE!",
            ErrorCode::Name => "#NAME?",
            ErrorCode::Na => "#N/A",
            ErrorCode::Num => "#NUM!",
            ErrorCode::Error => "#ERROR!",
        }
    }

    /// Parse an error string (case-insensitive)
    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "#REF!" => Some(ErrorCode::Ref),
            "#DIV/0!" => Some(ErrorCode::Div0),
            "#VALUE!" => Some(ErrorCode::Value),
            "#NAME?" => Some(ErrorCode::Name),
            "#N/A" => Some(ErrorCode::Na),
            "#NUM!" => Some(ErrorCode::Num),
            "#ERROR!" => Some(ErrorCode::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The transport-safe value of a cell after evaluation
///
/// Serializes as a bare JSON scalar: numbers, strings and booleans as-is,
/// `""` for an empty cell and the error code string (e.g. `"#DIV/0!"`) for
/// errors.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EvaluatedValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    #[default]
    Empty,
    Error(ErrorCode),
}

impl EvaluatedValue {
    /// Check if the value is an error
    pub fn is_error(&self) -> bool {
        matches!(self, EvaluatedValue::Error(_))
    }

    /// Get the error code if this is one
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            EvaluatedValue::Error(code) => Some(*code),
            _ => None,
        }
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            EvaluatedValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Check if the cell read back as empty
    pub fn is_empty(&self) -> bool {
        matches!(self, EvaluatedValue::Empty)
    }
}

impl fmt::Display for EvaluatedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluatedValue::Number(n) => write!(f, "{}", n),
            EvaluatedValue::Text(s) => write!(f, "{}", s),
            EvaluatedValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            EvaluatedValue::Empty => Ok(()),
            EvaluatedValue::Error(e) => write!(f, "{}", e),
        }
    }
}

impl Serialize for EvaluatedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EvaluatedValue::Number(n) => serializer.serialize_f64(*n),
            EvaluatedValue::Text(s) => serializer.serialize_str(s),
            EvaluatedValue::Boolean(b) => serializer.serialize_bool(*b),
            EvaluatedValue::Empty => serializer.serialize_str(""),
            EvaluatedValue::Error(e) => serializer.serialize_str(e.as_str()),
        }
    }
}

impl From<LiteralValue> for EvaluatedValue {
    fn from(value: LiteralValue) -> Self {
        match value {
            LiteralValue::Number(n) => EvaluatedValue::Number(n),
            LiteralValue::Boolean(b) => EvaluatedValue::Boolean(b),
            LiteralValue::Text(s) => EvaluatedValue::Text(s),
        }
    }
}

impl From<ErrorCode> for EvaluatedValue {
    fn from(code: ErrorCode) -> Self {
        EvaluatedValue::Error(code)
    }
}
