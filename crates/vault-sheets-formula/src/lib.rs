//! # vault-sheets-formula
//!
//! The evaluation engine behind vault-sheets workbooks.
//!
//! This crate provides:
//! - Formula parsing (text → AST)
//! - Formula evaluation (AST → value)
//! - A small library of built-in spreadsheet functions
//! - Dependency tracking and full recalculation through [`FormulaEngine`]
//!
//! ## Example
//!
//! ```rust
//! use vault_sheets_core::{CellAddress, CellContent, CellWrite, EngineValue, EvaluationEngine, LiteralValue};
//! use vault_sheets_formula::FormulaEngine;
//!
//! let b1 = CellAddress::parse("B1").unwrap();
//! let b2 = CellAddress::parse("B2").unwrap();
//!
//! let mut engine = FormulaEngine::new();
//! engine
//!     .write(&[
//!         CellWrite::new(b1, CellContent::Literal(LiteralValue::Number(21.0))),
//!         CellWrite::new(b2, CellContent::Formula("=B1*2".into())),
//!     ])
//!     .unwrap();
//!
//! assert_eq!(engine.read(b2), EngineValue::Number(42.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;

pub use ast::{
    BinaryOperator, CellReference, FormulaExpr, RangeReference, Reference, UnaryOperator,
};
pub use dependency::DependencyGraph;
pub use engine::{EngineError, EngineOptions, FormulaEngine};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, CellSource, EvaluationContext, FormulaValue};
pub use parser::parse_formula;
