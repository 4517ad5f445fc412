//! Cell-related types
//!
//! This module contains:
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A range of cells (e.g., "A1:B10")
//! - [`CellDefinition`] - A populated cell of a workbook configuration
//! - [`LiteralValue`], [`EvaluatedValue`], [`ErrorCode`] - Cell value vocabularies

mod address;
mod definition;
mod value;

pub use address::{decode, encode, CellAddress, CellRange, CellRangeIterator};
pub use definition::CellDefinition;
pub use value::{ErrorCode, EvaluatedValue, LiteralValue};
