//! # vault-sheets-xlsx
//!
//! Reads the first worksheet of an XLSX (Office Open XML) document into a
//! used range plus typed raw cells, ready for classification.

pub mod error;
pub mod reader;

pub use error::{XlsxError, XlsxResult};
pub use reader::{RawCell, RawSheet, RawValue, XlsxReader, DIMENSION_CELL_LIMIT};
