//! # vault-sheets-core
//!
//! Core data structures for vault-sheets.
//!
//! This crate provides the types shared by every other vault-sheets crate:
//! - [`CellAddress`] and [`CellRange`] - A1 addressing ([`encode`]/[`decode`])
//! - [`CellDefinition`] and [`WorkbookConfig`] - The persisted calculator model
//! - [`LiteralValue`], [`EvaluatedValue`], [`ErrorCode`] - Value vocabularies
//! - [`EvaluationEngine`] - The contract a formula engine implements
//!
//! ## Example
//!
//! ```rust
//! use vault_sheets_core::{CellAddress, CellDefinition, WorkbookConfig};
//!
//! let config = WorkbookConfig::builder("Doubler")
//!     .cell(CellDefinition::input(CellAddress::parse("A1").unwrap(), 5))
//!     .cell(CellDefinition::formula(CellAddress::parse("B1").unwrap(), "=A1*2"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!((config.rows(), config.cols()), (1, 2));
//! assert!(!serde_json::to_string(&config.public_view()).unwrap().contains("A1*2"));
//! ```

pub mod cell;
pub mod config;
pub mod engine;
pub mod error;

// Re-exports for convenience
pub use cell::{
    decode, encode, CellAddress, CellDefinition, CellRange, ErrorCode, EvaluatedValue,
    LiteralValue,
};
pub use config::{default_workbook, PublicCell, PublicView, WorkbookConfig, WorkbookConfigBuilder};
pub use engine::{CellContent, CellWrite, EngineErrorValue, EngineValue, EvaluationEngine};
pub use error::{Error, Result};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u32 = 16_384;
