//! The contract between the evaluation adapter and a spreadsheet evaluation
//! engine.
//!
//! An engine holds a sparse grid of cell contents. Every [`write`] batch is
//! followed by a full, synchronous recalculation, so a [`read`] issued after
//! `write` returns always observes final values.
//!
//! [`write`]: EvaluationEngine::write
//! [`read`]: EvaluationEngine::read

use crate::cell::{CellAddress, LiteralValue};

/// New content for a single cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    /// Formula text including the leading `=`
    Formula(String),
    Literal(LiteralValue),
    /// Clear the cell
    Empty,
}

/// One cell write in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub address: CellAddress,
    pub content: CellContent,
}

impl CellWrite {
    pub fn new(address: CellAddress, content: CellContent) -> Self {
        Self { address, content }
    }
}

/// A structured error value reported by an engine for a cell
#[derive(Debug, Clone, PartialEq)]
pub struct EngineErrorValue {
    /// The engine's error code, e.g. `#DIV/0!`
    pub code: String,
    /// The engine's human readable explanation
    pub message: String,
}

/// A cell value as reported by an engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(EngineErrorValue),
}

/// A spreadsheet evaluation engine
pub trait EvaluationEngine {
    /// Error raised when the engine rejects a write (e.g. unparsable formula)
    type Error: std::error::Error + Send + Sync + 'static;

    /// Apply a batch of writes and recalculate every dependent cell before
    /// returning
    fn write(&mut self, writes: &[CellWrite]) -> Result<(), Self::Error>;

    /// Read the current value of a cell; unset cells read as [`EngineValue::Empty`]
    fn read(&self, address: CellAddress) -> EngineValue;
}
