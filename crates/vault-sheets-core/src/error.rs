//! Error types for vault-sheets

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in vault-sheets
///
/// Messages never carry formula text or engine-internal error objects.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed cell address
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Workbook configuration violates a schema invariant
    #[error("Invalid workbook: {0}")]
    InvalidWorkbook(String),

    /// Referenced cell is not part of the workbook configuration
    #[error("Cell not found: {0}")]
    CellNotFound(String),

    /// Evaluation engine rejected the workbook while loading it
    #[error("Engine initialization failed: {0}")]
    EngineInit(String),

    /// Source document could not be ingested
    #[error("Ingestion failed: {0}")]
    Ingestion(String),

    /// Geometry document could not be produced
    #[error("Export failed: {0}")]
    Export(String),

    /// No workbook record with this id
    #[error("Workbook not found: {0}")]
    WorkbookNotFound(String),

    /// Workbook store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Operation called in the wrong lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}
