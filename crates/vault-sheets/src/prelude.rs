//! Prelude module - common imports for vault-sheets users
//!
//! ```rust
//! use vault_sheets::prelude::*;
//! ```

// Model
pub use crate::{
    decode, default_workbook, encode, CellAddress, CellDefinition, ErrorCode, EvaluatedValue,
    LiteralValue, PublicView, WorkbookConfig,
};

// Evaluation
pub use crate::{AdapterState, CellValues, EngineOptions, EvaluationAdapter, InputPatch};

// Pipelines and service
pub use crate::{
    CalculatorService, DiagnosticsAnalyzer, DiagnosticsReport, DxfExporter, DxfOptions,
    FileStore, IngestionPipeline, MemoryStore, ServiceOptions, WorkbookStore,
};

// Error types
pub use crate::{Error, Result};
