//! # vault-sheets
//!
//! Turn a spreadsheet into a calculation service whose formulas stay on the
//! server.
//!
//! An uploaded workbook is ingested once into a [`WorkbookConfig`]. Clients
//! only ever see its [`PublicView`], submit values for input cells and get
//! evaluated values back.
//!
//! ## Features
//!
//! - XLSX and CSV ingestion with formula / input / label classification
//! - Request-scoped evaluation through [`EvaluationAdapter`]
//! - Error diagnostics with human readable explanations
//! - DXF export of a box sized by evaluated values
//! - In-memory and file-backed workbook stores
//!
//! ## Example
//!
//! ```rust
//! use vault_sheets::prelude::*;
//!
//! let mut service = CalculatorService::new(MemoryStore::new());
//! let upload = service
//!     .upload(b"Length,10\nWidth,5\nArea,=B1*B2\n", "box.csv", Some("Box"))
//!     .unwrap();
//!
//! let mut inputs = InputPatch::new();
//! inputs.insert("B1".into(), serde_json::json!(20));
//! let calc = service.calculate(&upload.workbook_id, &inputs).unwrap();
//!
//! let area = CellAddress::parse("B3").unwrap();
//! assert_eq!(calc.results[&area], EvaluatedValue::Number(100.0));
//! ```

pub mod adapter;
pub mod diagnostics;
pub mod geometry;
pub mod ingest;
pub mod prelude;
pub mod service;
pub mod store;

pub use adapter::{AdapterState, CellValues, EvaluationAdapter, Grid, GridCell, InputPatch};
pub use diagnostics::{
    CellErrorReport, CellInfo, DiagnosticsAnalyzer, DiagnosticsReport, DiagnosticsSummary,
    MissingDependencyWarning,
};
pub use geometry::{DxfExporter, DxfOptions};
pub use ingest::{IngestionPipeline, Ingested, PreviewCell, PreviewKind};
pub use service::{
    Calculation, CalculatorService, DxfDocument, ServiceOptions, UploadOutcome, WorkbookSnapshot,
    DXF_PREFIX,
};
pub use store::{FileStore, MemoryStore, WorkbookRecord, WorkbookStore, WorkbookSummary};

// Re-export core types
pub use vault_sheets_core::{
    decode, default_workbook, encode, CellAddress, CellContent, CellDefinition, CellRange,
    CellWrite, EngineErrorValue, EngineValue, Error, ErrorCode, EvaluatedValue,
    EvaluationEngine, LiteralValue, PublicCell, PublicView, Result, WorkbookConfig,
    WorkbookConfigBuilder, MAX_COLS, MAX_ROWS,
};

// Re-export the engine
pub use vault_sheets_formula::{EngineError, EngineOptions, FormulaEngine};

// Re-export I/O types
pub use vault_sheets_xlsx::{XlsxError, XlsxReader};
