//! Request-scoped calculator service
//!
//! Every call resolves the workbook from the store and builds a fresh
//! [`EvaluationAdapter`]; no evaluator state outlives a call.

use crate::adapter::{CellValues, EvaluationAdapter, Grid, InputPatch};
use crate::diagnostics::{DiagnosticsAnalyzer, DiagnosticsReport};
use crate::geometry::DxfExporter;
use crate::ingest::{IngestionPipeline, PreviewCell};
use crate::store::{WorkbookRecord, WorkbookStore, WorkbookSummary};
use crate::{default_workbook, CellAddress, Error, PublicView, Result, WorkbookConfig};
use serde::Serialize;
use vault_sheets_formula::EngineOptions;

/// Prefix of exported DXF file names
pub const DXF_PREFIX: &str = "autocad-design";

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Id that resolves to the built-in workbook
    pub default_id: String,
    pub engine: EngineOptions,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            default_id: "default".to_string(),
            engine: EngineOptions::default(),
        }
    }
}

/// Initial state of a workbook for a client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookSnapshot {
    pub metadata: PublicView,
    pub initial_values: CellValues,
    pub spreadsheet_data: Grid,
}

/// Result of a calculation request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculation {
    pub results: CellValues,
    pub spreadsheet_data: Grid,
    pub metadata: PublicView,
}

/// Result of an upload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub workbook_id: String,
    pub config: PublicView,
    pub preview: Vec<Vec<PreviewCell>>,
}

/// A generated DXF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxfDocument {
    pub filename: String,
    pub content: String,
}

/// Calculator operations over a workbook store
pub struct CalculatorService<S: WorkbookStore> {
    store: S,
    options: ServiceOptions,
}

impl<S: WorkbookStore> CalculatorService<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, ServiceOptions::default())
    }

    pub fn with_options(store: S, options: ServiceOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Resolve a workbook id to its configuration
    pub fn config(&self, id: &str) -> Result<WorkbookConfig> {
        if id == self.options.default_id {
            return Ok(default_workbook());
        }
        Ok(self.record(id)?.formula_config)
    }

    fn record(&self, id: &str) -> Result<WorkbookRecord> {
        self.store
            .get(id)?
            .ok_or_else(|| Error::WorkbookNotFound(id.to_string()))
    }

    fn adapter(&self, id: &str) -> Result<EvaluationAdapter> {
        self.adapter_with(id, self.options.engine)
    }

    fn adapter_with(&self, id: &str, options: EngineOptions) -> Result<EvaluationAdapter> {
        let mut adapter = EvaluationAdapter::with_options(options);
        adapter.load(self.config(id)?)?;
        Ok(adapter)
    }

    /// Formula-free view plus initial values
    pub fn public_workbook(&self, id: &str) -> Result<WorkbookSnapshot> {
        let adapter = self.adapter(id)?;
        Ok(WorkbookSnapshot {
            metadata: adapter.public_view()?,
            initial_values: adapter.read_all()?,
            spreadsheet_data: adapter.read_grid()?,
        })
    }

    /// Apply client inputs and return every value
    pub fn calculate(&self, id: &str, inputs: &InputPatch) -> Result<Calculation> {
        let mut adapter = self.adapter(id)?;
        let applied = adapter.apply_inputs(inputs)?;
        tracing::debug!(workbook = id, submitted = inputs.len(), applied, "calculated");

        Ok(Calculation {
            results: adapter.read_all()?,
            spreadsheet_data: adapter.read_grid()?,
            metadata: adapter.public_view()?,
        })
    }

    /// Ingest a document and store it as a new workbook
    ///
    /// `name` falls back to "Uploaded Workbook" when absent or blank.
    pub fn upload(
        &mut self,
        bytes: &[u8],
        file_name: &str,
        name: Option<&str>,
    ) -> Result<UploadOutcome> {
        let ingested = IngestionPipeline::ingest(bytes, file_name, name.unwrap_or_default())?;

        // Stored anyway, so diagnose can point at the broken formulas
        if let Err(err) =
            EvaluationAdapter::with_options(self.options.engine).load(ingested.config.clone())
        {
            tracing::warn!(file = file_name, error = %err, "uploaded workbook does not load");
        }

        let mut record = WorkbookRecord::new(ingested.config, Some(file_name.to_string()));
        let base = record.id.clone();
        let mut suffix = 1;
        while record.id == self.options.default_id || self.store.get(&record.id)?.is_some() {
            suffix += 1;
            record.id = format!("{}-{}", base, suffix);
        }

        let outcome = UploadOutcome {
            workbook_id: record.id.clone(),
            config: record.formula_config.public_view(),
            preview: ingested.preview,
        };
        self.store.put(record)?;

        tracing::info!(id = %outcome.workbook_id, file = file_name, "uploaded workbook");
        Ok(outcome)
    }

    /// Stored workbooks, newest first
    pub fn list(&self) -> Result<Vec<WorkbookSummary>> {
        Ok(self.store.list()?.iter().map(WorkbookSummary::from).collect())
    }

    /// Delete a stored workbook
    pub fn delete(&mut self, id: &str) -> Result<()> {
        if self.store.delete(id)? {
            tracing::info!(id, "deleted workbook");
            Ok(())
        } else {
            Err(Error::WorkbookNotFound(id.to_string()))
        }
    }

    /// Evaluate a workbook and explain its errors
    ///
    /// Unparsable formulas are reported as `#ERROR!` rather than failing the
    /// load.
    pub fn diagnose(&self, id: &str) -> Result<DiagnosticsReport> {
        let adapter = self.adapter_with(id, EngineOptions { strict: false })?;
        let config = adapter
            .config()
            .ok_or_else(|| Error::InvalidState("no workbook loaded".into()))?;
        Ok(DiagnosticsAnalyzer::analyze(config, &adapter.read_all()?))
    }

    /// Promote or demote one cell of a stored workbook to input
    pub fn set_cell_input(
        &mut self,
        id: &str,
        address: &str,
        is_input: bool,
    ) -> Result<PublicView> {
        if id == self.options.default_id {
            return Err(Error::InvalidState(
                "the built-in workbook cannot be edited".into(),
            ));
        }
        let address = CellAddress::parse(address)?;
        let record = self.record(id)?;
        let config = record.formula_config.with_input_flag(address, is_input)?;
        let view = config.public_view();

        self.store.put(record.with_config(config))?;
        tracing::info!(id, address = %address, is_input, "updated input flag");
        Ok(view)
    }

    /// Evaluate with `inputs` and render the result as a DXF box
    pub fn export_dxf(&self, id: &str, inputs: &InputPatch) -> Result<DxfDocument> {
        let mut adapter = self.adapter(id)?;
        adapter.apply_inputs(inputs)?;
        let values = adapter.read_all()?;

        let exporter = DxfExporter::new();
        Ok(DxfDocument {
            filename: exporter.filename(DXF_PREFIX),
            content: exporter.generate(&values)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::EvaluatedValue;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn inputs(value: serde_json::Value) -> InputPatch {
        value.as_object().cloned().unwrap()
    }

    fn service() -> CalculatorService<MemoryStore> {
        CalculatorService::new(MemoryStore::new())
    }

    fn upload_csv(service: &mut CalculatorService<MemoryStore>) -> String {
        service
            .upload(b"Length,10\nWidth,4\nArea,=B1*B2\n", "box.csv", Some("Box"))
            .unwrap()
            .workbook_id
    }

    #[test]
    fn test_default_workbook_is_served() {
        let service = service();
        let snapshot = service.public_workbook("default").unwrap();

        assert_eq!(snapshot.metadata.name, "AutoCAD Design Calculator");
        assert_eq!(
            snapshot.initial_values[&CellAddress::new(4, 1)],
            EvaluatedValue::Number(50.0)
        );
        assert_eq!(snapshot.spreadsheet_data.len(), 20);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("B1*B2"));
        assert!(json.contains("\"initialValues\""));
    }

    #[test]
    fn test_calculate() {
        let service = service();
        let calc = service
            .calculate("default", &inputs(json!({"B1": 20, "B5": 1})))
            .unwrap();
        assert_eq!(
            calc.results[&CellAddress::new(4, 1)],
            EvaluatedValue::Number(100.0)
        );
        assert!(matches!(
            service.calculate("nope", &InputPatch::new()),
            Err(Error::WorkbookNotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn test_upload_list_delete() {
        let mut service = service();
        let first = upload_csv(&mut service);
        let second = upload_csv(&mut service);
        assert_ne!(first, second);

        let listed = service.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].metadata.file_name.as_deref(), Some("box.csv"));

        let calc = service.calculate(&first, &inputs(json!({"B2": 5}))).unwrap();
        assert_eq!(
            calc.results[&CellAddress::new(2, 1)],
            EvaluatedValue::Number(50.0)
        );

        service.delete(&first).unwrap();
        assert!(matches!(service.delete(&first), Err(Error::WorkbookNotFound(_))));
        assert_eq!(service.list().unwrap().len(), 1);
    }

    #[test]
    fn test_set_cell_input_persists() {
        let mut service = service();
        let id = upload_csv(&mut service);

        let view = service.set_cell_input(&id, "B1", false).unwrap();
        assert!(!view.cells.iter().any(|c| c.address == CellAddress::new(0, 1) && c.is_input));

        // B1 is no longer writable by clients
        let calc = service.calculate(&id, &inputs(json!({"B1": 1}))).unwrap();
        assert_eq!(
            calc.results[&CellAddress::new(2, 1)],
            EvaluatedValue::Number(40.0)
        );

        assert!(matches!(
            service.set_cell_input(&id, "Z9", true),
            Err(Error::CellNotFound(_))
        ));
        assert!(matches!(
            service.set_cell_input(&id, "b1", true),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            service.set_cell_input("default", "B1", false),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_diagnose_and_export() {
        let service = service();
        let report = service.diagnose("default").unwrap();
        assert!(report.is_clean());

        let dxf = service
            .export_dxf("default", &inputs(json!({"B1": 12})))
            .unwrap();
        assert!(dxf.filename.starts_with("autocad-design_"));
        assert!(dxf.filename.ends_with(".dxf"));
        assert!(dxf.content.contains("\n11\n12\n"));
    }

    #[test]
    fn test_diagnose_reports_unparsable_formula() {
        let mut service = service();
        let id = service
            .upload(b"Length,10\nArea,=B1*+*2\n", "broken.csv", None)
            .unwrap()
            .workbook_id;

        assert!(matches!(
            service.calculate(&id, &InputPatch::new()),
            Err(Error::EngineInit(_))
        ));

        let report = service.diagnose(&id).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].address, CellAddress::new(1, 1));
        assert_eq!(report.errors[0].error, crate::ErrorCode::Error);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.starts_with("1 #ERROR! found.")));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_upload_rejects_garbage() {
        let mut service = service();
        assert!(matches!(
            service.upload(b"garbage", "book.xlsx", None),
            Err(Error::Ingestion(_))
        ));
        assert!(service.list().unwrap().is_empty());
    }
}
