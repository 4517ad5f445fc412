//! Spreadsheet ingestion
//!
//! Turns an uploaded document into a [`WorkbookConfig`] plus a display
//! preview. Only the first worksheet is read. Cells are classified as:
//!
//! | Source cell | Definition | Preview type |
//! |---|---|---|
//! | error literal or rich value | none | `empty` |
//! | formula | `=` + formula, not an input, label `<addr> Formula` | `formula` |
//! | number | value, **input**, label `<addr> Value` | `number` |
//! | text | value, not an input, label `<addr> Label` | `text` |
//! | boolean | value, not an input, label `<addr> Boolean` | `boolean` |

use crate::{
    CellAddress, CellDefinition, CellRange, Error, EvaluatedValue, LiteralValue, Result,
    WorkbookConfig,
};
use serde::Serialize;
use std::path::Path;
use vault_sheets_xlsx::{RawCell, RawSheet, RawValue, XlsxReader};

/// Name given to uploads without one
pub const DEFAULT_WORKBOOK_NAME: &str = "Uploaded Workbook";

/// Supported source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Xlsx,
    Csv,
}

impl DocumentFormat {
    /// Guess the format from a file name; anything that is not `.csv` is
    /// treated as XLSX
    pub fn from_file_name(file_name: &str) -> Self {
        let is_csv = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            DocumentFormat::Csv
        } else {
            DocumentFormat::Xlsx
        }
    }
}

/// How a source cell was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    Empty,
    Formula,
    Number,
    Text,
    Boolean,
}

/// One cell of the ingestion preview
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewCell {
    /// Literal value, or the cached result for formula cells
    pub value: EvaluatedValue,
    #[serde(rename = "type")]
    pub kind: PreviewKind,
    /// Formula text without the leading `=`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl PreviewCell {
    fn empty() -> Self {
        Self {
            value: EvaluatedValue::Empty,
            kind: PreviewKind::Empty,
            formula: None,
        }
    }
}

/// Result of ingesting a document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ingested {
    pub config: WorkbookConfig,
    /// Dense preview over the used range, top-left corner first
    pub preview: Vec<Vec<PreviewCell>>,
}

/// Converts spreadsheet documents into workbook configurations
pub struct IngestionPipeline;

impl IngestionPipeline {
    /// Ingest a document, picking the reader from the file name
    pub fn ingest(bytes: &[u8], file_name: &str, name: &str) -> Result<Ingested> {
        match DocumentFormat::from_file_name(file_name) {
            DocumentFormat::Xlsx => Self::ingest_xlsx(bytes, name),
            DocumentFormat::Csv => Self::ingest_csv(bytes, name),
        }
    }

    /// Ingest the first worksheet of an XLSX document
    pub fn ingest_xlsx(bytes: &[u8], name: &str) -> Result<Ingested> {
        if bytes.is_empty() {
            return Err(Error::Ingestion("document is empty".into()));
        }
        let sheet = XlsxReader::read_bytes(bytes).map_err(|e| Error::Ingestion(e.to_string()))?;
        let description = format!("Imported from Excel file: {}", sheet.name);
        Self::ingest_sheet(&sheet, name, description)
    }

    /// Ingest a CSV document
    ///
    /// Fields starting with `=` are formulas, numeric fields are numbers,
    /// `TRUE`/`FALSE` are booleans and blank fields are absent.
    pub fn ingest_csv(bytes: &[u8], name: &str) -> Result<Ingested> {
        if bytes.is_empty() {
            return Err(Error::Ingestion("document is empty".into()));
        }
        let sheet = read_csv(bytes)?;
        Self::ingest_sheet(&sheet, name, "Imported from CSV file".to_string())
    }

    fn ingest_sheet(sheet: &RawSheet, name: &str, description: String) -> Result<Ingested> {
        let range = sheet
            .used_range
            .ok_or_else(|| Error::Ingestion(format!("worksheet '{}' is empty", sheet.name)))?;

        let mut cells = Vec::new();
        let mut preview = Vec::with_capacity(range.row_count() as usize);

        for row in range.start.row..=range.end.row {
            let mut preview_row = Vec::with_capacity(range.col_count() as usize);
            for col in range.start.col..=range.end.col {
                let address = CellAddress::new(row, col);
                let (definition, cell) = match sheet.cell(address) {
                    Some(raw) => classify(raw),
                    None => (None, PreviewCell::empty()),
                };
                cells.extend(definition);
                preview_row.push(cell);
            }
            preview.push(preview_row);
        }

        let name = match name.trim() {
            "" => DEFAULT_WORKBOOK_NAME,
            trimmed => trimmed,
        };

        let config = WorkbookConfig::builder(name)
            .description(description)
            .dimensions(range.end.row + 1, range.end.col + 1)
            .cells(cells)
            .build()?;

        tracing::info!(
            workbook = config.name(),
            rows = config.rows(),
            cols = config.cols(),
            cells = config.cells().len(),
            formulas = config.formula_cells().count(),
            "ingested worksheet"
        );

        Ok(Ingested { config, preview })
    }
}

fn classify(raw: &RawCell) -> (Option<CellDefinition>, PreviewCell) {
    let address = raw.address;

    if matches!(raw.value, RawValue::Error(_) | RawValue::Structured) {
        return (None, PreviewCell::empty());
    }

    if let Some(formula) = &raw.formula {
        let cached = match &raw.value {
            RawValue::Number(n) => EvaluatedValue::Number(*n),
            RawValue::Text(s) => EvaluatedValue::Text(s.clone()),
            RawValue::Boolean(b) => EvaluatedValue::Boolean(*b),
            _ => EvaluatedValue::Empty,
        };
        let definition = CellDefinition::formula(address, format!("={}", formula))
            .with_label(format!("{} Formula", address));
        let preview = PreviewCell {
            value: cached,
            kind: PreviewKind::Formula,
            formula: Some(formula.clone()),
        };
        return (Some(definition), preview);
    }

    let (literal, kind, is_input, suffix, shown) = match &raw.value {
        RawValue::Number(n) => (
            LiteralValue::Number(*n),
            PreviewKind::Number,
            true,
            "Value",
            EvaluatedValue::Number(*n),
        ),
        RawValue::Text(s) => (
            LiteralValue::Text(s.clone()),
            PreviewKind::Text,
            false,
            "Label",
            EvaluatedValue::Text(s.clone()),
        ),
        RawValue::Boolean(b) => (
            LiteralValue::Boolean(*b),
            PreviewKind::Boolean,
            false,
            "Boolean",
            EvaluatedValue::Text(b.to_string()),
        ),
        _ => return (None, PreviewCell::empty()),
    };

    let definition = CellDefinition::literal(address, literal)
        .with_input(is_input)
        .with_label(format!("{} {}", address, suffix));
    let preview = PreviewCell {
        value: shown,
        kind,
        formula: None,
    };
    (Some(definition), preview)
}

/// Read a CSV document into the same shape the XLSX reader produces
fn read_csv(bytes: &[u8]) -> Result<RawSheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut cells = Vec::new();
    let mut rows = 0u32;
    let mut cols = 0u32;

    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::Ingestion(e.to_string()))?;
        let row = u32::try_from(row)
            .ok()
            .filter(|r| *r < crate::MAX_ROWS)
            .ok_or_else(|| Error::Ingestion("too many rows".into()))?;
        if record.len() > crate::MAX_COLS as usize {
            return Err(Error::Ingestion(format!(
                "row {} has more than {} fields",
                row + 1,
                crate::MAX_COLS
            )));
        }

        rows = row + 1;
        cols = cols.max(record.len() as u32);

        for (col, field) in record.iter().enumerate() {
            let address = CellAddress::new(row, col as u32);
            let field = field.trim();
            let cell = if let Some(formula) = field.strip_prefix('=') {
                RawCell {
                    address,
                    value: RawValue::Empty,
                    formula: Some(formula.to_string()),
                }
            } else {
                match detect_type(field) {
                    Some(value) => RawCell {
                        address,
                        value,
                        formula: None,
                    },
                    None => continue,
                }
            };
            cells.push(cell);
        }
    }

    let used_range = (rows > 0 && cols > 0)
        .then(|| CellRange::new(CellAddress::new(0, 0), CellAddress::new(rows - 1, cols - 1)));

    Ok(RawSheet {
        name: "Sheet1".to_string(),
        used_range,
        cells,
    })
}

/// Detect the type of a CSV field; blank fields have no value
fn detect_type(field: &str) -> Option<RawValue> {
    if field.is_empty() {
        return None;
    }

    if field.eq_ignore_ascii_case("true") {
        return Some(RawValue::Boolean(true));
    }
    if field.eq_ignore_ascii_case("false") {
        return Some(RawValue::Boolean(false));
    }

    match field.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(RawValue::Number(n)),
        _ => Some(RawValue::Text(field.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    fn raw(address: &str, value: RawValue, formula: Option<&str>) -> RawCell {
        RawCell {
            address: addr(address),
            value,
            formula: formula.map(str::to_string),
        }
    }

    fn sheet(range: &str, cells: Vec<RawCell>) -> RawSheet {
        RawSheet {
            name: "Inputs".into(),
            used_range: Some(CellRange::parse(range).unwrap()),
            cells,
        }
    }

    #[test]
    fn test_classification() {
        let sheet = sheet(
            "A1:C2",
            vec![
                raw("A1", RawValue::Number(5.0), None),
                raw("B1", RawValue::Number(10.0), Some("A1*2")),
                raw("C1", RawValue::Text("Total".into()), None),
                raw("A2", RawValue::Boolean(true), None),
                raw("B2", RawValue::Error("#DIV/0!".into()), Some("1/0")),
                raw("C2", RawValue::Structured, None),
            ],
        );

        let ingested =
            IngestionPipeline::ingest_sheet(&sheet, "Doubler", "test".into()).unwrap();
        let config = &ingested.config;

        assert_eq!(config.cells().len(), 4);
        assert_eq!(
            config.cell(addr("A1")).unwrap(),
            &CellDefinition::input(addr("A1"), 5).with_label("A1 Value")
        );
        assert_eq!(
            config.cell(addr("B1")).unwrap(),
            &CellDefinition::formula(addr("B1"), "=A1*2").with_label("B1 Formula")
        );
        assert_eq!(
            config.cell(addr("C1")).unwrap(),
            &CellDefinition::literal(addr("C1"), "Total").with_label("C1 Label")
        );
        assert_eq!(
            config.cell(addr("A2")).unwrap(),
            &CellDefinition::literal(addr("A2"), true).with_label("A2 Boolean")
        );
        assert!(!config.contains(addr("B2")));
        assert!(!config.contains(addr("C2")));

        let kinds: Vec<Vec<PreviewKind>> = ingested
            .preview
            .iter()
            .map(|row| row.iter().map(|c| c.kind).collect())
            .collect();
        assert_eq!(
            kinds,
            vec![
                vec![PreviewKind::Number, PreviewKind::Formula, PreviewKind::Text],
                vec![PreviewKind::Boolean, PreviewKind::Empty, PreviewKind::Empty],
            ]
        );
        assert_eq!(ingested.preview[0][1].value, EvaluatedValue::Number(10.0));
        assert_eq!(ingested.preview[0][1].formula.as_deref(), Some("A1*2"));
        assert_eq!(
            ingested.preview[1][0].value,
            EvaluatedValue::Text("true".into())
        );
    }

    #[test]
    fn test_dimensions_follow_used_range() {
        // Used range starts at B2 but the grid is anchored at A1
        let sheet = sheet(
            "B2:D4",
            vec![
                raw("B2", RawValue::Number(1.0), None),
                raw("D4", RawValue::Text("x".into()), None),
            ],
        );
        let ingested = IngestionPipeline::ingest_sheet(&sheet, "", "test".into()).unwrap();

        assert_eq!((ingested.config.rows(), ingested.config.cols()), (4, 4));
        assert_eq!(ingested.config.name(), DEFAULT_WORKBOOK_NAME);
        assert_eq!(ingested.preview.len(), 3);
        assert!(ingested.preview.iter().all(|row| row.len() == 3));
        assert_eq!(ingested.preview[0][0].kind, PreviewKind::Number);
        assert_eq!(ingested.preview[2][2].kind, PreviewKind::Text);
    }

    #[test]
    fn test_uncalculated_formula_has_blank_preview() {
        let sheet = sheet("A1", vec![raw("A1", RawValue::Empty, Some("SUM(B1:B3)"))]);
        let ingested = IngestionPipeline::ingest_sheet(&sheet, "x", "test".into()).unwrap();

        assert_eq!(
            ingested.config.cells()[0].formula.as_deref(),
            Some("=SUM(B1:B3)")
        );
        assert_eq!(ingested.preview[0][0].value, EvaluatedValue::Empty);
        assert_eq!(ingested.preview[0][0].kind, PreviewKind::Formula);
    }

    #[test]
    fn test_empty_sheet_is_rejected() {
        let sheet = RawSheet {
            name: "Blank".into(),
            used_range: None,
            cells: Vec::new(),
        };
        assert!(matches!(
            IngestionPipeline::ingest_sheet(&sheet, "x", "test".into()),
            Err(Error::Ingestion(_))
        ));
        assert!(matches!(
            IngestionPipeline::ingest_xlsx(&[], "x"),
            Err(Error::Ingestion(_))
        ));
        assert!(matches!(
            IngestionPipeline::ingest_xlsx(b"not a zip", "x"),
            Err(Error::Ingestion(_))
        ));
    }

    #[test]
    fn test_csv_ingestion() {
        let csv = b"Length,10\nWidth,5\nArea,=B1*B2,,\nDone,TRUE\n";
        let ingested = IngestionPipeline::ingest_csv(csv, "Box").unwrap();
        let config = &ingested.config;

        assert_eq!(config.description(), "Imported from CSV file");
        assert_eq!((config.rows(), config.cols()), (4, 4));
        assert_eq!(config.cells().len(), 8);
        assert!(config.cell(addr("B1")).unwrap().is_input);
        assert_eq!(
            config.cell(addr("B3")).unwrap().formula.as_deref(),
            Some("=B1*B2")
        );
        assert_eq!(
            config.cell(addr("B4")).unwrap().value,
            Some(LiteralValue::Boolean(true))
        );
        assert!(!config.contains(addr("C3")));
        assert_eq!(ingested.preview[2][1].formula.as_deref(), Some("B1*B2"));
        assert_eq!(ingested.preview[3][3].kind, PreviewKind::Empty);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(DocumentFormat::from_file_name("data.CSV"), DocumentFormat::Csv);
        assert_eq!(DocumentFormat::from_file_name("book.xlsx"), DocumentFormat::Xlsx);
        assert_eq!(DocumentFormat::from_file_name("noext"), DocumentFormat::Xlsx);
    }

    #[test]
    fn test_detect_type() {
        assert_eq!(detect_type(""), None);
        assert_eq!(detect_type("3.5"), Some(RawValue::Number(3.5)));
        assert_eq!(detect_type("False"), Some(RawValue::Boolean(false)));
        assert_eq!(detect_type("inf"), Some(RawValue::Text("inf".into())));
        assert_eq!(detect_type("abc"), Some(RawValue::Text("abc".into())));
    }

    #[test]
    fn test_preview_json_shape() {
        let sheet = sheet(
            "A1:B1",
            vec![
                raw("A1", RawValue::Number(2.0), None),
                raw("B1", RawValue::Number(4.0), Some("A1*2")),
            ],
        );
        let ingested = IngestionPipeline::ingest_sheet(&sheet, "x", "test".into()).unwrap();
        assert_eq!(
            serde_json::to_value(&ingested.preview).unwrap(),
            serde_json::json!([[
                {"value": 2.0, "type": "number"},
                {"value": 4.0, "type": "formula", "formula": "A1*2"}
            ]])
        );
    }
}
