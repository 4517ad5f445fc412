//! DXF export of a rectangular box
//!
//! The box is drawn as twelve `LINE` entities (four bottom edges, four
//! verticals, four top edges) in an AutoCAD R2000 ASCII DXF document.

use crate::adapter::CellValues;
use crate::{CellAddress, Error, EvaluatedValue, Result};
use chrono::{SecondsFormat, Utc};
use std::fmt::Write;

/// Which cells supply the box dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxfOptions {
    pub length: CellAddress,
    pub width: CellAddress,
    pub height: CellAddress,
    /// File extension, without the dot
    pub extension: String,
}

impl Default for DxfOptions {
    fn default() -> Self {
        Self {
            length: CellAddress::new(0, 1),
            width: CellAddress::new(1, 1),
            height: CellAddress::new(2, 1),
            extension: "dxf".to_string(),
        }
    }
}

/// Renders evaluated values as a DXF document
#[derive(Debug, Clone, Default)]
pub struct DxfExporter {
    options: DxfOptions,
}

/// Fixed zero coordinate, written the way the template always has
const ORIGIN: &str = "0.0";

impl DxfExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DxfOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DxfOptions {
        &self.options
    }

    /// Render the box; missing or non-numeric dimensions are 0
    pub fn generate(&self, values: &CellValues) -> Result<String> {
        let length = coordinate(dimension(values, self.options.length));
        let width = coordinate(dimension(values, self.options.width));
        let height = coordinate(dimension(values, self.options.height));
        let (l, w, h, o) = (length.as_str(), width.as_str(), height.as_str(), ORIGIN);

        let edges: [([&str; 3], [&str; 3]); 12] = [
            // bottom
            ([o, o, o], [l, o, o]),
            ([l, o, o], [l, w, o]),
            ([l, w, o], [o, w, o]),
            ([o, w, o], [o, o, o]),
            // verticals
            ([o, o, o], [o, o, h]),
            ([l, o, o], [l, o, h]),
            ([l, w, o], [l, w, h]),
            ([o, w, o], [o, w, h]),
            // top
            ([o, o, h], [l, o, h]),
            ([l, o, h], [l, w, h]),
            ([l, w, h], [o, w, h]),
            ([o, w, h], [o, o, h]),
        ];

        let mut doc = Document::default();
        doc.write_prologue().map_err(export_error)?;
        for (start, end) in edges {
            doc.line(start, end).map_err(export_error)?;
        }
        doc.pairs(&[("0", "ENDSEC"), ("0", "EOF")])
            .map_err(export_error)?;

        Ok(doc.finish())
    }

    /// `<prefix>_<UTC timestamp>.<extension>` with `:` and `.` in the
    /// timestamp replaced by `-`
    pub fn filename(&self, prefix: &str) -> String {
        let timestamp = Utc::now()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        format!("{}_{}.{}", prefix, timestamp, self.options.extension)
    }
}

fn export_error(err: std::fmt::Error) -> Error {
    Error::Export(err.to_string())
}

fn dimension(values: &CellValues, address: CellAddress) -> f64 {
    match values.get(&address) {
        Some(EvaluatedValue::Number(n)) if n.is_finite() => *n,
        Some(EvaluatedValue::Text(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Shortest round-trip form: `10`, `2.5`
fn coordinate(n: f64) -> String {
    // Avoid "-0"
    let n = if n == 0.0 { 0.0 } else { n };
    n.to_string()
}

/// Group code / value pairs, one per line
#[derive(Default)]
struct Document {
    out: String,
}

impl Document {
    fn pairs(&mut self, pairs: &[(&str, &str)]) -> std::fmt::Result {
        for (code, value) in pairs {
            if !self.out.is_empty() {
                self.out.push('\n');
            }
            write!(self.out, "{}\n{}", code, value)?;
        }
        Ok(())
    }

    fn write_prologue(&mut self) -> std::fmt::Result {
        // HEADER
        self.pairs(&[
            ("0", "SECTION"),
            ("2", "HEADER"),
            ("9", "$ACADVER"),
            ("1", "AC1015"),
            ("9", "$INSUNITS"),
            ("70", "4"),
            ("0", "ENDSEC"),
        ])?;
        // TABLES: continuous line type and layer 0
        self.pairs(&[
            ("0", "SECTION"),
            ("2", "TABLES"),
            ("0", "TABLE"),
            ("2", "LTYPE"),
            ("70", "1"),
            ("0", "LTYPE"),
            ("2", "CONTINUOUS"),
            ("70", "0"),
            ("3", "Solid line"),
            ("72", "65"),
            ("73", "0"),
            ("40", "0.0"),
            ("0", "ENDTAB"),
            ("0", "TABLE"),
            ("2", "LAYER"),
            ("70", "1"),
            ("0", "LAYER"),
            ("2", "0"),
            ("70", "0"),
            ("62", "7"),
            ("6", "CONTINUOUS"),
            ("0", "ENDTAB"),
            ("0", "ENDSEC"),
        ])?;
        self.pairs(&[("0", "SECTION"), ("2", "ENTITIES")])
    }

    fn line(&mut self, start: [&str; 3], end: [&str; 3]) -> std::fmt::Result {
        self.pairs(&[
            ("0", "LINE"),
            ("8", "0"),
            ("10", start[0]),
            ("20", start[1]),
            ("30", start[2]),
            ("11", end[0]),
            ("21", end[1]),
            ("31", end[2]),
        ])
    }

    fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn values(pairs: &[(&str, EvaluatedValue)]) -> CellValues {
        pairs
            .iter()
            .map(|(a, v)| (CellAddress::parse(a).unwrap(), v.clone()))
            .collect()
    }

    fn box_values(l: f64, w: f64, h: f64) -> CellValues {
        values(&[
            ("B1", EvaluatedValue::Number(l)),
            ("B2", EvaluatedValue::Number(w)),
            ("B3", EvaluatedValue::Number(h)),
        ])
    }

    /// Parse LINE entities back into (start, end) coordinate strings
    fn lines(doc: &str) -> Vec<Vec<String>> {
        let tokens: Vec<&str> = doc.split('\n').collect();
        let mut out = Vec::new();
        let mut i = 0;
        while i + 1 < tokens.len() {
            if tokens[i] == "0" && tokens[i + 1] == "LINE" {
                let coords = (0..6)
                    .map(|k| tokens[i + 5 + 2 * k].to_string())
                    .collect();
                out.push(coords);
                i += 16;
            } else {
                i += 2;
            }
        }
        out
    }

    #[test]
    fn test_twelve_edges() {
        let doc = DxfExporter::new().generate(&box_values(10.0, 5.0, 3.0)).unwrap();
        let edges = lines(&doc);

        assert_eq!(edges.len(), 12);
        assert_eq!(doc.matches("\nLINE\n").count(), 12);
        assert_eq!(edges[0], vec!["0.0", "0.0", "0.0", "10", "0.0", "0.0"]);
        assert_eq!(edges[6], vec!["10", "5", "0.0", "10", "5", "3"]);
        assert_eq!(edges[11], vec!["0.0", "5", "3", "0.0", "0.0", "3"]);
    }

    #[test]
    fn test_document_frame() {
        let doc = DxfExporter::new().generate(&box_values(1.0, 1.0, 1.0)).unwrap();
        assert!(doc.starts_with("0\nSECTION\n2\nHEADER\n9\n$ACADVER\n1\nAC1015\n"));
        assert!(doc.contains("9\n$INSUNITS\n70\n4\n"));
        assert!(doc.contains("2\nCONTINUOUS\n70\n0\n3\nSolid line\n"));
        assert!(doc.ends_with("0\nENDSEC\n0\nEOF"));
        assert_eq!(doc.matches("SECTION").count(), 3);
    }

    #[test]
    fn test_missing_and_non_numeric_dimensions() {
        let doc = DxfExporter::new()
            .generate(&values(&[
                ("B1", EvaluatedValue::Text("wide".into())),
                ("B2", EvaluatedValue::Text(" 2.5 ".into())),
                ("B3", EvaluatedValue::Error(crate::ErrorCode::Div0)),
            ]))
            .unwrap();
        let edges = lines(&doc);
        assert_eq!(edges[1], vec!["0", "0.0", "0.0", "0", "2.5", "0.0"]);
        assert!(!doc.contains("wide"));
        assert!(!doc.contains("#DIV/0!"));

        let doc = DxfExporter::new().generate(&CellValues::new()).unwrap();
        assert_eq!(lines(&doc).len(), 12);
    }

    #[test]
    fn test_custom_addresses() {
        let exporter = DxfExporter::with_options(DxfOptions {
            length: CellAddress::parse("B5").unwrap(),
            ..DxfOptions::default()
        });
        let mut vals = box_values(10.0, 5.0, 3.0);
        vals.insert(CellAddress::parse("B5").unwrap(), EvaluatedValue::Number(50.0));
        let doc = exporter.generate(&vals).unwrap();
        assert_eq!(lines(&doc)[0][3], "50");
    }

    #[test]
    fn test_filename() {
        let name = DxfExporter::new().filename("design");
        assert!(name.starts_with("design_"));
        assert!(name.ends_with("Z.dxf"));
        let stamp = &name["design_".len()..name.len() - ".dxf".len()];
        assert!(!stamp.contains(':'));
        assert!(!stamp.contains('.'));
        // e.g. 2024-05-01T10-20-30-123Z
        assert_eq!(stamp.len(), 24);
    }
}
