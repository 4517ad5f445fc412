//! Workbook configuration: the persisted, formula-bearing description of a
//! calculator, and the formula-free view handed to clients.

use crate::cell::{CellAddress, CellDefinition, CellRange, LiteralValue};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A validated workbook configuration
///
/// `cells` is sparse and keeps the author's order; `rows`/`cols` describe the
/// dense display grid and always cover every populated cell. Instances are
/// immutable: administrative edits such as [`with_input_flag`] return a new
/// configuration.
///
/// [`with_input_flag`]: WorkbookConfig::with_input_flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedConfig")]
pub struct WorkbookConfig {
    name: String,
    description: String,
    rows: u32,
    cols: u32,
    cells: Vec<CellDefinition>,
}

/// Wire shape of a configuration before its invariants are checked
#[derive(Deserialize)]
struct UncheckedConfig {
    name: String,
    #[serde(default)]
    description: String,
    rows: u32,
    cols: u32,
    cells: Vec<CellDefinition>,
}

impl TryFrom<UncheckedConfig> for WorkbookConfig {
    type Error = Error;

    fn try_from(raw: UncheckedConfig) -> Result<Self> {
        WorkbookConfig::builder(raw.name)
            .description(raw.description)
            .dimensions(raw.rows, raw.cols)
            .cells(raw.cells)
            .build()
    }
}

impl WorkbookConfig {
    /// Start building a configuration
    pub fn builder<S: Into<String>>(name: S) -> WorkbookConfigBuilder {
        WorkbookConfigBuilder {
            name: name.into(),
            description: String::new(),
            dimensions: None,
            cells: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of rows in the display grid
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns in the display grid
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Populated cells, in authoring order
    pub fn cells(&self) -> &[CellDefinition] {
        &self.cells
    }

    /// Look up the definition of a cell
    pub fn cell(&self, address: CellAddress) -> Option<&CellDefinition> {
        self.cells.iter().find(|c| c.address == address)
    }

    /// Check whether a cell is populated
    pub fn contains(&self, address: CellAddress) -> bool {
        self.cell(address).is_some()
    }

    /// Cells a client may overwrite
    pub fn input_cells(&self) -> impl Iterator<Item = &CellDefinition> {
        self.cells.iter().filter(|c| c.is_input)
    }

    /// Formula-derived cells
    pub fn formula_cells(&self) -> impl Iterator<Item = &CellDefinition> {
        self.cells.iter().filter(|c| c.has_formula())
    }

    /// Human readable grid size, e.g. `20 rows × 10 cols`
    pub fn dimensions_label(&self) -> String {
        format!("{} rows × {} cols", self.rows, self.cols)
    }

    /// Promote or demote a single cell to/from input
    ///
    /// Returns a new configuration; `self` is left untouched.
    pub fn with_input_flag(&self, address: CellAddress, is_input: bool) -> Result<Self> {
        let index = self
            .cells
            .iter()
            .position(|c| c.address == address)
            .ok_or_else(|| Error::CellNotFound(address.to_string()))?;

        if is_input && self.cells[index].has_formula() {
            return Err(Error::InvalidWorkbook(format!(
                "formula cell {} cannot be an input",
                address
            )));
        }

        let mut updated = self.clone();
        updated.cells[index].is_input = is_input;
        Ok(updated)
    }

    /// The client-facing view of this configuration
    ///
    /// [`PublicCell`] has no formula field, so formulas cannot be serialized
    /// through this view.
    pub fn public_view(&self) -> PublicView {
        PublicView {
            name: self.name.clone(),
            description: self.description.clone(),
            rows: self.rows,
            cols: self.cols,
            cells: self
                .cells
                .iter()
                .map(|c| PublicCell {
                    address: c.address,
                    is_input: c.is_input,
                    label: c.label.clone(),
                    value: c.value.clone(),
                })
                .collect(),
        }
    }
}

/// Builder for [`WorkbookConfig`]
#[derive(Debug, Clone)]
pub struct WorkbookConfigBuilder {
    name: String,
    description: String,
    dimensions: Option<(u32, u32)>,
    cells: Vec<CellDefinition>,
}

impl WorkbookConfigBuilder {
    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Explicit grid size; defaults to the bounding box of the cells
    pub fn dimensions(mut self, rows: u32, cols: u32) -> Self {
        self.dimensions = Some((rows, cols));
        self
    }

    pub fn cell(mut self, cell: CellDefinition) -> Self {
        self.cells.push(cell);
        self
    }

    pub fn cells<I: IntoIterator<Item = CellDefinition>>(mut self, cells: I) -> Self {
        self.cells.extend(cells);
        self
    }

    /// Validate and build the configuration
    ///
    /// Fails with [`Error::InvalidWorkbook`] on duplicate addresses, on cells
    /// with both or neither of formula and value, on formula cells flagged as
    /// inputs, or on cells outside explicit dimensions.
    pub fn build(self) -> Result<WorkbookConfig> {
        let mut seen = HashSet::with_capacity(self.cells.len());
        let mut bounds: Option<CellRange> = None;

        for cell in &self.cells {
            let addr = cell.address;
            if !seen.insert(addr) {
                return Err(Error::InvalidWorkbook(format!("duplicate cell {}", addr)));
            }
            match (&cell.formula, &cell.value) {
                (Some(_), Some(_)) => {
                    return Err(Error::InvalidWorkbook(format!(
                        "cell {} has both a formula and a value",
                        addr
                    )))
                }
                (None, None) => {
                    return Err(Error::InvalidWorkbook(format!(
                        "cell {} has neither a formula nor a value",
                        addr
                    )))
                }
                (Some(_), None) if cell.is_input => {
                    return Err(Error::InvalidWorkbook(format!(
                        "formula cell {} cannot be an input",
                        addr
                    )))
                }
                _ => {}
            }
            let here = CellRange::single(addr);
            bounds = Some(bounds.map_or(here, |b| b.union(&here)));
        }

        let (min_rows, min_cols) = bounds.map_or((0, 0), |b| (b.end.row + 1, b.end.col + 1));
        let (rows, cols) = match self.dimensions {
            Some((rows, cols)) => {
                if rows < min_rows || cols < min_cols {
                    return Err(Error::InvalidWorkbook(format!(
                        "cells extend to {} rows × {} cols but the grid is {} rows × {} cols",
                        min_rows, min_cols, rows, cols
                    )));
                }
                (rows, cols)
            }
            None => (min_rows, min_cols),
        };

        Ok(WorkbookConfig {
            name: self.name,
            description: self.description,
            rows,
            cols,
            cells: self.cells,
        })
    }
}

/// Formula-free view of a workbook configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicView {
    pub name: String,
    pub description: String,
    pub rows: u32,
    pub cols: u32,
    pub cells: Vec<PublicCell>,
}

/// A cell as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCell {
    pub address: CellAddress,
    pub is_input: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<LiteralValue>,
}

/// The built-in box calculator: length, width and height inputs in B1:B3 and
/// derived area, volume, perimeter and surface area in B5:B8.
pub fn default_workbook() -> WorkbookConfig {
    let at = CellAddress::new;
    let caption = |row: u32, text: &str| {
        CellDefinition::literal(at(row, 0), text).with_label(format!("{} Label", text))
    };
    let input = |row: u32, text: &str, value: f64| {
        CellDefinition::input(at(row, 1), value).with_label(format!("{} Value", text))
    };
    let derived = |row: u32, text: &str, formula: &str| {
        CellDefinition::formula(at(row, 1), formula).with_label(format!("{} Value", text))
    };

    WorkbookConfig {
        name: "AutoCAD Design Calculator".into(),
        description: "Calculate design parameters for AutoCAD".into(),
        rows: 20,
        cols: 10,
        cells: vec![
            caption(0, "Length"),
            input(0, "Length", 10.0),
            caption(1, "Width"),
            input(1, "Width", 5.0),
            caption(2, "Height"),
            input(2, "Height", 3.0),
            caption(4, "Area"),
            derived(4, "Area", "=B1*B2"),
            caption(5, "Volume"),
            derived(5, "Volume", "=B1*B2*B3"),
            caption(6, "Perimeter"),
            derived(6, "Perimeter", "=2*(B1+B2)"),
            caption(7, "Surface Area"),
            derived(7, "Surface Area", "=2*(B1*B2+B2*B3+B1*B3)"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    fn small_config() -> WorkbookConfig {
        WorkbookConfig::builder("Small")
            .cell(CellDefinition::input(addr("A1"), 5))
            .cell(CellDefinition::formula(addr("B1"), "=A1*2"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_derives_bounding_box() {
        let config = WorkbookConfig::builder("Sparse")
            .cell(CellDefinition::literal(addr("C7"), "x"))
            .cell(CellDefinition::literal(addr("A2"), 1))
            .build()
            .unwrap();
        assert_eq!((config.rows(), config.cols()), (7, 3));
        // Authoring order is kept
        assert_eq!(config.cells()[0].address, addr("C7"));
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let err = WorkbookConfig::builder("Dup")
            .cell(CellDefinition::literal(addr("A1"), 1))
            .cell(CellDefinition::literal(addr("A1"), 2))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidWorkbook(_)));
    }

    #[test]
    fn test_build_rejects_mixed_or_empty_content() {
        let mut both = CellDefinition::formula(addr("A1"), "=1");
        both.value = Some(LiteralValue::Number(1.0));
        let neither = CellDefinition {
            formula: None,
            ..CellDefinition::literal(addr("A2"), 1)
        };
        let neither = CellDefinition {
            value: None,
            ..neither
        };

        for cell in [both, neither] {
            let err = WorkbookConfig::builder("Bad").cell(cell).build().unwrap_err();
            assert!(matches!(err, Error::InvalidWorkbook(_)));
        }
    }

    #[test]
    fn test_build_rejects_formula_inputs_and_small_grids() {
        let err = WorkbookConfig::builder("Bad")
            .cell(CellDefinition::formula(addr("A1"), "=1").with_input(true))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidWorkbook(_)));

        let err = WorkbookConfig::builder("Bad")
            .dimensions(2, 2)
            .cell(CellDefinition::literal(addr("C1"), 1))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidWorkbook(_)));
    }

    #[test]
    fn test_with_input_flag_returns_new_config() {
        let config = small_config();
        let demoted = config.with_input_flag(addr("A1"), false).unwrap();

        assert!(config.cell(addr("A1")).unwrap().is_input);
        assert!(!demoted.cell(addr("A1")).unwrap().is_input);
        assert_eq!(demoted.cells().len(), config.cells().len());
    }

    #[test]
    fn test_with_input_flag_errors() {
        let config = small_config();
        assert!(matches!(
            config.with_input_flag(addr("Z9"), true),
            Err(Error::CellNotFound(a)) if a == "Z9"
        ));
        assert!(matches!(
            config.with_input_flag(addr("B1"), true),
            Err(Error::InvalidWorkbook(_))
        ));
    }

    #[test]
    fn test_public_view_never_contains_formulas() {
        let config = default_workbook();
        let json = serde_json::to_string(&config.public_view()).unwrap();

        for cell in config.formula_cells() {
            let formula = cell.formula.as_deref().unwrap();
            assert!(!json.contains(formula), "{} leaked into {}", formula, json);
            assert!(!json.contains(formula.trim_start_matches('=')));
        }
        assert!(!json.contains("formula"));
    }

    #[test]
    fn test_public_view_shape() {
        let view = small_config().public_view();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "Small",
                "description": "",
                "rows": 1,
                "cols": 2,
                "cells": [
                    {"address": "A1", "isInput": true, "value": 5.0},
                    {"address": "B1", "isInput": false}
                ]
            })
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{"name":"X","rows":1,"cols":1,
            "cells":[{"address":"A1","value":1},{"address":"A1","value":2}]}"#;
        assert!(serde_json::from_str::<WorkbookConfig>(json).is_err());

        let config = default_workbook();
        let json = serde_json::to_string(&config).unwrap();
        let back: WorkbookConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_default_workbook() {
        let config = default_workbook();
        assert_eq!(config.name(), "AutoCAD Design Calculator");
        assert_eq!((config.rows(), config.cols()), (20, 10));
        assert_eq!(config.cells().len(), 14);
        assert_eq!(config.input_cells().count(), 3);
        assert_eq!(config.formula_cells().count(), 4);
        assert_eq!(
            config.cell(addr("B6")).unwrap().formula.as_deref(),
            Some("=B1*B2*B3")
        );
        assert_eq!(
            config.cell(addr("A1")).unwrap().label.as_deref(),
            Some("Length Label")
        );

        // Passes the same validation as any other config
        let rebuilt = WorkbookConfig::builder(config.name())
            .description(config.description())
            .dimensions(config.rows(), config.cols())
            .cells(config.cells().to_vec())
            .build()
            .unwrap();
        assert_eq!(rebuilt, config);
    }
}
