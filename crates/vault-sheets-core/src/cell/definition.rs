//! Cell definitions: one entry per populated cell of a workbook configuration

use super::{CellAddress, LiteralValue};
use serde::{Deserialize, Serialize};

/// A populated cell in a workbook configuration
///
/// Exactly one of `formula` and `value` carries content. Formula cells are
/// never inputs; [`WorkbookConfig`](crate::WorkbookConfig) enforces both rules
/// at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellDefinition {
    pub address: CellAddress,
    /// Formula text including the leading `=`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<LiteralValue>,
    #[serde(default)]
    pub is_input: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CellDefinition {
    /// A formula cell
    pub fn formula<S: Into<String>>(address: CellAddress, formula: S) -> Self {
        Self {
            address,
            formula: Some(formula.into()),
            value: None,
            is_input: false,
            label: None,
        }
    }

    /// A literal (non-input) cell
    pub fn literal<V: Into<LiteralValue>>(address: CellAddress, value: V) -> Self {
        Self {
            address,
            formula: None,
            value: Some(value.into()),
            is_input: false,
            label: None,
        }
    }

    /// A literal cell that clients may overwrite
    pub fn input<V: Into<LiteralValue>>(address: CellAddress, value: V) -> Self {
        Self::literal(address, value).with_input(true)
    }

    pub fn with_input(mut self, is_input: bool) -> Self {
        self.is_input = is_input;
        self
    }

    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Check if the cell is formula-derived
    pub fn has_formula(&self) -> bool {
        self.formula.is_some()
    }
}
