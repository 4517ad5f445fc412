//! Formula diagnostics for workbook administrators
//!
//! Best effort: references are found with a regex over the formula text, so
//! malformed formulas are still scanned rather than rejected.

use crate::adapter::CellValues;
use crate::{CellAddress, ErrorCode, EvaluatedValue, WorkbookConfig};
use lazy_regex::regex;
use serde::Serialize;

/// A formula cell whose value is an error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellErrorReport {
    pub address: CellAddress,
    pub error: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    pub reason: String,
}

/// A formula referencing cells the workbook does not define
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingDependencyWarning {
    pub address: CellAddress,
    pub formula: String,
    pub missing_cells: Vec<String>,
    pub message: String,
}

/// Per-cell summary; carries no formula text
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellInfo {
    pub address: CellAddress,
    pub is_input: bool,
    pub has_formula: bool,
    pub value: EvaluatedValue,
    pub has_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_dependencies: Vec<String>,
}

/// Cell counts for a workbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSummary {
    pub total_cells: usize,
    pub input_cells: usize,
    pub formula_cells: usize,
    pub error_cells: usize,
    pub warning_cells: usize,
    pub dimensions: String,
}

/// Full diagnostics report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub workbook_name: String,
    pub summary: DiagnosticsSummary,
    pub errors: Vec<CellErrorReport>,
    pub warnings: Vec<MissingDependencyWarning>,
    pub cell_info: Vec<CellInfo>,
    pub recommendations: Vec<String>,
}

impl DiagnosticsReport {
    /// True when there are neither errors nor warnings
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Analyzes a workbook against its evaluated values
pub struct DiagnosticsAnalyzer;

impl DiagnosticsAnalyzer {
    /// Build a report; cells missing from `values` count as empty
    pub fn analyze(config: &WorkbookConfig, values: &CellValues) -> DiagnosticsReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut cell_info = Vec::with_capacity(config.cells().len());

        for cell in config.cells() {
            let value = values.get(&cell.address).cloned().unwrap_or_default();
            let formula = cell.formula.as_deref();

            let error_type = value.error_code();
            if let Some(code) = error_type {
                errors.push(CellErrorReport {
                    address: cell.address,
                    error: code,
                    formula: formula.map(str::to_string),
                    reason: error_reason(code, formula, config),
                });
            }

            let missing = formula
                .map(|f| missing_references(f, config))
                .unwrap_or_default();
            if let (Some(formula), false) = (formula, missing.is_empty()) {
                warnings.push(MissingDependencyWarning {
                    address: cell.address,
                    formula: formula.to_string(),
                    missing_cells: missing.clone(),
                    message: format!(
                        "Formula references cells that don't exist: {}",
                        missing.join(", ")
                    ),
                });
            }

            cell_info.push(CellInfo {
                address: cell.address,
                is_input: cell.is_input,
                has_formula: cell.has_formula(),
                value,
                has_error: error_type.is_some(),
                error_type,
                missing_dependencies: missing,
            });
        }

        let summary = DiagnosticsSummary {
            total_cells: config.cells().len(),
            input_cells: config.input_cells().count(),
            formula_cells: config.formula_cells().count(),
            error_cells: errors.len(),
            warning_cells: warnings.len(),
            dimensions: config.dimensions_label(),
        };

        tracing::debug!(
            workbook = config.name(),
            errors = errors.len(),
            warnings = warnings.len(),
            "analyzed workbook"
        );

        let recommendations = recommendations(&errors, &warnings);
        DiagnosticsReport {
            workbook_name: config.name().to_string(),
            summary,
            errors,
            warnings,
            cell_info,
            recommendations,
        }
    }
}

/// Address-shaped tokens in a formula, `$` stripped, first occurrence order
///
/// ```
/// use vault_sheets::diagnostics::extract_references;
///
/// assert_eq!(extract_references("=$A$1+B2*A1"), vec!["A1", "B2"]);
/// ```
pub fn extract_references(formula: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    for token in regex!(r"\$?[A-Z]+\$?\d+").find_iter(formula) {
        let reference = token.as_str().replace('$', "");
        if !refs.contains(&reference) {
            refs.push(reference);
        }
    }
    refs
}

fn missing_references(formula: &str, config: &WorkbookConfig) -> Vec<String> {
    extract_references(formula)
        .into_iter()
        .filter(|reference| !is_defined(reference, config))
        .collect()
}

fn is_defined(reference: &str, config: &WorkbookConfig) -> bool {
    CellAddress::parse(reference).is_ok_and(|address| config.contains(address))
}

/// Human explanation for an error code
pub fn error_reason(code: ErrorCode, formula: Option<&str>, config: &WorkbookConfig) -> String {
    let Some(formula) = formula else {
        return "No formula defined".to_string();
    };

    match code {
        ErrorCode::Ref => {
            let refs = extract_references(formula);
            let missing = missing_references(formula, config);
            let missing = if missing.is_empty() {
                "none".to_string()
            } else {
                missing.join(", ")
            };
            format!(
                "Invalid cell reference. Formula references: {}. Missing cells: {}",
                refs.join(", "),
                missing
            )
        }
        ErrorCode::Value => "Wrong type of argument or operand. Check if you're trying to do math with text values.".into(),
        ErrorCode::Div0 => "Division by zero. One of the cells in the formula has a value of 0.".into(),
        ErrorCode::Name => "Unrecognized function name. Check for typos in function names.".into(),
        ErrorCode::Na => "Value not available. Common in VLOOKUP when the value isn't found.".into(),
        ErrorCode::Num => "Invalid numeric value. The formula produces a number that's too large or too small.".into(),
        ErrorCode::Error => "General error. The formula has a syntax error or references cells that don't exist yet.".into(),
    }
}

/// Reason for an error string that may not be a known code
pub fn error_reason_for(error: &str, formula: Option<&str>, config: &WorkbookConfig) -> String {
    match ErrorCode::from_code(error) {
        Some(code) => error_reason(code, formula, config),
        None if formula.is_none() => "No formula defined".to_string(),
        None => format!("Unknown error: {}", error),
    }
}

fn recommendations(errors: &[CellErrorReport], warnings: &[MissingDependencyWarning]) -> Vec<String> {
    let mut out = Vec::new();

    if !errors.is_empty() {
        out.push(format!(
            "Found {} formula error(s). Check the errors list for details.",
            errors.len()
        ));

        let refs = errors.iter().filter(|e| e.error == ErrorCode::Ref).count();
        if refs > 0 {
            out.push(format!(
                "{} #REF! error(s) found. These formulas reference cells that don't exist in your Excel file. Make sure all referenced cells are included.",
                refs
            ));
        }

        let generic = errors.iter().filter(|e| e.error == ErrorCode::Error).count();
        if generic > 0 {
            out.push(format!(
                "{} #ERROR! found. These formulas have syntax errors or reference cells that haven't been initialized yet.",
                generic
            ));
        }
    }

    if !warnings.is_empty() {
        out.push(format!(
            "Found {} warning(s) about missing cell dependencies.",
            warnings.len()
        ));
    }

    if errors.is_empty() && warnings.is_empty() {
        out.push("No errors or warnings found! Your workbook looks good.".to_string());
    } else {
        out.push("To fix: Open your Excel file, fix the errors, and re-upload.".to_string());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::EvaluationAdapter;
    use crate::{default_workbook, CellDefinition};
    use pretty_assertions::assert_eq;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    fn evaluate(config: &WorkbookConfig) -> CellValues {
        let mut adapter = EvaluationAdapter::new();
        adapter.load(config.clone()).unwrap();
        adapter.read_all().unwrap()
    }

    #[test]
    fn test_extract_references() {
        assert_eq!(
            extract_references("=SUM($A$1:B$10)+A1+$C3"),
            vec!["A1", "B10", "C3"]
        );
        assert!(extract_references("=1+2").is_empty());
        assert!(extract_references("not a formula (((").is_empty());
    }

    #[test]
    fn test_clean_workbook() {
        let config = default_workbook();
        let report = DiagnosticsAnalyzer::analyze(&config, &evaluate(&config));

        assert!(report.is_clean());
        assert_eq!(
            report.summary,
            DiagnosticsSummary {
                total_cells: 14,
                input_cells: 3,
                formula_cells: 4,
                error_cells: 0,
                warning_cells: 0,
                dimensions: "20 rows × 10 cols".into(),
            }
        );
        assert_eq!(
            report.recommendations,
            vec!["No errors or warnings found! Your workbook looks good.".to_string()]
        );
        assert_eq!(report.workbook_name, "AutoCAD Design Calculator");
    }

    #[test]
    fn test_missing_dependency_warning() {
        let config = WorkbookConfig::builder("Dangling")
            .cell(CellDefinition::formula(addr("A1"), "=Z99+1"))
            .build()
            .unwrap();
        let report = DiagnosticsAnalyzer::analyze(&config, &evaluate(&config));

        // Z99 reads as blank, so there is no visible error
        assert!(report.errors.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].missing_cells, vec!["Z99".to_string()]);
        assert_eq!(
            report.warnings[0].message,
            "Formula references cells that don't exist: Z99"
        );
        assert_eq!(report.cell_info[0].missing_dependencies, vec!["Z99"]);
        assert_eq!(
            report.recommendations,
            vec![
                "Found 1 warning(s) about missing cell dependencies.".to_string(),
                "To fix: Open your Excel file, fix the errors, and re-upload.".to_string(),
            ]
        );
    }

    #[test]
    fn test_error_reports() {
        let config = WorkbookConfig::builder("Broken")
            .cell(CellDefinition::input(addr("A1"), 0))
            .cell(CellDefinition::formula(addr("B1"), "=1/A1"))
            .cell(CellDefinition::formula(addr("B2"), "=B2+C7"))
            .build()
            .unwrap();
        let report = DiagnosticsAnalyzer::analyze(&config, &evaluate(&config));

        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].error, ErrorCode::Div0);
        assert_eq!(report.errors[0].formula.as_deref(), Some("=1/A1"));
        assert_eq!(report.errors[1].error, ErrorCode::Ref);
        assert_eq!(
            report.errors[1].reason,
            "Invalid cell reference. Formula references: B2, C7. Missing cells: C7"
        );
        assert!(report.cell_info[1].has_error);
        assert_eq!(report.cell_info[1].error_type, Some(ErrorCode::Div0));
        assert_eq!(report.summary.error_cells, 2);
        assert_eq!(report.summary.warning_cells, 1);
        assert!(report.recommendations[1].starts_with("1 #REF! error(s) found."));
        assert_eq!(
            report.recommendations.last().map(String::as_str),
            Some("To fix: Open your Excel file, fix the errors, and re-upload.")
        );
    }

    #[test]
    fn test_error_reasons() {
        let config = default_workbook();
        assert_eq!(
            error_reason(ErrorCode::Div0, None, &config),
            "No formula defined"
        );
        assert_eq!(
            error_reason(ErrorCode::Ref, Some("=B1+Q5"), &config),
            "Invalid cell reference. Formula references: B1, Q5. Missing cells: Q5"
        );
        assert_eq!(
            error_reason(ErrorCode::Ref, Some("=B1"), &config),
            "Invalid cell reference. Formula references: B1. Missing cells: none"
        );
        assert_eq!(
            error_reason_for("#SPILL!", Some("=B1"), &config),
            "Unknown error: #SPILL!"
        );
        for code in ErrorCode::ALL {
            assert!(!error_reason(code, Some("=1"), &config).is_empty());
        }
    }

    #[test]
    fn test_cell_info_never_carries_formulas() {
        let config = default_workbook();
        let report = DiagnosticsAnalyzer::analyze(&config, &evaluate(&config));
        let json = serde_json::to_string(&report.cell_info).unwrap();
        assert!(!json.contains("B1*B2"));
    }
}
