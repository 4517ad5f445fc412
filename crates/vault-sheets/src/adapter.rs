//! Evaluation adapter
//!
//! Loads a [`WorkbookConfig`] into an [`EvaluationEngine`], applies client
//! input patches and reads sanitized values back. An adapter is meant to live
//! for a single request: build it, load, apply inputs, read, drop.
//!
//! # Example
//!
//! ```rust
//! use vault_sheets::adapter::{EvaluationAdapter, InputPatch};
//! use vault_sheets::{default_workbook, CellAddress, EvaluatedValue};
//!
//! let mut adapter = EvaluationAdapter::new();
//! adapter.load(default_workbook()).unwrap();
//!
//! let mut inputs = InputPatch::new();
//! inputs.insert("B1".into(), serde_json::json!(20));
//! adapter.apply_inputs(&inputs).unwrap();
//!
//! let values = adapter.read_all().unwrap();
//! let area = CellAddress::parse("B5").unwrap();
//! assert_eq!(values[&area], EvaluatedValue::Number(100.0));
//! ```

use crate::{
    CellAddress, CellContent, CellWrite, EngineValue, Error, ErrorCode, EvaluatedValue,
    EvaluationEngine, LiteralValue, PublicView, Result, WorkbookConfig,
};
use serde::Serialize;
use std::collections::BTreeMap;
use vault_sheets_formula::{EngineOptions, FormulaEngine};

/// Client input patch: A1 address → JSON value
pub type InputPatch = serde_json::Map<String, serde_json::Value>;

/// Evaluated values keyed by address
pub type CellValues = BTreeMap<CellAddress, EvaluatedValue>;

/// One entry of the dense display grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCell {
    pub value: EvaluatedValue,
}

/// Dense `rows × cols` display grid
pub type Grid = Vec<Vec<GridCell>>;

/// Lifecycle of an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// No workbook loaded yet
    Uninitialized,
    /// Workbook written into the engine, no inputs applied
    Loaded,
    /// At least one input patch applied
    Evaluated,
}

/// Bridges a workbook configuration and an evaluation engine
#[derive(Debug)]
pub struct EvaluationAdapter<E: EvaluationEngine = FormulaEngine> {
    engine: E,
    config: Option<WorkbookConfig>,
    state: AdapterState,
}

impl EvaluationAdapter<FormulaEngine> {
    /// Create an adapter backed by a strict [`FormulaEngine`]
    pub fn new() -> Self {
        Self::with_engine(FormulaEngine::new())
    }

    /// Create an adapter backed by a [`FormulaEngine`] with custom options
    pub fn with_options(options: EngineOptions) -> Self {
        Self::with_engine(FormulaEngine::with_options(options))
    }
}

impl Default for EvaluationAdapter<FormulaEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EvaluationEngine> EvaluationAdapter<E> {
    /// Create an adapter around any engine
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine,
            config: None,
            state: AdapterState::Uninitialized,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> AdapterState {
        self.state
    }

    /// The loaded configuration
    pub fn config(&self) -> Option<&WorkbookConfig> {
        self.config.as_ref()
    }

    /// The backing engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Write every cell of `config` into the engine
    ///
    /// Fails with [`Error::EngineInit`] when the engine rejects a formula; the
    /// adapter then stays uninitialized.
    pub fn load(&mut self, config: WorkbookConfig) -> Result<()> {
        if self.state != AdapterState::Uninitialized {
            return Err(Error::InvalidState("workbook already loaded".into()));
        }

        let writes: Vec<CellWrite> = config
            .cells()
            .iter()
            .filter_map(|cell| {
                let content = match (&cell.formula, &cell.value) {
                    (Some(formula), _) => CellContent::Formula(formula.clone()),
                    (None, Some(value)) => CellContent::Literal(value.clone()),
                    (None, None) => return None,
                };
                Some(CellWrite::new(cell.address, content))
            })
            .collect();

        self.engine
            .write(&writes)
            .map_err(|e| Error::EngineInit(e.to_string()))?;

        tracing::debug!(
            workbook = config.name(),
            cells = writes.len(),
            "loaded workbook into engine"
        );

        self.config = Some(config);
        self.state = AdapterState::Loaded;
        Ok(())
    }

    /// Apply client inputs and recalculate
    ///
    /// Entries are dropped without error when the address is malformed, not
    /// part of the workbook, not an input cell, or the value is an array or
    /// object. Returns the number of entries applied.
    pub fn apply_inputs(&mut self, inputs: &InputPatch) -> Result<usize> {
        let config = self.loaded_config()?;

        let mut writes = Vec::with_capacity(inputs.len());
        for (key, value) in inputs {
            let Ok(address) = CellAddress::parse(key) else {
                tracing::debug!(address = %key, "ignoring input for malformed address");
                continue;
            };
            if !config.cell(address).is_some_and(|cell| cell.is_input) {
                tracing::debug!(address = %address, "ignoring input for non-input cell");
                continue;
            }
            match input_content(value) {
                Some(content) => writes.push(CellWrite::new(address, content)),
                None => tracing::debug!(address = %address, "ignoring structured input value"),
            }
        }

        // Every accepted value was already checked, so the engine cannot
        // reject the batch on formula grounds
        self.engine
            .write(&writes)
            .map_err(|e| Error::other(e.to_string()))?;

        self.state = AdapterState::Evaluated;
        Ok(writes.len())
    }

    /// Read every configured cell
    pub fn read_all(&self) -> Result<CellValues> {
        let config = self.loaded_config()?;
        Ok(config
            .cells()
            .iter()
            .map(|cell| (cell.address, sanitize(self.engine.read(cell.address))))
            .collect())
    }

    /// Read the dense display grid, including cells the workbook never
    /// defines
    pub fn read_grid(&self) -> Result<Grid> {
        let config = self.loaded_config()?;
        let grid = (0..config.rows())
            .map(|row| {
                (0..config.cols())
                    .map(|col| {
                        let address = CellAddress::new(row, col);
                        let raw = self.engine.read(address);
                        if let EngineValue::Error(err) = &raw {
                            tracing::warn!(
                                address = %address,
                                code = %err.code,
                                message = %err.message,
                                "cell error"
                            );
                        }
                        GridCell {
                            value: sanitize(raw),
                        }
                    })
                    .collect()
            })
            .collect();
        Ok(grid)
    }

    /// Formula-free view of the loaded configuration
    pub fn public_view(&self) -> Result<PublicView> {
        Ok(self.loaded_config()?.public_view())
    }

    fn loaded_config(&self) -> Result<&WorkbookConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no workbook loaded".into()))
    }
}

/// Flatten an engine value into the transport vocabulary
///
/// Only the error code survives; unknown codes become `#ERROR!`.
pub fn sanitize(value: EngineValue) -> EvaluatedValue {
    match value {
        EngineValue::Empty => EvaluatedValue::Empty,
        EngineValue::Number(n) => EvaluatedValue::Number(n),
        EngineValue::Text(s) => EvaluatedValue::Text(s),
        EngineValue::Boolean(b) => EvaluatedValue::Boolean(b),
        EngineValue::Error(err) => {
            EvaluatedValue::Error(ErrorCode::from_code(&err.code).unwrap_or(ErrorCode::Error))
        }
    }
}

/// Convert a client JSON value into cell content
///
/// Strings are never interpreted as formulas: numeric text becomes a number,
/// blank text clears the cell, anything else is stored as text.
fn input_content(value: &serde_json::Value) -> Option<CellContent> {
    use serde_json::Value;

    match value {
        Value::Null => Some(CellContent::Empty),
        Value::Bool(b) => Some(CellContent::Literal(LiteralValue::Boolean(*b))),
        Value::Number(n) => n.as_f64().map(|n| CellContent::Literal(n.into())),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Some(CellContent::Empty);
            }
            let literal = match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => LiteralValue::Number(n),
                _ => LiteralValue::Text(s.clone()),
            };
            Some(CellContent::Literal(literal))
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{default_workbook, CellDefinition, EngineErrorValue};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::convert::Infallible;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    fn patch(value: serde_json::Value) -> InputPatch {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    fn loaded(config: WorkbookConfig) -> EvaluationAdapter {
        let mut adapter = EvaluationAdapter::new();
        adapter.load(config).unwrap();
        adapter
    }

    /// Engine that reports whatever it was told to, for sanitization tests
    #[derive(Default)]
    struct CannedEngine {
        values: BTreeMap<CellAddress, EngineValue>,
    }

    impl EvaluationEngine for CannedEngine {
        type Error = Infallible;

        fn write(&mut self, _writes: &[CellWrite]) -> std::result::Result<(), Infallible> {
            Ok(())
        }

        fn read(&self, address: CellAddress) -> EngineValue {
            self.values.get(&address).cloned().unwrap_or(EngineValue::Empty)
        }
    }

    #[test]
    fn test_lifecycle() {
        let mut adapter = EvaluationAdapter::new();
        assert_eq!(adapter.state(), AdapterState::Uninitialized);
        assert!(matches!(adapter.read_all(), Err(Error::InvalidState(_))));
        assert!(matches!(
            adapter.apply_inputs(&InputPatch::new()),
            Err(Error::InvalidState(_))
        ));

        adapter.load(default_workbook()).unwrap();
        assert_eq!(adapter.state(), AdapterState::Loaded);
        assert!(matches!(
            adapter.load(default_workbook()),
            Err(Error::InvalidState(_))
        ));

        adapter.apply_inputs(&InputPatch::new()).unwrap();
        assert_eq!(adapter.state(), AdapterState::Evaluated);
        adapter.apply_inputs(&InputPatch::new()).unwrap();
        assert_eq!(adapter.state(), AdapterState::Evaluated);
    }

    #[test]
    fn test_load_rejects_bad_formula() {
        let config = WorkbookConfig::builder("Broken")
            .cell(CellDefinition::formula(addr("A1"), "=1+*2"))
            .build()
            .unwrap();

        let mut adapter = EvaluationAdapter::new();
        let err = adapter.load(config).unwrap_err();
        match err {
            Error::EngineInit(message) => {
                assert!(message.contains("A1"), "{}", message);
                assert!(!message.contains("1+*2"), "{}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(adapter.state(), AdapterState::Uninitialized);
    }

    #[test]
    fn test_lenient_engine_reports_error_code() {
        let config = WorkbookConfig::builder("Broken")
            .cell(CellDefinition::formula(addr("A1"), "=1+*2"))
            .build()
            .unwrap();

        let mut adapter = EvaluationAdapter::with_options(EngineOptions { strict: false });
        adapter.load(config).unwrap();
        assert_eq!(
            adapter.read_all().unwrap()[&addr("A1")],
            EvaluatedValue::Error(ErrorCode::Error)
        );
    }

    #[test]
    fn test_read_all_recalculates_after_inputs() {
        let mut adapter = loaded(default_workbook());
        let values = adapter.read_all().unwrap();
        assert_eq!(values.len(), 14);
        assert_eq!(values[&addr("B5")], EvaluatedValue::Number(50.0));
        assert_eq!(values[&addr("B6")], EvaluatedValue::Number(150.0));
        assert_eq!(values[&addr("A1")], EvaluatedValue::Text("Length".into()));

        let applied = adapter.apply_inputs(&patch(json!({"B1": 20}))).unwrap();
        assert_eq!(applied, 1);

        let values = adapter.read_all().unwrap();
        assert_eq!(values[&addr("B5")], EvaluatedValue::Number(100.0));
        assert_eq!(values[&addr("B7")], EvaluatedValue::Number(50.0));
    }

    #[test]
    fn test_apply_inputs_ignores_protected_and_unknown_cells() {
        let mut adapter = loaded(default_workbook());

        let applied = adapter
            .apply_inputs(&patch(json!({
                "B5": 999,
                "A1": "Renamed",
                "Z99": 1,
                "b1": 7,
                "B2": [1, 2],
                "B3": {"value": 4}
            })))
            .unwrap();
        assert_eq!(applied, 0);

        let values = adapter.read_all().unwrap();
        assert_eq!(values[&addr("B5")], EvaluatedValue::Number(50.0));
        assert_eq!(values[&addr("A1")], EvaluatedValue::Text("Length".into()));
        assert!(!values.contains_key(&addr("Z99")));
        assert_eq!(
            adapter.config().unwrap().cell(addr("B5")).unwrap().formula.as_deref(),
            Some("=B1*B2")
        );
    }

    #[test]
    fn test_apply_inputs_value_coercion() {
        let mut adapter = loaded(default_workbook());

        adapter
            .apply_inputs(&patch(json!({"B1": " 4 ", "B2": true, "B3": null})))
            .unwrap();
        let values = adapter.read_all().unwrap();
        assert_eq!(values[&addr("B1")], EvaluatedValue::Number(4.0));
        assert_eq!(values[&addr("B2")], EvaluatedValue::Boolean(true));
        assert_eq!(values[&addr("B3")], EvaluatedValue::Empty);
        assert_eq!(values[&addr("B5")], EvaluatedValue::Number(4.0));
        assert_eq!(values[&addr("B6")], EvaluatedValue::Number(0.0));

        // Text is never promoted to a formula
        adapter
            .apply_inputs(&patch(json!({"B1": "=B5*100"})))
            .unwrap();
        let values = adapter.read_all().unwrap();
        assert_eq!(values[&addr("B1")], EvaluatedValue::Text("=B5*100".into()));
        assert_eq!(values[&addr("B5")], EvaluatedValue::Error(ErrorCode::Value));
    }

    #[test]
    fn test_division_by_zero_is_flattened() {
        let config = WorkbookConfig::builder("Ratio")
            .cell(CellDefinition::input(addr("A1"), 1))
            .cell(CellDefinition::input(addr("A2"), 0))
            .cell(CellDefinition::formula(addr("A3"), "=A1/A2"))
            .build()
            .unwrap();
        let adapter = loaded(config);

        let values = adapter.read_all().unwrap();
        assert_eq!(values[&addr("A3")], EvaluatedValue::Error(ErrorCode::Div0));
        assert_eq!(
            serde_json::to_value(&values).unwrap()["A3"],
            json!("#DIV/0!")
        );
    }

    #[test]
    fn test_read_grid_is_dense() {
        let adapter = loaded(default_workbook());
        let grid = adapter.read_grid().unwrap();

        assert_eq!(grid.len(), 20);
        assert!(grid.iter().all(|row| row.len() == 10));
        assert_eq!(grid[0][0].value, EvaluatedValue::Text("Length".into()));
        assert_eq!(grid[4][1].value, EvaluatedValue::Number(50.0));
        assert_eq!(grid[3][1].value, EvaluatedValue::Empty);
        assert_eq!(grid[19][9].value, EvaluatedValue::Empty);
    }

    #[test]
    fn test_sanitize_drops_engine_detail() {
        let mut engine = CannedEngine::default();
        engine.values.insert(
            addr("A1"),
            EngineValue::Error(EngineErrorValue {
                code: "#SPILL!".into(),
                message: "internal detail".into(),
            }),
        );
        engine.values.insert(
            addr("B1"),
            EngineValue::Error(EngineErrorValue {
                code: "#REF!".into(),
                message: "internal detail".into(),
            }),
        );

        let config = WorkbookConfig::builder("Canned")
            .cell(CellDefinition::formula(addr("A1"), "=X"))
            .cell(CellDefinition::formula(addr("B1"), "=Y"))
            .cell(CellDefinition::literal(addr("C1"), 1))
            .build()
            .unwrap();

        let mut adapter = EvaluationAdapter::with_engine(engine);
        adapter.load(config).unwrap();
        let values = adapter.read_all().unwrap();

        assert_eq!(values[&addr("A1")], EvaluatedValue::Error(ErrorCode::Error));
        assert_eq!(values[&addr("B1")], EvaluatedValue::Error(ErrorCode::Ref));
        assert_eq!(values[&addr("C1")], EvaluatedValue::Empty);

        let json = serde_json::to_string(&adapter.read_grid().unwrap()).unwrap();
        assert!(!json.contains("internal detail"));
    }

    #[test]
    fn test_public_view_has_no_formulas() {
        let adapter = loaded(default_workbook());
        let json = serde_json::to_string(&adapter.public_view().unwrap()).unwrap();
        assert!(!json.contains("B1*B2"));
        assert!(!json.contains("formula"));
    }
}
