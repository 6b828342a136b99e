use crate::analysis::integrity;
use crate::compute::Calculator;
use crate::config::{EngineConfig, ModelConfig};
use crate::display::trace;
use crate::store::{MetricDefinition, RawInputs, RuleDefinition, ValueStore};
use crate::validation::Validator;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;

/// A compiled set of metric and rule definitions.
#[pyclass(name = "KpiModel")]
pub struct PyKpiModel {
    calculator: Calculator,
    metrics: Vec<MetricDefinition>,
    rules: Vec<RuleDefinition>,
}

#[pymethods]
impl PyKpiModel {
    /// `definitions` is a JSON object with `metrics` and `rules` arrays;
    /// `engine` optionally overrides the engine settings.
    #[new]
    #[pyo3(signature = (definitions, engine = None))]
    pub fn new(definitions: &str, engine: Option<&str>) -> PyResult<Self> {
        let model = ModelConfig::from_json_str(definitions).map_err(|e| PyValueError::new_err(e.to_string()))?;
        let config = match engine {
            Some(json) => EngineConfig::from_json_str(json).map_err(|e| PyValueError::new_err(e.to_string()))?,
            None => EngineConfig::default(),
        };
        let customs = crate::compute::CustomRegistry::with_builtins(&config);
        let calculator = Calculator::with_registry(&model.metrics, customs, config);
        Ok(Self { calculator, metrics: model.metrics, rules: model.rules })
    }

    /// Returns `(values, diagnostics)`; absent values are `None`.
    pub fn calculate(
        &self,
        inputs: RawInputs,
        period_days: u32,
    ) -> (HashMap<String, Option<f64>>, HashMap<String, String>) {
        let result = self.calculator.calculate(&inputs, period_days);
        let values = result.values.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let diagnostics = result.diagnostics.iter().map(|(k, d)| (k.clone(), d.to_string())).collect();
        (values, diagnostics)
    }

    /// Returns `(status, issues_json)` for an already resolved value set.
    pub fn validate(&self, values: RawInputs) -> PyResult<(String, String)> {
        let store = ValueStore::from_inputs(&values);
        let report = Validator::new(&self.rules)
            .with_metric_sections(&self.metrics)
            .with_epsilon(self.calculator.config().epsilon)
            .validate_all(&store);
        let issues = serde_json::to_string(&report.issues).map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        Ok((report.status.as_str().to_string(), issues))
    }

    /// Configuration defects as `(subject, message)` pairs.
    pub fn integrity(&self) -> Vec<(String, String)> {
        integrity::check(&self.metrics, &self.rules, self.calculator.customs(), self.calculator.config())
            .into_iter()
            .map(|f| (f.subject, f.message))
            .collect()
    }

    pub fn trace(&self, metric: &str, inputs: RawInputs, period_days: u32) -> String {
        let result = self.calculator.calculate(&inputs, period_days);
        trace::format_trace(self.calculator.plan(), &result, metric)
    }

    pub fn evaluation_order(&self) -> Vec<String> {
        self.calculator.plan().order().map(str::to_string).collect()
    }
}

/// Installs a log subscriber; `RUST_LOG` overrides `default_filter`.
#[pyfunction]
#[pyo3(signature = (default_filter = "warn"))]
pub fn init_logging(default_filter: &str) -> bool {
    crate::logging::init(default_filter)
}
