//! The KPI calculator: resolves every calculated metric of one period.
//!
//! A synchronous, single-threaded computation over an immutable plan. Missing
//! data never raises; each absent metric gets a diagnostic instead.

use super::custom::CustomRegistry;
use super::error::Diagnostic;
use super::evaluator::{evaluate, EvalContext, Evaluation};
use super::plan::{Action, Compiler, Plan};
use crate::config::EngineConfig;
use crate::store::{MetricDefinition, RawInputs, ValueStore};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Output of one calculation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationResult {
    pub values: ValueStore,
    /// Why each absent calculated metric is absent.
    pub diagnostics: BTreeMap<String, Diagnostic>,
    /// Calculated metrics in the order they were evaluated.
    pub order: Vec<String>,
    /// Required input metrics that were not reported.
    pub missing_required: Vec<String>,
}

impl CalculationResult {
    /// Metrics whose absence is due to a configuration defect rather than missing data.
    pub fn configuration_defects(&self) -> impl Iterator<Item = (&str, &Diagnostic)> {
        self.diagnostics
            .iter()
            .filter(|(_, d)| d.is_configuration_defect())
            .map(|(id, d)| (id.as_str(), d))
    }
}

pub struct Calculator {
    plan: Plan,
    customs: CustomRegistry,
    config: EngineConfig,
}

impl Calculator {
    /// A calculator with the default engine settings and the built-in custom routines.
    pub fn new(metrics: &[MetricDefinition]) -> Self {
        let config = EngineConfig::default();
        let customs = CustomRegistry::with_builtins(&config);
        Self::with_registry(metrics, customs, config)
    }

    pub fn with_registry(metrics: &[MetricDefinition], customs: CustomRegistry, config: EngineConfig) -> Self {
        let plan = Compiler::new(&customs, &config).compile(metrics);
        Self { plan, customs, config }
    }

    pub fn plan(&self) -> &Plan { &self.plan }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn customs(&self) -> &CustomRegistry { &self.customs }

    /// Resolves every calculated metric for one period.
    pub fn calculate(&self, inputs: &RawInputs, period_days: u32) -> CalculationResult {
        let _span = tracing::debug_span!("calculate", period_days, steps = self.plan.steps.len()).entered();

        let mut values = ValueStore::from_inputs(inputs);
        for step in &self.plan.steps {
            if let Some(Some(raw)) = values.discard(&step.metric) {
                tracing::warn!(metric = %step.metric, raw, "Raw value supplied for a calculated metric ignored.");
            }
        }
        for id in &self.plan.inputs {
            values.seed(id, None);
        }

        let missing_required: Vec<String> = self
            .plan
            .required_inputs
            .iter()
            .filter(|id| !values.is_present(id))
            .cloned()
            .collect();

        let mut diagnostics = BTreeMap::new();
        for step in &self.plan.steps {
            let outcome = match &step.action {
                Action::Evaluate(formula) => {
                    let ctx = EvalContext {
                        values: &values,
                        period_days,
                        customs: &self.customs,
                        config: &self.config,
                    };
                    match evaluate(formula, &ctx) {
                        Ok(Evaluation::Value(v)) => Ok(v),
                        Ok(Evaluation::Undetermined(d)) => Err(root_cause(d, &diagnostics)),
                        Err(err) => Err(Diagnostic::Configuration(err)),
                    }
                }
                Action::Fail(d) => Err(d.clone()),
            };

            match outcome {
                Ok(v) => {
                    tracing::debug!(metric = %step.metric, value = v, "Metric calculated.");
                    values.write_once(&step.metric, Some(v));
                }
                Err(d) => {
                    if d.is_configuration_defect() {
                        tracing::warn!(metric = %step.metric, reason = %d, "Metric not calculated.");
                    } else {
                        tracing::debug!(metric = %step.metric, reason = %d, "Metric undetermined.");
                    }
                    values.write_once(&step.metric, None);
                    diagnostics.insert(step.metric.clone(), d);
                }
            }
        }

        tracing::info!(
            calculated = self.plan.steps.len() - diagnostics.len(),
            undetermined = diagnostics.len(),
            missing_required = missing_required.len(),
            "Calculation run complete."
        );

        CalculationResult {
            values,
            diagnostics,
            order: self.plan.order().map(str::to_string).collect(),
            missing_required,
        }
    }

    /// Runs independent periods in parallel. Equivalent to calling
    /// `calculate` on each `(inputs, period_days)` pair in turn.
    pub fn calculate_batch(&self, runs: &[(RawInputs, u32)]) -> Vec<CalculationResult> {
        runs.par_iter().map(|(inputs, days)| self.calculate(inputs, *days)).collect()
    }
}

/// An absent operand that is itself a calculated metric missing an input
/// reports that input, so a whole chain names the original gap.
fn root_cause(diagnostic: Diagnostic, known: &BTreeMap<String, Diagnostic>) -> Diagnostic {
    if let Diagnostic::Missing { metric } = &diagnostic {
        if let Some(upstream @ Diagnostic::Missing { .. }) = known.get(metric) {
            return upstream.clone();
        }
    }
    diagnostic
}

/// Resolves all calculated metrics with default settings and built-in routines.
pub fn calculate(inputs: &RawInputs, metrics: &[MetricDefinition], period_days: u32) -> CalculationResult {
    Calculator::new(metrics).calculate(inputs, period_days)
}
