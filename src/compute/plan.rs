//! plan.rs
//! Compiles metric definitions into an ordered evaluation plan.
//!
//! Parsing and ordering happen once per definition set; the plan is then
//! replayed for every run.

use super::custom::CustomRegistry;
use super::error::{Diagnostic, FormulaError};
use super::formula::Formula;
use crate::analysis::topology::{self, DependencyNode};
use crate::config::EngineConfig;
use crate::store::MetricDefinition;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Evaluate(Formula),
    /// Known to be undetermined before any data is seen.
    Fail(Diagnostic),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub metric: String,
    pub action: Action,
    /// Every identifier the metric reads, including custom routine reads.
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    /// Resolver order first, then the unresolvable metrics.
    pub steps: Vec<Step>,
    /// Number of leading steps that are in dependency order.
    pub resolved: usize,
    /// Identifiers of each detected cycle.
    pub cycles: Vec<Vec<String>>,
    pub inputs: Vec<String>,
    pub required_inputs: Vec<String>,
    calculated: HashSet<String>,
    index: HashMap<String, usize>,
}

impl Plan {
    pub fn step(&self, metric: &str) -> Option<&Step> {
        self.index.get(metric).map(|&i| &self.steps[i])
    }

    pub fn is_calculated(&self, metric: &str) -> bool {
        self.calculated.contains(metric)
    }

    /// Metric identifiers in evaluation order.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        self.steps[..self.resolved].iter().map(|s| s.metric.as_str())
    }
}

pub struct Compiler<'a> {
    customs: &'a CustomRegistry,
    config: &'a EngineConfig,
}

impl<'a> Compiler<'a> {
    pub fn new(customs: &'a CustomRegistry, config: &'a EngineConfig) -> Self {
        Self { customs, config }
    }

    pub fn compile(&self, metrics: &[MetricDefinition]) -> Plan {
        let mut plan = Plan::default();
        let mut seen = HashSet::new();
        let mut pending: Vec<(String, Result<Formula, FormulaError>, Vec<String>)> = Vec::new();

        for metric in metrics {
            if !seen.insert(metric.id.as_str()) {
                tracing::warn!(metric = %metric.id, "Duplicate metric definition ignored.");
                continue;
            }
            if !metric.is_calculated() {
                plan.inputs.push(metric.id.clone());
                if metric.required {
                    plan.required_inputs.push(metric.id.clone());
                }
                continue;
            }

            let parsed = self.parse(metric);
            let depends_on = match &parsed {
                Ok(Formula::Custom(name)) => self.customs.dependencies(name).to_vec(),
                Ok(formula) => formula.references().iter().map(|s| s.to_string()).collect(),
                Err(_) => Vec::new(),
            };
            if let Err(err) = &parsed {
                tracing::warn!(metric = %metric.id, error = %err, "Formula rejected.");
            }
            plan.calculated.insert(metric.id.clone());
            pending.push((metric.id.clone(), parsed, depends_on));
        }

        let nodes: Vec<DependencyNode<'_>> = pending
            .iter()
            .map(|(id, _, deps)| DependencyNode { id, depends_on: deps.iter().map(String::as_str).collect() })
            .collect();
        let resolution = topology::resolve(&nodes);

        plan.cycles = resolution
            .cycles
            .iter()
            .map(|members| members.iter().map(|&i| pending[i].0.clone()).collect())
            .collect();
        for cycle in &plan.cycles {
            tracing::warn!(metrics = ?cycle, "Circular dependency between calculated metrics.");
        }

        let mut slots: Vec<Option<(String, Result<Formula, FormulaError>, Vec<String>)>> =
            pending.into_iter().map(Some).collect();
        let unresolved: HashSet<usize> = resolution.unresolved.iter().copied().collect();

        for pos in resolution.order.iter().chain(resolution.unresolved.iter()) {
            let Some((metric, parsed, depends_on)) = slots[*pos].take() else { continue };
            let action = if unresolved.contains(pos) {
                Action::Fail(Diagnostic::CircularDependency)
            } else {
                match parsed {
                    Ok(formula) => Action::Evaluate(formula),
                    Err(err) => Action::Fail(Diagnostic::Configuration(err)),
                }
            };
            plan.index.insert(metric.clone(), plan.steps.len());
            plan.steps.push(Step { metric, action, depends_on });
        }
        plan.resolved = resolution.order.len();
        plan
    }

    fn parse(&self, metric: &MetricDefinition) -> Result<Formula, FormulaError> {
        let text = metric.formula.as_deref().ok_or(FormulaError::MissingFormula)?;
        let formula = Formula::parse(text, &self.config.period_days_token)?;
        if let Formula::Custom(name) = &formula {
            if !self.customs.contains(name) {
                return Err(FormulaError::UnregisteredCustom(name.clone()));
            }
        }
        Ok(formula)
    }
}
