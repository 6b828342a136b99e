//! Configuration integrity: static checks over metric and rule definitions.
//!
//! Nothing here reads data. The calculator and the runner tolerate every
//! defect found here; this pass exists so hosts can surface them up front.
use crate::compute::formula::Formula;
use crate::compute::plan::Compiler;
use crate::compute::CustomRegistry;
use crate::config::EngineConfig;
use crate::store::{MetricDefinition, MetricKind, RuleDefinition};
use crate::validation::{Check, RuleError};
use serde::Serialize;
use std::collections::HashSet;

/// The category of an integrity finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityKind {
    DuplicateMetric,
    /// The id equals the period token, so formulas read the period length instead.
    ReservedIdentifier,
    MissingFormula,
    UnexpectedFormula,
    InvalidFormula,
    UnknownReference,
    UnregisteredCustom,
    CircularDependency,
    DuplicateRule,
    InvalidRule,
    UnknownRuleMetric,
}

/// A structured report of one configuration defect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityFinding {
    /// The metric or rule identifier the finding is about.
    pub subject: String,
    pub kind: IntegrityKind,
    pub message: String,
}

impl IntegrityFinding {
    fn new(subject: &str, kind: IntegrityKind, message: String) -> Self {
        Self { subject: subject.to_string(), kind, message }
    }
}

/// Runs every check and returns all findings, metrics first, in definition order.
pub fn check(
    metrics: &[MetricDefinition],
    rules: &[RuleDefinition],
    customs: &CustomRegistry,
    config: &EngineConfig,
) -> Vec<IntegrityFinding> {
    let mut findings = Vec::new();
    let known: HashSet<&str> = metrics.iter().map(|m| m.id.as_str()).collect();

    check_metrics(metrics, &known, customs, config, &mut findings);

    let plan = Compiler::new(customs, config).compile(metrics);
    for cycle in &plan.cycles {
        let subject = cycle.first().map(String::as_str).unwrap_or_default();
        findings.push(IntegrityFinding::new(
            subject,
            IntegrityKind::CircularDependency,
            format!("circular dependency between {}", cycle.join(", ")),
        ));
    }

    check_rules(rules, &known, &mut findings);

    tracing::debug!(findings = findings.len(), "Integrity check complete.");
    findings
}

fn check_metrics(
    metrics: &[MetricDefinition],
    known: &HashSet<&str>,
    customs: &CustomRegistry,
    config: &EngineConfig,
    findings: &mut Vec<IntegrityFinding>,
) {
    let mut seen: HashSet<&str> = HashSet::new();
    for metric in metrics {
        let id = metric.id.as_str();
        if !seen.insert(id) {
            findings.push(IntegrityFinding::new(
                id,
                IntegrityKind::DuplicateMetric,
                format!("metric '{}' is defined more than once", id),
            ));
            continue;
        }
        if id == config.period_days_token {
            findings.push(IntegrityFinding::new(
                id,
                IntegrityKind::ReservedIdentifier,
                format!("metric '{}' uses the reserved period token; formulas will read the period length", id),
            ));
        }

        let formula = metric.formula.as_deref().map(str::trim).filter(|f| !f.is_empty());
        match (metric.kind, formula) {
            (MetricKind::Input, Some(_)) => findings.push(IntegrityFinding::new(
                id,
                IntegrityKind::UnexpectedFormula,
                format!("input metric '{}' has a formula; it will be ignored", id),
            )),
            (MetricKind::Input, None) => {}
            (MetricKind::Calculated, None) => findings.push(IntegrityFinding::new(
                id,
                IntegrityKind::MissingFormula,
                format!("calculated metric '{}' has no formula", id),
            )),
            (MetricKind::Calculated, Some(text)) => match Formula::parse(text, &config.period_days_token) {
                Err(err) => findings.push(IntegrityFinding::new(
                    id,
                    IntegrityKind::InvalidFormula,
                    format!("formula '{}' of '{}': {}", text, id, err),
                )),
                Ok(Formula::Custom(name)) if !customs.contains(&name) => findings.push(IntegrityFinding::new(
                    id,
                    IntegrityKind::UnregisteredCustom,
                    format!("custom function '{}' used by '{}' is not registered", name, id),
                )),
                Ok(formula) => {
                    for reference in formula.references() {
                        if !known.contains(reference) {
                            findings.push(IntegrityFinding::new(
                                id,
                                IntegrityKind::UnknownReference,
                                format!("'{}' references undefined metric '{}'", id, reference),
                            ));
                        }
                    }
                }
            },
        }
    }
}

fn check_rules(rules: &[RuleDefinition], known: &HashSet<&str>, findings: &mut Vec<IntegrityFinding>) {
    let mut seen: HashSet<&str> = HashSet::new();
    for rule in rules {
        let id = rule.id.as_str();
        if !seen.insert(id) {
            findings.push(IntegrityFinding::new(
                id,
                IntegrityKind::DuplicateRule,
                format!("rule '{}' is defined more than once", id),
            ));
        }

        let parsed = Check::parse(&rule.formula).and_then(|check| {
            if check.uses_tolerance() && !(0.0..1.0).contains(&rule.tolerance) {
                Err(RuleError::Tolerance(rule.tolerance))
            } else {
                Ok(check)
            }
        });
        let mut referenced = match parsed {
            Ok(check) => check.metrics(),
            Err(err) => {
                findings.push(IntegrityFinding::new(id, IntegrityKind::InvalidRule, format!("rule '{}': {}", id, err)));
                Vec::new()
            }
        };
        for metric in &rule.metrics {
            if !referenced.contains(metric) {
                referenced.push(metric.clone());
            }
        }
        for metric in referenced.iter().filter(|m| !known.contains(m.as_str())) {
            findings.push(IntegrityFinding::new(
                id,
                IntegrityKind::UnknownRuleMetric,
                format!("rule '{}' references undefined metric '{}'", id, metric),
            ));
        }
    }
}
