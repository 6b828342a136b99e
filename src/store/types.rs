use serde::{Deserialize, Serialize};

/// Whether a metric is reported directly or derived from other metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Input,
    Calculated,
}

/// Display semantics of a metric. Never consulted during computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericFormat {
    Currency,
    Percentage,
    Count,
    #[default]
    Plain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub id: String,
    pub kind: MetricKind,
    #[serde(default)]
    pub format: NumericFormat,
    /// Present iff `kind` is `Calculated`.
    #[serde(default)]
    pub formula: Option<String>,
    /// Only meaningful for input metrics.
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub section: Option<String>,
}

impl MetricDefinition {
    pub fn input(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Input,
            format: NumericFormat::Plain,
            formula: None,
            required: false,
            section: None,
        }
    }

    pub fn calculated(id: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Calculated,
            format: NumericFormat::Plain,
            formula: Some(formula.into()),
            required: false,
            section: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn is_calculated(&self) -> bool {
        self.kind == MetricKind::Calculated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Reconciliation,
    Range,
    Dependency,
    #[serde(alias = "equals")]
    Comparison,
}

impl RuleKind {
    /// Execution phase of the kind. Lower phases run first.
    pub fn phase(self) -> u8 {
        match self {
            RuleKind::Dependency => 0,
            RuleKind::Range => 1,
            RuleKind::Reconciliation | RuleKind::Comparison => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub kind: RuleKind,
    pub formula: String,
    /// Relative tolerance in [0, 1). Only read by reconciliation and equality checks.
    #[serde(default)]
    pub tolerance: f64,
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    /// Reporting only; never evaluated.
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl RuleDefinition {
    pub fn new(id: impl Into<String>, kind: RuleKind, formula: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind,
            formula: formula.into(),
            tolerance: 0.0,
            severity,
            message: String::new(),
            metrics: Vec::new(),
            active: true,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_definition_defaults_from_json() {
        let json = r#"{
            "id": "lead_recon",
            "kind": "reconciliation",
            "formula": "RECONCILE:a*b:c",
            "severity": "warning"
        }"#;
        let rule: RuleDefinition = serde_json::from_str(json).unwrap();
        assert!(rule.active);
        assert_eq!(rule.tolerance, 0.0);
        assert_eq!(rule.display_name(), "lead_recon");
        assert!(rule.metrics.is_empty());
    }

    #[test]
    fn test_equals_is_an_alias_for_comparison() {
        let kind: RuleKind = serde_json::from_str("\"equals\"").unwrap();
        assert_eq!(kind, RuleKind::Comparison);
    }

    #[test]
    fn test_phase_orders_dependency_first() {
        assert!(RuleKind::Dependency.phase() < RuleKind::Range.phase());
        assert!(RuleKind::Range.phase() < RuleKind::Reconciliation.phase());
        assert_eq!(RuleKind::Reconciliation.phase(), RuleKind::Comparison.phase());
    }
}
