//! Output of a validation run.

use crate::store::Severity;
use serde::Serialize;

/// One failed (or unevaluable) rule. Built by the runner and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub message: String,
    pub expected: Option<f64>,
    pub actual: Option<f64>,
    /// Relative variance as a fraction, for tolerance-based checks only.
    pub variance: Option<f64>,
    pub metrics: Vec<String>,
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Warnings,
    Errors,
}

impl ValidationStatus {
    /// `Errors` if any issue is an error, else `Warnings` if any is a warning.
    /// Info issues never move the status.
    pub fn from_issues(issues: &[Issue]) -> Self {
        let worst = issues.iter().map(|i| i.severity).max();
        match worst {
            Some(Severity::Error) => ValidationStatus::Errors,
            Some(Severity::Warning) => ValidationStatus::Warnings,
            Some(Severity::Info) | None => ValidationStatus::Valid,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::Warnings => "warnings",
            ValidationStatus::Errors => "errors",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { status: ValidationStatus::from_issues(&issues), issues }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}
