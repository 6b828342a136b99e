//! Defines the error types for the validation module.
use thiserror::Error;

/// A defect in a rule definition. The runner turns it into a synthetic
/// error-severity issue on the one affected rule.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("rule formula is empty")]
    Empty,
    #[error("unknown rule operation '{0}'")]
    UnknownOperation(String),
    #[error("{op} expects {expected} argument(s), got {actual}")]
    Arity { op: &'static str, expected: usize, actual: usize },
    #[error("invalid expression '{expr}': {reason}")]
    Expression { expr: String, reason: String },
    #[error("'{0}' is not a metric identifier")]
    NotAnIdentifier(String),
    #[error("tolerance {0} is outside [0, 1)")]
    Tolerance(f64),
}
