//! error.rs
//! Configuration defects in formulas, and the "why absent" diagnostics of a run.

use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// A defect in a metric's formula. Reported on the one affected metric; never
/// aborts a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("calculated metric has no formula")]
    MissingFormula,
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
    #[error("{op} expects {expected} argument(s), got {actual}")]
    Arity { op: &'static str, expected: &'static str, actual: usize },
    #[error("malformed argument '{0}'")]
    MalformedOperand(String),
    #[error("unregistered custom function '{0}'")]
    UnregisteredCustom(String),
}

/// Why a calculated metric ended up absent.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// An operand was absent. After propagation this names the root input.
    Missing { metric: String },
    DivisionByZero { divisor: String },
    InvalidPeriod { days: u32 },
    NonFinite,
    CircularDependency,
    /// A custom routine ran but produced no value.
    CustomUndetermined { routine: String },
    Configuration(FormulaError),
}

impl Diagnostic {
    pub fn missing(metric: impl Into<String>) -> Self {
        Diagnostic::Missing { metric: metric.into() }
    }

    /// Configuration defects are reported distinctly from ordinary missing data.
    pub fn is_configuration_defect(&self) -> bool {
        matches!(self, Diagnostic::Configuration(_))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Missing { metric } => write!(f, "missing {}", metric),
            Diagnostic::DivisionByZero { divisor } => write!(f, "division by zero ({} is 0)", divisor),
            Diagnostic::InvalidPeriod { days } => write!(f, "invalid period length ({} days)", days),
            Diagnostic::NonFinite => write!(f, "result is not a finite number"),
            Diagnostic::CircularDependency => write!(f, "circular dependency"),
            Diagnostic::CustomUndetermined { routine } => write!(f, "custom function '{}' produced no value", routine),
            Diagnostic::Configuration(err) => write!(f, "configuration error: {}", err),
        }
    }
}

impl Serialize for Diagnostic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
