//! Data model: metric and rule definitions plus the per-run value store.
pub mod types;
pub mod values;

pub use types::{MetricDefinition, MetricKind, NumericFormat, RuleDefinition, RuleKind, Severity};
pub use values::{RawInputs, ValueStore};
