//! KPI computation and consistency engine.
//!
//! Raw inputs flow through the [`compute::Calculator`], which resolves every
//! calculated metric in dependency order into a [`store::ValueStore`]. The
//! [`validation::Validator`] then checks the resolved set against the rule
//! definitions and reports severity-classified issues. Neither step performs
//! I/O or fails on missing data.

pub mod analysis;
pub mod compute;
pub mod config;
pub mod display;
pub mod logging;
pub mod store;
pub mod validation;

#[cfg(feature = "python")]
pub mod bindings;

pub use compute::{calculate, CalculationResult, Calculator, CustomRegistry, Diagnostic};
pub use config::{ConfigError, EngineConfig, ModelConfig};
pub use store::{MetricDefinition, MetricKind, RawInputs, RuleDefinition, RuleKind, Severity, ValueStore};
pub use validation::{run_validation, validate_all, Issue, ValidationReport, ValidationStatus, Validator};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// The `_core` Python extension module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<bindings::python::PyKpiModel>()?;
    m.add_function(wrap_pyfunction!(bindings::python::init_logging, m)?)?;
    Ok(())
}
