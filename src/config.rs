//! Engine settings and model definitions loaded from JSON.

use crate::store::{MetricDefinition, RuleDefinition};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("epsilon must be a finite number above zero, got {0}")]
    InvalidEpsilon(f64),
}

/// Tunables shared by the calculator and the validation runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Floor of the variance denominator, so two zeros reconcile.
    pub epsilon: f64,
    /// Hours per employee per day when a capacity formula does not supply one.
    pub default_hours_per_day: f64,
    /// Reserved identifier that resolves to the period length inside formulas.
    pub period_days_token: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-9,
            default_hours_per_day: 8.0,
            period_days_token: "period_days".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = read(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_valid_epsilon(self.epsilon) {
            Ok(())
        } else {
            Err(ConfigError::InvalidEpsilon(self.epsilon))
        }
    }
}

/// The variance denominator floor must keep `0 / max(0, 0, epsilon)` defined.
pub(crate) fn is_valid_epsilon(epsilon: f64) -> bool {
    epsilon.is_finite() && epsilon > 0.0
}

/// The full definition set of one configuration load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl ModelConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let model: Self = serde_json::from_str(json)?;
        tracing::debug!(
            metrics = model.metrics.len(),
            rules = model.rules.len(),
            "Loaded model definitions."
        );
        Ok(model)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = read(path.as_ref())?;
        Self::from_json_str(&text)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
}
