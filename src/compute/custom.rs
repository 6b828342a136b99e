//! Host-registered routines behind the `CUSTOM:<name>` escape hatch.

use crate::config::EngineConfig;
use crate::store::ValueStore;
use std::collections::HashMap;
use std::fmt;

pub type CustomRoutine = dyn Fn(&ValueStore, u32) -> Option<f64> + Send + Sync;

pub struct CustomFunction {
    /// Metrics the routine reads. Used for ordering and for "missing" diagnostics.
    pub depends_on: Vec<String>,
    routine: Box<CustomRoutine>,
}

impl CustomFunction {
    pub fn call(&self, values: &ValueStore, period_days: u32) -> Option<f64> {
        (self.routine)(values, period_days)
    }
}

impl fmt::Debug for CustomFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFunction").field("depends_on", &self.depends_on).finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct CustomRegistry {
    functions: HashMap<String, CustomFunction>,
}

impl CustomRegistry {
    pub fn new() -> Self { Self::default() }

    /// A registry holding the built-in routines.
    ///
    /// `schedule_capacity`: `num_techs * hours_per_day * period_days`, where
    /// `hours_per_day` falls back to the configured default when not reported.
    pub fn with_builtins(config: &EngineConfig) -> Self {
        let mut registry = Self::new();
        let default_hours = config.default_hours_per_day;
        registry.register("schedule_capacity", &["num_techs", "hours_per_day"], move |values, days| {
            let techs = values.get("num_techs")?;
            if days == 0 {
                return None;
            }
            let hours = values.get("hours_per_day").unwrap_or(default_hours);
            Some(techs * hours * f64::from(days))
        });
        registry
    }

    /// Registers (or replaces) a routine under `name`.
    pub fn register<F>(&mut self, name: &str, depends_on: &[&str], routine: F)
    where
        F: Fn(&ValueStore, u32) -> Option<f64> + Send + Sync + 'static,
    {
        let function = CustomFunction {
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            routine: Box::new(routine),
        };
        if self.functions.insert(name.to_string(), function).is_some() {
            tracing::debug!(routine = %name, "Replaced custom function.");
        }
    }

    pub fn get(&self, name: &str) -> Option<&CustomFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn dependencies(&self, name: &str) -> &[String] {
        self.functions.get(name).map(|f| f.depends_on.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_capacity_defaults_hours() {
        let registry = CustomRegistry::with_builtins(&EngineConfig::default());
        let f = registry.get("schedule_capacity").unwrap();
        let values: ValueStore = [("num_techs", 3.0)].into_iter().collect();
        assert_eq!(f.call(&values, 30), Some(3.0 * 8.0 * 30.0));

        let values: ValueStore = [("num_techs", 3.0), ("hours_per_day", 10.0)].into_iter().collect();
        assert_eq!(f.call(&values, 30), Some(900.0));
    }

    #[test]
    fn test_schedule_capacity_needs_techs() {
        let registry = CustomRegistry::with_builtins(&EngineConfig::default());
        let f = registry.get("schedule_capacity").unwrap();
        assert_eq!(f.call(&ValueStore::new(), 30), None);
        assert_eq!(registry.dependencies("schedule_capacity")[0], "num_techs");
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = CustomRegistry::new();
        registry.register("double_leads", &["total_leads"], |v, _| v.get("total_leads").map(|x| x * 2.0));
        assert!(registry.contains("double_leads"));
        assert!(registry.dependencies("unknown").is_empty());
        let values: ValueStore = [("total_leads", 21.0)].into_iter().collect();
        assert_eq!(registry.get("double_leads").unwrap().call(&values, 1), Some(42.0));
    }
}
