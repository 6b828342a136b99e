//! One evaluator per check family. Each returns an `Outcome`; none raise.
pub mod comparison;
pub mod dependency;
pub mod range;
pub mod reconcile;

/// Values reported on a failed check.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Finding {
    pub expected: Option<f64>,
    pub actual: Option<f64>,
    pub variance: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Pass,
    /// Required data is absent, so the rule does not apply.
    Undetermined,
    Fail(Finding),
}
