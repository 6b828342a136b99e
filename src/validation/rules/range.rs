//! `RANGE:kpi:min:max` with inclusive bounds.

use super::{Finding, Outcome};
use crate::store::ValueStore;
use crate::validation::expr::Expr;

pub(crate) fn range(kpi: &str, min: Option<&Expr>, max: Option<&Expr>, values: &ValueStore) -> Outcome {
    let Some(value) = values.get(kpi) else {
        return Outcome::Undetermined;
    };
    // A bound that references an absent metric makes the rule inapplicable.
    let bound = |b: Option<&Expr>| -> Result<Option<f64>, ()> {
        match b {
            None => Ok(None),
            Some(expr) => expr.eval(values).map(Some).ok_or(()),
        }
    };
    let (Ok(lo), Ok(hi)) = (bound(min), bound(max)) else {
        return Outcome::Undetermined;
    };

    let violated = match (lo, hi) {
        (Some(lo), _) if value < lo => Some(lo),
        (_, Some(hi)) if value > hi => Some(hi),
        _ => None,
    };
    match violated {
        None => Outcome::Pass,
        Some(bound) => Outcome::Fail(Finding { expected: Some(bound), actual: Some(value), variance: None }),
    }
}
