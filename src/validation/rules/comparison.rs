//! `GREATER:a:b`: strict ordering between two values.

use super::{Finding, Outcome};
use crate::store::ValueStore;
use crate::validation::expr::Expr;

pub(crate) fn greater(lhs: &Expr, rhs: &Expr, values: &ValueStore) -> Outcome {
    match (lhs.eval(values), rhs.eval(values)) {
        (Some(a), Some(b)) if a > b => Outcome::Pass,
        (Some(a), Some(b)) => Outcome::Fail(Finding { expected: Some(b), actual: Some(a), variance: None }),
        _ => Outcome::Undetermined,
    }
}
