//! `REQUIRES:dependent:parent`: if the downstream figure is reported, the
//! upstream figure must be too. Existence only; magnitudes are never compared.

use super::{Finding, Outcome};
use crate::store::ValueStore;

pub(crate) fn requires(dependent: &str, parent: &str, values: &ValueStore) -> Outcome {
    match (values.get(dependent), values.get(parent)) {
        (None, _) | (Some(_), Some(_)) => Outcome::Pass,
        (Some(actual), None) => Outcome::Fail(Finding { expected: None, actual: Some(actual), variance: None }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(500.0), Some(10.0), true)] // dependent far above parent still passes
    #[case(Some(5.0), Some(10.0), true)]
    #[case(None, Some(10.0), true)]
    #[case(None, None, true)]
    #[case(Some(0.0), None, false)]
    #[case(Some(500.0), None, false)]
    fn test_existence_only(#[case] dependent: Option<f64>, #[case] parent: Option<f64>, #[case] pass: bool) {
        let values: ValueStore =
            [("jobs_closed".to_string(), dependent), ("in_home_visits".to_string(), parent)].into_iter().collect();
        let outcome = requires("jobs_closed", "in_home_visits", &values);
        assert_eq!(outcome == Outcome::Pass, pass, "{:?}", outcome);
    }
}
