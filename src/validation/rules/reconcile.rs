//! Tolerance-aware equality, shared by `RECONCILE` and `EQUALS`.

use super::{Finding, Outcome};
use crate::store::ValueStore;
use crate::validation::expr::Expr;

/// Relative variance: `|actual - expected| / max(|actual|, |expected|, epsilon)`.
pub fn variance(actual: f64, expected: f64, epsilon: f64) -> f64 {
    let scale = actual.abs().max(expected.abs()).max(epsilon);
    (actual - expected).abs() / scale
}

/// Passes when the variance does not exceed `tolerance`. The boundary passes.
pub(crate) fn within_tolerance(actual: f64, expected: f64, tolerance: f64, epsilon: f64) -> Outcome {
    let variance = variance(actual, expected, epsilon);
    if variance <= tolerance {
        Outcome::Pass
    } else {
        Outcome::Fail(Finding { expected: Some(expected), actual: Some(actual), variance: Some(variance) })
    }
}

/// `RECONCILE:computed:target`. The target is the expected side.
pub(crate) fn reconcile(computed: &Expr, target: &Expr, values: &ValueStore, tolerance: f64, epsilon: f64) -> Outcome {
    match (computed.eval(values), target.eval(values)) {
        (Some(actual), Some(expected)) => within_tolerance(actual, expected, tolerance, epsilon),
        _ => Outcome::Undetermined,
    }
}

/// `EQUALS:a:b`. `b` is the expected side.
pub(crate) fn equals(lhs: &Expr, rhs: &Expr, values: &ValueStore, tolerance: f64, epsilon: f64) -> Outcome {
    reconcile(lhs, rhs, values, tolerance, epsilon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const EPS: f64 = 1e-9;

    fn expr(text: &str) -> Expr {
        Expr::parse(text).unwrap()
    }

    #[rstest]
    #[case(100.0, 90.0, 0.10, true)] // variance exactly 0.10
    #[case(100.0, 89.999, 0.10, false)] // just above
    #[case(90.0, 100.0, 0.10, true)] // symmetric
    #[case(0.0, 0.0, 0.0, true)]
    #[case(-50.0, -50.0, 0.0, true)]
    #[case(1.0, 0.0, 0.99, false)]
    fn test_tolerance_boundary(#[case] actual: f64, #[case] expected: f64, #[case] tol: f64, #[case] pass: bool) {
        let outcome = within_tolerance(actual, expected, tol, EPS);
        assert_eq!(outcome == Outcome::Pass, pass, "{:?}", outcome);
    }

    #[test]
    fn test_reconcile_passes_on_consistent_booking_rate() {
        let values: ValueStore =
            [("total_leads", 100.0), ("in_home_visits", 40.0), ("reported_booking_rate", 40.0)].into_iter().collect();
        let outcome = reconcile(&expr("total_leads*reported_booking_rate/100"), &expr("in_home_visits"), &values, 0.10, EPS);
        assert_eq!(outcome, Outcome::Pass);
    }

    #[test]
    fn test_reconcile_fails_on_inflated_booking_rate() {
        let values: ValueStore =
            [("total_leads", 100.0), ("in_home_visits", 40.0), ("reported_booking_rate", 70.0)].into_iter().collect();
        let outcome = reconcile(&expr("total_leads*reported_booking_rate/100"), &expr("in_home_visits"), &values, 0.10, EPS);
        match outcome {
            Outcome::Fail(f) => {
                assert_eq!(f.expected, Some(40.0));
                assert_eq!(f.actual, Some(70.0));
                let v = f.variance.unwrap();
                assert!((v - 30.0 / 70.0).abs() < 1e-12);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_absent_side_is_undetermined() {
        let values: ValueStore = [("in_home_visits", 40.0)].into_iter().collect();
        let outcome = reconcile(&expr("total_leads*2"), &expr("in_home_visits"), &values, 0.1, EPS);
        assert_eq!(outcome, Outcome::Undetermined);
        let outcome = equals(&expr("in_home_visits"), &expr("unknown_metric"), &values, 0.1, EPS);
        assert_eq!(outcome, Outcome::Undetermined);
    }

    #[test]
    fn test_equals_uses_rhs_as_expected() {
        let values: ValueStore = [("a", 10.0), ("b", 12.0)].into_iter().collect();
        match equals(&expr("a"), &expr("b"), &values, 0.0, EPS) {
            Outcome::Fail(f) => {
                assert_eq!(f.expected, Some(12.0));
                assert_eq!(f.actual, Some(10.0));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
