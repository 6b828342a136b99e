//! Runs every active rule against a resolved value set and aggregates issues.
use super::error::RuleError;
use super::issue::{Issue, ValidationReport};
use super::message;
use super::rule::Check;
use super::rules::{comparison, dependency, range, reconcile, Finding, Outcome};
use crate::config::{self, EngineConfig};
use crate::store::{MetricDefinition, RuleDefinition, Severity, ValueStore};
use std::collections::HashMap;

/// The validation runner.
///
/// Rules run in phase order: dependency, then range, then reconciliation and
/// comparison. Inside a phase, definition order is kept. Every rule is
/// evaluated; one bad rule produces its own issue and the run continues.
pub struct Validator<'a> {
    rules: &'a [RuleDefinition],
    sections: HashMap<String, String>,
    epsilon: f64,
}

impl<'a> Validator<'a> {
    pub fn new(rules: &'a [RuleDefinition]) -> Self {
        Self { rules, sections: HashMap::new(), epsilon: EngineConfig::default().epsilon }
    }

    /// Supplies the metric -> section mapping used to fill `Issue::sections`.
    pub fn with_sections(mut self, sections: HashMap<String, String>) -> Self {
        self.sections = sections;
        self
    }

    pub fn with_metric_sections(self, metrics: &[MetricDefinition]) -> Self {
        let sections = metrics
            .iter()
            .filter_map(|m| m.section.as_ref().map(|s| (m.id.clone(), s.clone())))
            .collect();
        self.with_sections(sections)
    }

    /// Overrides the variance floor. A non-finite or non-positive value keeps the default.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        if config::is_valid_epsilon(epsilon) {
            self.epsilon = epsilon;
        } else {
            tracing::warn!(epsilon, "Invalid epsilon ignored; using the default.");
            self.epsilon = EngineConfig::default().epsilon;
        }
        self
    }

    pub fn validate_all(&self, values: &ValueStore) -> ValidationReport {
        let _span = tracing::debug_span!("validate", rules = self.rules.len()).entered();

        let mut active: Vec<&RuleDefinition> = self.rules.iter().filter(|r| r.active).collect();
        // Stable, so definition order survives inside a phase.
        active.sort_by_key(|r| r.kind.phase());

        let issues: Vec<Issue> = active.into_iter().filter_map(|rule| self.run(rule, values)).collect();
        let report = ValidationReport::new(issues);
        tracing::info!(
            status = %report.status,
            errors = report.count(Severity::Error),
            warnings = report.count(Severity::Warning),
            info = report.count(Severity::Info),
            "Validation complete."
        );
        report
    }

    /// Evaluates one rule. `None` when it passes or does not apply.
    pub fn run(&self, rule: &RuleDefinition, values: &ValueStore) -> Option<Issue> {
        let check = match self.prepare(rule) {
            Ok(check) => check,
            Err(err) => {
                tracing::warn!(rule = %rule.id, error = %err, "Rule could not be evaluated.");
                return Some(self.unevaluable(rule, &err));
            }
        };

        let outcome = match &check {
            Check::Reconcile { computed, target } => {
                reconcile::reconcile(computed, target, values, rule.tolerance, self.epsilon)
            }
            Check::Equals { lhs, rhs } => reconcile::equals(lhs, rhs, values, rule.tolerance, self.epsilon),
            Check::Range { kpi, min, max } => range::range(kpi, min.as_ref(), max.as_ref(), values),
            Check::Greater { lhs, rhs } => comparison::greater(lhs, rhs, values),
            Check::Requires { dependent, parent } => dependency::requires(dependent, parent, values),
        };

        match outcome {
            Outcome::Pass => None,
            Outcome::Undetermined => {
                tracing::debug!(rule = %rule.id, "Rule not applicable: data absent.");
                None
            }
            Outcome::Fail(finding) => {
                tracing::debug!(rule = %rule.id, expected = ?finding.expected, actual = ?finding.actual, "Rule failed.");
                let metrics = if rule.metrics.is_empty() { check.metrics() } else { rule.metrics.clone() };
                Some(self.issue(rule, rule.severity, message::render(rule, &finding, values), finding, metrics))
            }
        }
    }

    fn prepare(&self, rule: &RuleDefinition) -> Result<Check, RuleError> {
        let check = Check::parse(&rule.formula)?;
        if check.uses_tolerance() && !(0.0..1.0).contains(&rule.tolerance) {
            return Err(RuleError::Tolerance(rule.tolerance));
        }
        let natural = check.natural_kind();
        if natural.phase() != rule.kind.phase() {
            tracing::warn!(
                rule = %rule.id,
                declared = ?rule.kind,
                natural = ?natural,
                "Rule kind does not match its formula; running in the declared phase."
            );
        }
        Ok(check)
    }

    fn unevaluable(&self, rule: &RuleDefinition, err: &RuleError) -> Issue {
        let message = format!("could not evaluate rule '{}': {}", rule.display_name(), err);
        self.issue(rule, Severity::Error, message, Finding::default(), rule.metrics.clone())
    }

    fn issue(
        &self,
        rule: &RuleDefinition,
        severity: Severity,
        message: String,
        finding: Finding,
        metrics: Vec<String>,
    ) -> Issue {
        let mut sections: Vec<String> = Vec::new();
        for section in metrics.iter().filter_map(|m| self.sections.get(m)) {
            if !sections.contains(section) {
                sections.push(section.clone());
            }
        }
        Issue {
            rule_id: rule.id.clone(),
            rule_name: rule.display_name().to_string(),
            severity,
            message,
            expected: finding.expected,
            actual: finding.actual,
            variance: finding.variance,
            metrics,
            sections,
        }
    }
}

/// Runs all active rules with default settings.
pub fn validate_all(values: &ValueStore, rules: &[RuleDefinition]) -> ValidationReport {
    Validator::new(rules).validate_all(values)
}

/// Runs a single rule with default settings, regardless of its `active` flag.
pub fn run_validation(rule: &RuleDefinition, values: &ValueStore) -> Option<Issue> {
    Validator::new(std::slice::from_ref(rule)).run(rule, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::calculate;
    use crate::store::{RawInputs, RuleKind};
    use crate::validation::issue::ValidationStatus;
    use rstest::rstest;

    fn booking_rule() -> RuleDefinition {
        RuleDefinition::new(
            "booking_rate_reconcile",
            RuleKind::Reconciliation,
            "RECONCILE:total_leads*reported_booking_rate/100:in_home_visits",
            Severity::Warning,
        )
        .with_tolerance(0.10)
        .with_message("Booking rate implies {actual} visits, {expected} reported")
    }

    fn booking_values(rate: f64) -> ValueStore {
        [("total_leads", 100.0), ("in_home_visits", 40.0), ("reported_booking_rate", rate)].into_iter().collect()
    }

    #[test]
    fn test_consistent_booking_rate_passes() {
        assert_eq!(run_validation(&booking_rule(), &booking_values(40.0)), None);
    }

    #[test]
    fn test_inflated_booking_rate_fails() {
        let issue = run_validation(&booking_rule(), &booking_values(70.0)).unwrap();
        assert_eq!(issue.expected, Some(40.0));
        assert_eq!(issue.actual, Some(70.0));
        assert!(issue.variance.unwrap() > 0.10);
        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(issue.message, "Booking rate implies 70 visits, 40 reported");
        assert_eq!(issue.metrics, vec!["total_leads", "reported_booking_rate", "in_home_visits"]);
    }

    #[rstest]
    #[case(90.0, true)]
    #[case(89.99, false)]
    fn test_tolerance_boundary(#[case] target: f64, #[case] pass: bool) {
        let rule = RuleDefinition::new("r", RuleKind::Comparison, "EQUALS:a:b", Severity::Error).with_tolerance(0.10);
        let values: ValueStore = [("a", 100.0), ("b", target)].into_iter().collect();
        assert_eq!(run_validation(&rule, &values).is_none(), pass);
    }

    #[test]
    fn test_requires_ignores_magnitude() {
        let rule =
            RuleDefinition::new("r", RuleKind::Dependency, "REQUIRES:jobs_closed:in_home_visits", Severity::Error);
        let values: ValueStore = [("jobs_closed", 500.0), ("in_home_visits", 10.0)].into_iter().collect();
        assert_eq!(run_validation(&rule, &values), None);

        let values: ValueStore = [("jobs_closed", 5.0)].into_iter().collect();
        let issue = run_validation(&rule, &values).unwrap();
        assert_eq!(issue.expected, None);
        assert_eq!(issue.actual, Some(5.0));
    }

    #[test]
    fn test_absent_side_raises_nothing() {
        let rule =
            RuleDefinition::new("r", RuleKind::Comparison, "GREATER:gross_revenue:total_costs", Severity::Error);
        let values: ValueStore = [("total_costs", 500.0)].into_iter().collect();
        assert_eq!(run_validation(&rule, &values), None);
    }

    #[test]
    fn test_malformed_rule_does_not_abort_run() {
        let rules = vec![
            RuleDefinition::new("bad", RuleKind::Range, "RANGE:close_rate", Severity::Info),
            RuleDefinition::new("range", RuleKind::Range, "RANGE:close_rate:0:100", Severity::Warning),
        ];
        let values: ValueStore = [("close_rate", 120.0)].into_iter().collect();
        let report = validate_all(&values, &rules);
        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.issues[0].rule_id, "bad");
        assert_eq!(report.issues[0].severity, Severity::Error);
        assert!(report.issues[0].message.starts_with("could not evaluate"));
        assert_eq!(report.issues[1].expected, Some(100.0));
        assert_eq!(report.status, ValidationStatus::Errors);
    }

    #[rstest]
    #[case(20_000)]
    #[case(100)]
    fn test_deeply_nested_rule_does_not_abort_run(#[case] depth: usize) {
        let nested = format!("RECONCILE:{}a{}:b", "(".repeat(depth), ")".repeat(depth));
        let rules = vec![
            RuleDefinition::new("nested", RuleKind::Reconciliation, nested, Severity::Warning),
            RuleDefinition::new("equals", RuleKind::Comparison, "EQUALS:a:b", Severity::Warning),
        ];
        let values: ValueStore = [("a", 1.0), ("b", 2.0)].into_iter().collect();
        let report = validate_all(&values, &rules);
        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.issues[0].severity, Severity::Error);
        assert!(report.issues[0].message.starts_with("could not evaluate"));
        assert_eq!(report.issues[1].rule_id, "equals");
    }

    #[test]
    fn test_exponent_literal_in_range_bound() {
        let rule = RuleDefinition::new("r", RuleKind::Range, "RANGE:revenue:0:1e6", Severity::Error);
        let values: ValueStore = [("revenue", 5.0)].into_iter().collect();
        assert_eq!(run_validation(&rule, &values), None);
        let values: ValueStore = [("revenue", 2e6)].into_iter().collect();
        assert_eq!(run_validation(&rule, &values).unwrap().expected, Some(1e6));
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_invalid_epsilon_falls_back_to_default(#[case] epsilon: f64) {
        let rules = vec![
            RuleDefinition::new("r", RuleKind::Comparison, "EQUALS:a:b", Severity::Error).with_tolerance(0.1),
        ];
        let values: ValueStore = [("a", 0.0), ("b", 0.0)].into_iter().collect();
        let report = Validator::new(&rules).with_epsilon(epsilon).validate_all(&values);
        assert_eq!(report.status, ValidationStatus::Valid);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_out_of_range_tolerance_is_a_rule_defect() {
        let rule = RuleDefinition::new("r", RuleKind::Reconciliation, "RECONCILE:a:b", Severity::Info)
            .with_tolerance(1.5);
        let issue = run_validation(&rule, &ValueStore::new()).unwrap();
        assert_eq!(issue.severity, Severity::Error);
        assert!(issue.message.contains("tolerance"));
    }

    #[test]
    fn test_phase_order_then_definition_order() {
        let rules = vec![
            RuleDefinition::new("recon", RuleKind::Reconciliation, "RECONCILE:a:b", Severity::Warning),
            RuleDefinition::new("range_1", RuleKind::Range, "RANGE:a:0:1", Severity::Warning),
            RuleDefinition::new("cmp", RuleKind::Comparison, "GREATER:b:a", Severity::Warning),
            RuleDefinition::new("dep", RuleKind::Dependency, "REQUIRES:a:c", Severity::Warning),
            RuleDefinition::new("range_2", RuleKind::Range, "RANGE:b:0:1", Severity::Warning),
        ];
        let values: ValueStore = [("a", 10.0), ("b", 5.0)].into_iter().collect();
        let ids: Vec<String> = validate_all(&values, &rules).issues.into_iter().map(|i| i.rule_id).collect();
        assert_eq!(ids, vec!["dep", "range_1", "range_2", "recon", "cmp"]);
    }

    #[rstest]
    #[case(vec![], ValidationStatus::Valid)]
    #[case(vec![Severity::Info], ValidationStatus::Valid)]
    #[case(vec![Severity::Info, Severity::Warning], ValidationStatus::Warnings)]
    #[case(vec![Severity::Warning, Severity::Error], ValidationStatus::Errors)]
    fn test_overall_status(#[case] severities: Vec<Severity>, #[case] expected: ValidationStatus) {
        let rules: Vec<RuleDefinition> = severities
            .into_iter()
            .enumerate()
            .map(|(i, s)| RuleDefinition::new(format!("r{}", i), RuleKind::Range, "RANGE:a:0:1", s))
            .collect();
        let values: ValueStore = [("a", 2.0)].into_iter().collect();
        assert_eq!(validate_all(&values, &rules).status, expected);
    }

    #[test]
    fn test_inactive_rules_are_skipped() {
        let mut rule = RuleDefinition::new("r", RuleKind::Range, "RANGE:a:0:1", Severity::Error);
        rule.active = false;
        let values: ValueStore = [("a", 2.0)].into_iter().collect();
        assert_eq!(validate_all(&values, &[rule]).status, ValidationStatus::Valid);
    }

    #[test]
    fn test_sections_from_metric_definitions() {
        let metrics = vec![
            MetricDefinition::input("total_leads").in_section("marketing"),
            MetricDefinition::input("in_home_visits").in_section("sales"),
            MetricDefinition::input("reported_booking_rate").in_section("marketing"),
        ];
        let rules = vec![booking_rule()];
        let report = Validator::new(&rules).with_metric_sections(&metrics).validate_all(&booking_values(70.0));
        assert_eq!(report.issues[0].sections, vec!["marketing", "sales"]);
    }

    #[test]
    fn test_all_inputs_missing_is_valid() {
        let metrics = vec![
            MetricDefinition::input("total_leads"),
            MetricDefinition::input("in_home_visits"),
            MetricDefinition::calculated("booking_rate", "PERCENTAGE:in_home_visits:total_leads"),
        ];
        let result = calculate(&RawInputs::new(), &metrics, 30);
        let rules = vec![
            booking_rule(),
            RuleDefinition::new("range", RuleKind::Range, "RANGE:booking_rate:0:100", Severity::Error),
        ];
        let report = validate_all(&result.values, &rules);
        assert_eq!(report.status, ValidationStatus::Valid);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let rules = vec![booking_rule()];
        let values = booking_values(70.0);
        assert_eq!(validate_all(&values, &rules), validate_all(&values, &rules));
    }
}
