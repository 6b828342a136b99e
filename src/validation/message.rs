//! Message template rendering for issues.
//!
//! `{expected}`, `{actual}`, `{variance}`, `{tolerance}`, `{rule}` and
//! `{<metric_id>}` are substituted. Absent values render as `n/a`; anything
//! else in braces is left as written.

use super::rules::Finding;
use crate::store::{RuleDefinition, ValueStore};

const ABSENT: &str = "n/a";

pub(crate) fn render(rule: &RuleDefinition, finding: &Finding, values: &ValueStore) -> String {
    let template = if rule.message.trim().is_empty() {
        "{rule} failed"
    } else {
        rule.message.as_str()
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = &after[..close];
        match substitute(key, rule, finding, values) {
            Some(text) => out.push_str(&text),
            None => {
                out.push('{');
                out.push_str(key);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

fn substitute(key: &str, rule: &RuleDefinition, finding: &Finding, values: &ValueStore) -> Option<String> {
    let text = match key {
        "expected" => number(finding.expected),
        "actual" => number(finding.actual),
        "variance" => percent(finding.variance),
        "tolerance" => percent(Some(rule.tolerance)),
        "rule" => rule.display_name().to_string(),
        id if values.contains(id) => number(values.get(id)),
        _ => return None,
    };
    Some(text)
}

pub(crate) fn number(value: Option<f64>) -> String {
    match value {
        None => ABSENT.to_string(),
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{:.0}", v),
        Some(v) => format!("{:.2}", v),
    }
}

fn percent(fraction: Option<f64>) -> String {
    match fraction {
        None => ABSENT.to_string(),
        Some(f) => format!("{:.1}%", f * 100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RuleKind, Severity};

    fn rule(message: &str) -> RuleDefinition {
        RuleDefinition::new("booking_check", RuleKind::Reconciliation, "RECONCILE:a:b", Severity::Warning)
            .with_tolerance(0.1)
            .with_message(message)
    }

    fn finding() -> Finding {
        Finding { expected: Some(40.0), actual: Some(70.0), variance: Some(30.0 / 70.0) }
    }

    #[test]
    fn test_renders_all_placeholders() {
        let values: ValueStore = [("total_leads", 100.0)].into_iter().collect();
        let text = render(
            &rule("{rule}: expected {expected}, got {actual} ({variance} > {tolerance}) from {total_leads} leads"),
            &finding(),
            &values,
        );
        assert_eq!(text, "booking_check: expected 40, got 70 (42.9% > 10.0%) from 100 leads");
    }

    #[test]
    fn test_absent_values_render_as_na() {
        let values: ValueStore = [("jobs_closed".to_string(), None)].into_iter().collect();
        let finding = Finding { expected: None, actual: Some(2.5), variance: None };
        let text = render(&rule("{expected} / {actual} / {variance} / {jobs_closed}"), &finding, &values);
        assert_eq!(text, "n/a / 2.50 / n/a / n/a");
    }

    #[test]
    fn test_unknown_placeholder_left_verbatim() {
        let text = render(&rule("see {appendix} and {unclosed"), &finding(), &ValueStore::new());
        assert_eq!(text, "see {appendix} and {unclosed");
    }

    #[test]
    fn test_empty_template_falls_back_to_rule_name() {
        assert_eq!(render(&rule("  "), &finding(), &ValueStore::new()), "booking_check failed");
    }
}
