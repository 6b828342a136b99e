use crate::compute::plan::{Action, Plan};
use crate::compute::CalculationResult;
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the upstream tree of `target` with each metric's value, or the
/// reason it is absent. A metric reached a second time is printed as a
/// reference to the level where it first appeared.
pub fn format_trace(plan: &Plan, result: &CalculationResult, target: &str) -> String {
    let mut tracer = Tracer { plan, result, visited_at_level: HashMap::new(), output: String::new() };

    if plan.step(target).is_some() || result.values.contains(target) {
        let _ = writeln!(tracer.output, "AUDIT TRACE for metric '{}':", target);
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_metric(target, 1, "");
    } else {
        let _ = writeln!(tracer.output, "Error: Unknown metric '{}'", target);
    }
    tracer.output
}

struct Tracer<'a> {
    plan: &'a Plan,
    result: &'a CalculationResult,
    visited_at_level: HashMap<&'a str, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_metric(&mut self, id: &'a str, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(id) {
            let _ = writeln!(self.output, "{}{} -> (Ref to L{})", prefix, id, first_seen);
            return;
        }
        self.visited_at_level.insert(id, level);

        let header = format!("[L{}] {}{}", level, id, self.format_value(id));
        let plan = self.plan;
        match plan.step(id) {
            Some(step) => {
                match &step.action {
                    Action::Evaluate(formula) => {
                        let _ = writeln!(self.output, "{}{} = {}", prefix, header, formula);
                    }
                    Action::Fail(_) => {
                        let _ = writeln!(self.output, "{}{} [NOT EVALUATED]", prefix, header);
                    }
                }
                self.recurse_children(prefix, &step.depends_on, level);
            }
            None if self.result.values.contains(id) => {
                let _ = writeln!(self.output, "{}{} -> Input", prefix, header);
            }
            None => {
                let _ = writeln!(self.output, "{}{} -> Undefined", prefix, header);
            }
        }
    }

    fn recurse_children(&mut self, prefix: &str, children: &'a [String], level: usize) {
        let stem = build_child_stem(prefix);
        for (i, child) in children.iter().enumerate() {
            let connector = if i == children.len() - 1 { "`-- " } else { "|-- " };
            self.trace_metric(child, level + 1, &format!("{}{}", stem, connector));
        }
    }

    fn format_value(&self, id: &str) -> String {
        match (self.result.values.get(id), self.result.diagnostics.get(id)) {
            (Some(v), _) => format!(" [{:.3}]", v),
            (None, Some(diagnostic)) => format!(" [n/a: {}]", diagnostic),
            (None, None) => " [n/a]".to_string(),
        }
    }
}

fn build_child_stem(prefix: &str) -> String {
    prefix.replace("`-- ", "    ").replace("|-- ", "|   ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Calculator;
    use crate::store::{MetricDefinition, RawInputs};

    fn calculator() -> Calculator {
        Calculator::new(&[
            MetricDefinition::input("total_leads"),
            MetricDefinition::input("in_home_visits"),
            MetricDefinition::input("jobs_closed"),
            MetricDefinition::calculated("booking_rate", "PERCENTAGE:in_home_visits:total_leads"),
            MetricDefinition::calculated("close_rate", "PERCENTAGE:jobs_closed:in_home_visits"),
            MetricDefinition::calculated("funnel", "MULTIPLY:booking_rate:close_rate"),
        ])
    }

    fn inputs(pairs: &[(&str, f64)]) -> RawInputs {
        pairs.iter().map(|(k, v)| (k.to_string(), Some(*v))).collect()
    }

    #[test]
    fn test_trace_tree_with_shared_reference() {
        let calc = calculator();
        let result = calc.calculate(&inputs(&[("total_leads", 100.0), ("in_home_visits", 40.0), ("jobs_closed", 10.0)]), 30);
        let trace = format_trace(calc.plan(), &result, "funnel");
        let expected = "\
AUDIT TRACE for metric 'funnel':
--------------------------------------------------
[L1] funnel [1000.000] = MULTIPLY:booking_rate:close_rate
|-- [L2] booking_rate [40.000] = PERCENTAGE:in_home_visits:total_leads
|   |-- [L3] in_home_visits [40.000] -> Input
|   `-- [L3] total_leads [100.000] -> Input
`-- [L2] close_rate [25.000] = PERCENTAGE:jobs_closed:in_home_visits
    |-- [L3] jobs_closed [10.000] -> Input
    `-- in_home_visits -> (Ref to L3)
";
        assert_eq!(trace, expected);
    }

    #[test]
    fn test_trace_shows_root_cause() {
        let calc = calculator();
        let result = calc.calculate(&inputs(&[("in_home_visits", 40.0), ("jobs_closed", 10.0)]), 30);
        let trace = format_trace(calc.plan(), &result, "funnel");
        assert!(trace.contains("[L1] funnel [n/a: missing total_leads]"));
        assert!(trace.contains("[L3] total_leads [n/a] -> Input"));
    }

    #[test]
    fn test_unknown_target() {
        let calc = calculator();
        let result = calc.calculate(&RawInputs::new(), 30);
        assert_eq!(format_trace(calc.plan(), &result, "nope"), "Error: Unknown metric 'nope'\n");
    }
}
