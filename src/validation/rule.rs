//! Rule formula grammar: `RECONCILE`, `RANGE`, `GREATER`, `EQUALS`, `REQUIRES`.

use super::error::RuleError;
use super::expr::Expr;
use crate::compute::formula::is_identifier;
use crate::store::RuleKind;

/// A parsed validation check.
#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    /// `RECONCILE:expr:target`
    Reconcile { computed: Expr, target: Expr },
    /// `RANGE:kpi:min:max`; an empty bound is open.
    Range { kpi: String, min: Option<Expr>, max: Option<Expr> },
    /// `GREATER:a:b`
    Greater { lhs: Expr, rhs: Expr },
    /// `EQUALS:a:b`
    Equals { lhs: Expr, rhs: Expr },
    /// `REQUIRES:dependent:parent`
    Requires { dependent: String, parent: String },
}

impl Check {
    pub fn parse(formula: &str) -> Result<Self, RuleError> {
        let formula = formula.trim();
        if formula.is_empty() {
            return Err(RuleError::Empty);
        }
        let mut parts = formula.split(':').map(str::trim);
        let op = parts.next().unwrap_or_default().to_ascii_uppercase();
        let args: Vec<&str> = parts.collect();

        match op.as_str() {
            "RECONCILE" => {
                arity("RECONCILE", &args, 2)?;
                Ok(Check::Reconcile { computed: Expr::parse(args[0])?, target: Expr::parse(args[1])? })
            }
            "RANGE" => {
                arity("RANGE", &args, 3)?;
                let bound = |s: &str| if s.is_empty() { Ok(None) } else { Expr::parse(s).map(Some) };
                Ok(Check::Range { kpi: identifier(args[0])?, min: bound(args[1])?, max: bound(args[2])? })
            }
            "GREATER" => {
                arity("GREATER", &args, 2)?;
                Ok(Check::Greater { lhs: Expr::parse(args[0])?, rhs: Expr::parse(args[1])? })
            }
            "EQUALS" => {
                arity("EQUALS", &args, 2)?;
                Ok(Check::Equals { lhs: Expr::parse(args[0])?, rhs: Expr::parse(args[1])? })
            }
            "REQUIRES" => {
                arity("REQUIRES", &args, 2)?;
                Ok(Check::Requires { dependent: identifier(args[0])?, parent: identifier(args[1])? })
            }
            _ => Err(RuleError::UnknownOperation(op)),
        }
    }

    /// The kind this check naturally belongs to.
    pub fn natural_kind(&self) -> RuleKind {
        match self {
            Check::Reconcile { .. } => RuleKind::Reconciliation,
            Check::Range { .. } => RuleKind::Range,
            Check::Greater { .. } | Check::Equals { .. } => RuleKind::Comparison,
            Check::Requires { .. } => RuleKind::Dependency,
        }
    }

    /// Whether the rule's tolerance participates in the check.
    pub fn uses_tolerance(&self) -> bool {
        matches!(self, Check::Reconcile { .. } | Check::Equals { .. })
    }

    /// Every metric identifier the check reads, in order, without duplicates.
    pub fn metrics(&self) -> Vec<String> {
        let mut out: Vec<&str> = Vec::new();
        match self {
            Check::Reconcile { computed, target } => {
                push_unique(&mut out, computed.metrics());
                push_unique(&mut out, target.metrics());
            }
            Check::Range { kpi, min, max } => {
                push_unique(&mut out, [kpi.as_str()]);
                for bound in min.iter().chain(max.iter()) {
                    push_unique(&mut out, bound.metrics());
                }
            }
            Check::Greater { lhs, rhs } | Check::Equals { lhs, rhs } => {
                push_unique(&mut out, lhs.metrics());
                push_unique(&mut out, rhs.metrics());
            }
            Check::Requires { dependent, parent } => {
                push_unique(&mut out, [dependent.as_str(), parent.as_str()]);
            }
        }
        out.into_iter().map(str::to_string).collect()
    }
}

fn push_unique<'a>(out: &mut Vec<&'a str>, ids: impl IntoIterator<Item = &'a str>) {
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
}

fn arity(op: &'static str, args: &[&str], expected: usize) -> Result<(), RuleError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(RuleError::Arity { op, expected, actual: args.len() })
    }
}

fn identifier(token: &str) -> Result<String, RuleError> {
    if is_identifier(token) {
        Ok(token.to_string())
    } else {
        Err(RuleError::NotAnIdentifier(token.to_string()))
    }
}
