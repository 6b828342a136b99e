//! formula.rs
//! The colon-delimited metric formula grammar: `OP:ARG1[:ARG2[:ARG3]]`.

use super::error::FormulaError;
use smallvec::{smallvec, SmallVec};
use std::fmt;

/// One argument of a formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(f64),
    Metric(String),
    /// The reserved token that reads the run's period length.
    PeriodDays,
}

impl Operand {
    pub(crate) fn parse(token: &str, period_token: &str) -> Result<Self, FormulaError> {
        let token = token.trim();
        if let Ok(v) = token.parse::<f64>() {
            if v.is_finite() {
                return Ok(Operand::Literal(v));
            }
        }
        if token == period_token {
            return Ok(Operand::PeriodDays);
        }
        if is_identifier(token) {
            Ok(Operand::Metric(token.to_string()))
        } else {
            Err(FormulaError::MalformedOperand(token.to_string()))
        }
    }

    pub fn metric(&self) -> Option<&str> {
        match self {
            Operand::Metric(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(v) => write!(f, "{}", v),
            Operand::Metric(id) => write!(f, "{}", id),
            Operand::PeriodDays => write!(f, "period_days"),
        }
    }
}

/// Identifiers start with a letter or underscore and continue with
/// alphanumerics, underscores or dots.
pub(crate) fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Divide,
    Multiply,
    Subtract,
    Add,
    /// (a / b) * 100
    Percentage,
    /// a / b, named for per-vehicle ratios.
    PerVehicle,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Divide => "DIVIDE",
            BinaryOp::Multiply => "MULTIPLY",
            BinaryOp::Subtract => "SUBTRACT",
            BinaryOp::Add => "ADD",
            BinaryOp::Percentage => "PERCENTAGE",
            BinaryOp::PerVehicle => "PER_VEHICLE",
        }
    }

    /// Operations whose right-hand side is a divisor.
    pub fn divides(self) -> bool {
        matches!(self, BinaryOp::Divide | BinaryOp::Percentage | BinaryOp::PerVehicle)
    }
}

/// A parsed metric formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    Binary { op: BinaryOp, lhs: Operand, rhs: Operand },
    PerDay(Operand),
    Capacity {
        employees: Operand,
        hours_per_day: Option<Operand>,
        days: Option<Operand>,
    },
    Custom(String),
}

impl Formula {
    pub fn parse(text: &str, period_token: &str) -> Result<Self, FormulaError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FormulaError::Empty);
        }
        let mut tokens = text.split(':').map(str::trim);
        let op_name = tokens.next().unwrap_or_default().to_ascii_uppercase();
        let args: SmallVec<[&str; 4]> = tokens.collect();

        let binary = |op: BinaryOp| -> Result<Formula, FormulaError> {
            expect_arity(op.name(), "2", &args, 2..=2)?;
            Ok(Formula::Binary {
                op,
                lhs: Operand::parse(args[0], period_token)?,
                rhs: Operand::parse(args[1], period_token)?,
            })
        };

        match op_name.as_str() {
            "DIVIDE" => binary(BinaryOp::Divide),
            "MULTIPLY" => binary(BinaryOp::Multiply),
            "SUBTRACT" => binary(BinaryOp::Subtract),
            "ADD" => binary(BinaryOp::Add),
            "PERCENTAGE" => binary(BinaryOp::Percentage),
            "PER_VEHICLE" => binary(BinaryOp::PerVehicle),
            "PER_DAY" => {
                expect_arity("PER_DAY", "1", &args, 1..=1)?;
                Ok(Formula::PerDay(Operand::parse(args[0], period_token)?))
            }
            "CAPACITY" => {
                expect_arity("CAPACITY", "1 to 3", &args, 1..=3)?;
                let optional = |i: usize| -> Result<Option<Operand>, FormulaError> {
                    match args.get(i) {
                        Some(tok) if !tok.is_empty() => Operand::parse(tok, period_token).map(Some),
                        _ => Ok(None),
                    }
                };
                Ok(Formula::Capacity {
                    employees: Operand::parse(args[0], period_token)?,
                    hours_per_day: optional(1)?,
                    days: optional(2)?,
                })
            }
            "CUSTOM" => {
                expect_arity("CUSTOM", "1", &args, 1..=1)?;
                let name = args[0];
                if is_identifier(name) {
                    Ok(Formula::Custom(name.to_string()))
                } else {
                    Err(FormulaError::MalformedOperand(name.to_string()))
                }
            }
            _ => Err(FormulaError::UnknownOperation(op_name)),
        }
    }

    /// Metric identifiers read directly by this formula, in argument order.
    /// Custom routines declare their reads separately.
    pub fn references(&self) -> SmallVec<[&str; 4]> {
        let operands: SmallVec<[&Operand; 3]> = match self {
            Formula::Binary { lhs, rhs, .. } => smallvec![lhs, rhs],
            Formula::PerDay(a) => smallvec![a],
            Formula::Capacity { employees, hours_per_day, days } => {
                let mut ops: SmallVec<[&Operand; 3]> = smallvec![employees];
                ops.extend(hours_per_day.iter());
                ops.extend(days.iter());
                ops
            }
            Formula::Custom(_) => SmallVec::new(),
        };
        operands.into_iter().filter_map(|op| op.metric()).collect()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Binary { op, lhs, rhs } => write!(f, "{}:{}:{}", op.name(), lhs, rhs),
            Formula::PerDay(a) => write!(f, "PER_DAY:{}", a),
            Formula::Capacity { employees, hours_per_day, days } => {
                write!(f, "CAPACITY:{}", employees)?;
                match (hours_per_day, days) {
                    (None, None) => Ok(()),
                    (Some(h), None) => write!(f, ":{}", h),
                    (h, Some(d)) => {
                        let h = h.as_ref().map(ToString::to_string).unwrap_or_default();
                        write!(f, ":{}:{}", h, d)
                    }
                }
            }
            Formula::Custom(name) => write!(f, "CUSTOM:{}", name),
        }
    }
}

fn expect_arity(
    op: &'static str,
    expected: &'static str,
    args: &[&str],
    range: std::ops::RangeInclusive<usize>,
) -> Result<(), FormulaError> {
    if range.contains(&args.len()) {
        Ok(())
    } else {
        Err(FormulaError::Arity { op, expected, actual: args.len() })
    }
}
