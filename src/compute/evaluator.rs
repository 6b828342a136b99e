//! evaluator.rs
//! Executes one parsed formula against a value store.
//!
//! Pure: never mutates the store. Absent operands make the result
//! `Undetermined`; only an unregistered custom routine is an error.

use super::custom::CustomRegistry;
use super::error::{Diagnostic, FormulaError};
use super::formula::{BinaryOp, Formula, Operand};
use crate::config::EngineConfig;
use crate::store::ValueStore;

/// Outcome of evaluating one formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Value(f64),
    Undetermined(Diagnostic),
}

impl Evaluation {
    pub fn value(&self) -> Option<f64> {
        match self {
            Evaluation::Value(v) => Some(*v),
            Evaluation::Undetermined(_) => None,
        }
    }
}

/// Everything a formula may read.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub values: &'a ValueStore,
    pub period_days: u32,
    pub customs: &'a CustomRegistry,
    pub config: &'a EngineConfig,
}

impl<'a> EvalContext<'a> {
    fn resolve(&self, operand: &Operand) -> Result<f64, Diagnostic> {
        match operand {
            Operand::Literal(v) => Ok(*v),
            Operand::PeriodDays => Ok(f64::from(self.period_days)),
            Operand::Metric(id) => self.values.get(id).ok_or_else(|| Diagnostic::missing(id.as_str())),
        }
    }

    /// Like `resolve`, but an absent metric falls back to `default`.
    fn resolve_or(&self, operand: Option<&Operand>, default: f64) -> f64 {
        operand.and_then(|op| self.resolve(op).ok()).unwrap_or(default)
    }
}

pub fn evaluate(formula: &Formula, ctx: &EvalContext<'_>) -> Result<Evaluation, FormulaError> {
    let result = match formula {
        Formula::Binary { op, lhs, rhs } => binary(*op, lhs, rhs, ctx),
        Formula::PerDay(a) => ctx.resolve(a).and_then(|a| {
            if ctx.period_days == 0 {
                Err(Diagnostic::InvalidPeriod { days: ctx.period_days })
            } else {
                Ok(a / f64::from(ctx.period_days))
            }
        }),
        Formula::Capacity { employees, hours_per_day, days } => ctx.resolve(employees).and_then(|employees| {
            let hours = ctx.resolve_or(hours_per_day.as_ref(), ctx.config.default_hours_per_day);
            let days = match days.as_ref().and_then(|d| ctx.resolve(d).ok()) {
                Some(days) => days,
                None if ctx.period_days == 0 => return Err(Diagnostic::InvalidPeriod { days: ctx.period_days }),
                None => f64::from(ctx.period_days),
            };
            Ok(employees * hours * days)
        }),
        Formula::Custom(name) => {
            let function = ctx
                .customs
                .get(name)
                .ok_or_else(|| FormulaError::UnregisteredCustom(name.clone()))?;
            function.call(ctx.values, ctx.period_days).ok_or_else(|| {
                function
                    .depends_on
                    .iter()
                    .find(|dep| !ctx.values.is_present(dep))
                    .map(|dep| Diagnostic::missing(dep.as_str()))
                    .unwrap_or_else(|| Diagnostic::CustomUndetermined { routine: name.clone() })
            })
        }
    };

    Ok(match result {
        Ok(v) if v.is_finite() => Evaluation::Value(v),
        Ok(_) => Evaluation::Undetermined(Diagnostic::NonFinite),
        Err(diagnostic) => Evaluation::Undetermined(diagnostic),
    })
}

fn binary(op: BinaryOp, lhs: &Operand, rhs: &Operand, ctx: &EvalContext<'_>) -> Result<f64, Diagnostic> {
    let a = ctx.resolve(lhs)?;
    let b = ctx.resolve(rhs)?;
    if op.divides() && b == 0.0 {
        return Err(Diagnostic::DivisionByZero { divisor: rhs.to_string() });
    }
    Ok(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide | BinaryOp::PerVehicle => a / b,
        BinaryOp::Percentage => (a / b) * 100.0,
    })
}
