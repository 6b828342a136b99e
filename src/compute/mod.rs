//! Resolves calculated metrics from raw inputs.
pub mod custom;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod formula;
pub mod plan;

pub use custom::CustomRegistry;
pub use engine::{calculate, CalculationResult, Calculator};
pub use error::{Diagnostic, FormulaError};
pub use evaluator::{evaluate, EvalContext, Evaluation};
pub use formula::{BinaryOp, Formula, Operand};
