//! Rule checks over a resolved value set.
pub mod error;
pub mod expr;
pub mod issue;
mod message;
pub mod rule;
pub mod rules;
pub mod validator;

pub use error::RuleError;
pub use issue::{Issue, ValidationReport, ValidationStatus};
pub use rule::Check;
pub use validator::{run_validation, validate_all, Validator};
