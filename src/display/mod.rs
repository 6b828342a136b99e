//! Human-readable renderings of calculation results.
pub mod trace;
