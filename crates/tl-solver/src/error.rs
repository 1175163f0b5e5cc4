//! Error types for local solver operations.

use thiserror::Error;
use tl_core::TlError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Dimension mismatch: {what} (expected {expected}, got {got})")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid solver setup: {what}")]
    InvalidSetup { what: String },

    #[error("Delay length must be at least 1 step, got {steps}")]
    DelayLength { steps: usize },

    #[error(transparent)]
    Core(#[from] TlError),
}

pub type SolverResult<T> = Result<T, SolverError>;
