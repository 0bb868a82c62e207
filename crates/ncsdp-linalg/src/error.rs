//! Errors raised by the linear-algebra routines.

use thiserror::Error;

/// Linear-algebra failures.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum LinalgError {
    /// Operand sizes do not agree.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        found: usize,
    },

    /// A linear system has no exact solution.
    #[error("linear system is inconsistent (residual {residual:e})")]
    Inconsistent {
        /// Largest violated residual.
        residual: f64,
    },
}
