//! Errors raised by the operator algebra.

use thiserror::Error;

/// Errors from rule construction and application.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AlgebraError {
    /// A substitution rule with an identity pattern matches everywhere.
    #[error("substitution pattern must contain at least one letter")]
    EmptyPattern,

    /// Rewriting did not reach a fixpoint within the rewrite budget.
    #[error("substitution rules did not terminate after {limit} rewrites")]
    NonTerminatingSubstitution {
        /// The rewrite budget that was exhausted.
        limit: usize,
    },
}
