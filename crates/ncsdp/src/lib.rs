//! # ncsdp
//!
//! Semidefinite (NPA) relaxations of noncommutative polynomial
//! optimization problems.
//!
//! A problem over operators is relaxed to a semidefinite program over
//! the moments of the operator monomials. The relaxation is handed to an
//! external SDP solver through the [`SdpSolver`](relax::SdpSolver) trait
//! or written out as SDPA-style sparse entries.
//!
//! ## Features
//!
//! - **Operator algebra**: Hermitian, non-Hermitian and commuting
//!   operators, polynomials with complex coefficients
//! - **Substitution rules**: bounded rewriting to a normal form
//! - **Moment and localizing matrices**: built on a worker pool with
//!   deterministic variable numbering
//! - **Equality handling**: moment substitutions and numerical
//!   elimination by pivoted QR
//! - **Complex problems**: lifting of Hermitian blocks to real ones
//!
//! ## Quick Start
//!
//! ```
//! use ncsdp::prelude::*;
//!
//! let mut table = SymbolTable::new();
//! let x = table.hermitian("X");
//!
//! // minimize <X> subject to 1 - X² ⪰ 0
//! let bound = Polynomial::one().sub(&Polynomial::from(Word::from_letters([x, x])));
//! let problem = Problem::new(1)
//!     .objective(Word::from(x))
//!     .constraints(Constraints::new().inequality(bound));
//!
//! let mut relaxation = Relaxation::new(vec![vec![x]]);
//! relaxation.build(problem).unwrap();
//! assert_eq!(relaxation.block_struct(), &[2, 1]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub use ncsdp_algebra as algebra;
pub use ncsdp_linalg as linalg;
pub use ncsdp_relax as relax;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use ncsdp_algebra::{Expr, Letter, Polynomial, Relation, RuleSet, SubstitutionRule, SymbolTable, Word};
    pub use ncsdp_linalg::ParallelConfig;
    pub use ncsdp_relax::{
        Constraints, ExtraMomentMatrix, MomentBasis, MomentExpr, Problem, Relaxation, RelaxationConfig,
        RelaxationError, SdpSolution, SdpSolver, SolverParams,
    };
}
