//! # ncsdp-relax
//!
//! Moment-matrix (NPA) relaxations of noncommutative polynomial
//! optimization problems.
//!
//! This crate provides:
//! - A monomial index mapping canonical words to SDP variables
//! - Moment and localizing block generation, optionally on a worker pool
//! - Moment substitutions and numerical elimination of equalities
//! - Embedding of complex Hermitian blocks into real symmetric ones
//! - SDPA-style export and a solver contract
//! - Rank and sum-of-squares analysis of solutions
//!
//! ## Example
//!
//! ```
//! use ncsdp_algebra::{Polynomial, SymbolTable, Word};
//! use ncsdp_relax::{Problem, Relaxation};
//!
//! let mut table = SymbolTable::new();
//! let x = table.hermitian("X");
//!
//! let mut relaxation = Relaxation::new(vec![vec![x]]);
//! relaxation.build(Problem::new(1).objective(Word::from(x))).unwrap();
//!
//! // basis {1, X}: one 2 × 2 block over the moments of X and X²
//! assert_eq!(relaxation.block_struct(), &[2]);
//! assert_eq!(relaxation.n_vars(), 2);
//! assert_eq!(relaxation.obj_facvar(), &[1.0, 0.0]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analysis;
pub mod assembler;
pub mod canonical;
pub mod complex;
pub mod config;
pub mod constraints;
pub mod eliminate;
pub mod error;
pub mod export;
pub mod index;
pub mod localizing;
pub mod moment;
pub mod relaxation;
pub mod solve;

pub use assembler::{BlockStructure, ConstraintAssembler};
pub use canonical::{Canonicalizer, IndexMode, MomentSubstitutions, MomentValue, ResolvedTerm};
pub use config::RelaxationConfig;
pub use constraints::{Constraints, MomentConstraint, MomentExpr, MomentTerm};
pub use eliminate::Elimination;
pub use error::{ErrorKind, RelaxationError, Result};
pub use export::{HumanReadable, LiftedProblem, SdpaEntry};
pub use index::{MonomialIndex, VarId, CONSTANT};
pub use moment::{MomentBasis, MomentCell};
pub use relaxation::{ExtraMomentMatrix, Problem, Relaxation};
pub use solve::{RawSolution, SdpSolution, SdpSolver, SolveStatus, SolverParams};

#[cfg(test)]
mod proptests;
#[cfg(test)]
mod tests;
