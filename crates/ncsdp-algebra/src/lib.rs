//! # ncsdp-algebra
//!
//! Noncommutative operator algebra for moment relaxations.
//!
//! This crate provides:
//! - Interned operator symbols with Hermitian and commuting flags
//! - Words (coefficient-free noncommutative monomials) with adjoints
//! - Polynomials over words with complex coefficients
//! - A tagged expression tree and relations for building constraints
//! - Substitution rules applied to a bounded fixpoint
//! - Monomial basis generation per relaxation level
//!
//! ## Example
//!
//! ```
//! use ncsdp_algebra::{Polynomial, RuleSet, SubstitutionRule, SymbolTable, Word};
//!
//! let mut table = SymbolTable::new();
//! let x = table.hermitian("X");
//!
//! // X is a projector: X^2 = X
//! let mut rules = RuleSet::new();
//! rules.push(SubstitutionRule::new(Word::from_letters([x, x]), Polynomial::from(Word::from(x))).unwrap());
//!
//! let reduced = rules.reduce_word(&Word::from_letters([x, x, x])).unwrap();
//! assert_eq!(reduced, Polynomial::from(Word::from(x)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod basis;
pub mod error;
pub mod expr;
pub mod poly;
pub mod substitution;
pub mod symbol;
pub mod word;

#[cfg(test)]
mod proptests;

pub use basis::{find_variable_group, generate_basis, pick_up_to_degree, unique_words, words_up_to_degree};
pub use error::AlgebraError;
pub use expr::{Expr, Relation, RelationKind};
pub use poly::Polynomial;
pub use substitution::{RuleSet, SubstitutionRule};
pub use symbol::{Letter, OperatorInfo, SymbolId, SymbolTable};
pub use word::Word;
