//! Canonicalization of monomials onto SDP variables.
//!
//! A raw product is first reduced by the substitution rules, in two
//! stages: the pure rules, then the full rule set. Workers run the first
//! stage, the coordinator the second, so sequential and parallel builds
//! see identical normal forms. Each resulting term is then resolved to a
//! variable id:
//! 1. the identity word is the constant column
//! 2. a moment substitution replaces the word by a constant, or by a
//!    multiple of another word
//! 3. a word already in the index reuses its variable
//! 4. a word whose adjoint is indexed reuses the adjoint's variable
//! 5. otherwise a new variable is created, or the lookup fails
//!
//! Words carry no scalar, so the sign of a term always lives in its
//! coefficient and two terms differing only in sign share a variable.

use num_complex::Complex64;
use rustc_hash::FxHashMap;

use ncsdp_algebra::{Polynomial, RuleSet, Word};

use crate::error::{RelaxationError, Result};
use crate::index::{MonomialIndex, VarId, CONSTANT};

/// Value a monomial is pinned to by a simple moment equality.
#[derive(Clone, Debug, PartialEq)]
pub enum MomentValue {
    /// The moment equals a constant.
    Constant(Complex64),
    /// The moment equals `ratio` times the moment of another word.
    Scaled {
        /// Proportionality factor.
        ratio: Complex64,
        /// The word the moment is expressed through.
        word: Word,
    },
}

impl MomentValue {
    fn scale(&self, factor: Complex64) -> Self {
        match self {
            Self::Constant(value) => Self::Constant(value * factor),
            Self::Scaled { ratio, word } => Self::Scaled {
                ratio: ratio * factor,
                word: word.clone(),
            },
        }
    }
}

/// Moment substitutions keyed by the substituted word.
///
/// No value ever points at a substituted word, so resolution takes a
/// single step.
pub type MomentSubstitutions = FxHashMap<Word, MomentValue>;

/// The word standing for both itself and its adjoint in a real
/// relaxation, where the two share a moment.
fn real_representative(word: &Word) -> Word {
    let adjoint = word.adjoint();
    if adjoint < *word {
        adjoint
    } else {
        word.clone()
    }
}

/// Rewrites a reduced polynomial through the moment substitutions
/// collected so far.
#[must_use]
pub fn substitute_moments(subs: &MomentSubstitutions, poly: &Polynomial, real: bool) -> Polynomial {
    Polynomial::from_terms(poly.terms().iter().map(|(w, c)| {
        let w = if real { real_representative(w) } else { w.clone() };
        match subs.get(&w) {
            Some(MomentValue::Constant(value)) => (Word::identity(), c * value),
            Some(MomentValue::Scaled { ratio, word }) => (word.clone(), c * ratio),
            None => (w, *c),
        }
    }))
}

/// Adds a substitution for a word that is not yet substituted and that
/// `value` does not refer to. Values pointing at `word` are composed
/// with `value`.
pub fn insert_moment_substitution(subs: &mut MomentSubstitutions, word: Word, value: MomentValue, real: bool) {
    for existing in subs.values_mut() {
        if let MomentValue::Scaled { ratio, word: target } = existing {
            if *target == word {
                *existing = value.scale(*ratio);
            }
        }
    }
    if real {
        let adjoint = word.adjoint();
        if adjoint != word {
            subs.insert(adjoint, value.clone());
        }
    }
    subs.insert(word, value);
}

/// What to do with a monomial the index has not seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexMode {
    /// Create a new variable.
    Create,
    /// Fail with [`RelaxationError::MonomialNotFound`].
    Lookup,
}

/// A term resolved to an SDP variable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedTerm {
    /// Variable id, [`CONSTANT`] for the constant column.
    pub var: VarId,
    /// Accumulated coefficient.
    pub coeff: Complex64,
    /// True if the variable was found through the adjoint of the word.
    pub via_adjoint: bool,
}

/// Rule-driven reduction and index resolution of monomials.
#[derive(Clone, Copy, Debug)]
pub struct Canonicalizer<'a> {
    rules: &'a RuleSet,
    pure_rules: &'a RuleSet,
    moment_subs: &'a MomentSubstitutions,
    /// Reuse the adjoint's variable when creating. Only sound when every
    /// moment is real.
    adjoint_on_create: bool,
}

impl<'a> Canonicalizer<'a> {
    /// Creates a canonicalizer.
    ///
    /// `pure_rules` must be `rules.pure_subset()`.
    #[must_use]
    pub fn new(
        rules: &'a RuleSet,
        pure_rules: &'a RuleSet,
        moment_subs: &'a MomentSubstitutions,
        adjoint_on_create: bool,
    ) -> Self {
        Self {
            rules,
            pure_rules,
            moment_subs,
            adjoint_on_create,
        }
    }

    /// First reduction stage: pure rules only. Safe to run on workers.
    ///
    /// # Errors
    ///
    /// Propagates non-terminating rule sets.
    pub fn reduce_pure(&self, poly: &Polynomial) -> Result<Polynomial> {
        Ok(self.pure_rules.apply(poly)?)
    }

    /// Second reduction stage: the full rule set, skipped when every rule
    /// is pure and the first stage already reached the normal form.
    ///
    /// # Errors
    ///
    /// Propagates non-terminating rule sets.
    pub fn reduce_rest(&self, poly: Polynomial) -> Result<Polynomial> {
        if self.rules.len() == self.pure_rules.len() {
            Ok(poly)
        } else {
            Ok(self.rules.apply(&poly)?)
        }
    }

    /// Both reduction stages.
    ///
    /// # Errors
    ///
    /// Propagates non-terminating rule sets.
    pub fn reduce(&self, poly: &Polynomial) -> Result<Polynomial> {
        self.reduce_rest(self.reduce_pure(poly)?)
    }

    /// Resolves a single reduced term to a variable.
    ///
    /// # Errors
    ///
    /// In [`IndexMode::Lookup`], returns
    /// [`RelaxationError::MonomialNotFound`] for unknown monomials.
    pub fn resolve(
        &self,
        index: &mut MonomialIndex,
        word: &Word,
        coeff: Complex64,
        mode: IndexMode,
    ) -> Result<ResolvedTerm> {
        let (target, coeff) = match self.substitute(word, coeff) {
            Ok(found) => return Ok(found),
            Err(pending) => pending,
        };
        if let Some(found) = self.find(index, target, coeff, mode) {
            return Ok(found);
        }
        match mode {
            IndexMode::Create => {
                let (var, _) = index.lookup_or_create(target);
                Ok(ResolvedTerm {
                    var,
                    coeff,
                    via_adjoint: false,
                })
            }
            IndexMode::Lookup => Err(RelaxationError::MonomialNotFound(format!("{target:?}"))),
        }
    }

    /// Resolves a single reduced term without touching the index.
    ///
    /// # Errors
    ///
    /// Returns [`RelaxationError::MonomialNotFound`] for unknown monomials.
    pub fn lookup(&self, index: &MonomialIndex, word: &Word, coeff: Complex64) -> Result<ResolvedTerm> {
        let (target, coeff) = match self.substitute(word, coeff) {
            Ok(found) => return Ok(found),
            Err(pending) => pending,
        };
        self.find(index, target, coeff, IndexMode::Lookup)
            .ok_or_else(|| RelaxationError::MonomialNotFound(format!("{target:?}")))
    }

    /// Applies moment substitutions. A term that lands on the constant
    /// column is final; otherwise the word still to be resolved is
    /// returned.
    fn substitute<'w>(&'w self, word: &'w Word, coeff: Complex64) -> std::result::Result<ResolvedTerm, (&'w Word, Complex64)> {
        let constant = |coeff| ResolvedTerm {
            var: CONSTANT,
            coeff,
            via_adjoint: false,
        };
        if word.is_identity() {
            return Ok(constant(coeff));
        }
        match self.moment_subs.get(word) {
            Some(MomentValue::Constant(value)) => Ok(constant(coeff * value)),
            Some(MomentValue::Scaled { ratio, word: target }) if target.is_identity() => Ok(constant(coeff * ratio)),
            Some(MomentValue::Scaled { ratio, word: target }) => Err((target, coeff * ratio)),
            None => Err((word, coeff)),
        }
    }

    fn find(&self, index: &MonomialIndex, word: &Word, coeff: Complex64, mode: IndexMode) -> Option<ResolvedTerm> {
        if let Some(var) = index.lookup(word) {
            return Some(ResolvedTerm {
                var,
                coeff,
                via_adjoint: false,
            });
        }
        let check_adjoint = match mode {
            IndexMode::Create => self.adjoint_on_create,
            IndexMode::Lookup => true,
        };
        if !check_adjoint {
            return None;
        }
        index.lookup(&word.adjoint()).map(|var| ResolvedTerm {
            var,
            coeff,
            via_adjoint: true,
        })
    }

    /// Reduces a polynomial and resolves every term.
    ///
    /// # Errors
    ///
    /// See [`Canonicalizer::reduce`] and [`Canonicalizer::resolve`].
    pub fn resolve_polynomial(
        &self,
        index: &mut MonomialIndex,
        poly: &Polynomial,
        mode: IndexMode,
    ) -> Result<Vec<ResolvedTerm>> {
        let reduced = self.reduce(poly)?;
        self.resolve_reduced(index, &reduced, mode)
    }

    /// Resolves every term of an already reduced polynomial.
    ///
    /// # Errors
    ///
    /// See [`Canonicalizer::resolve`].
    pub fn resolve_reduced(
        &self,
        index: &mut MonomialIndex,
        reduced: &Polynomial,
        mode: IndexMode,
    ) -> Result<Vec<ResolvedTerm>> {
        reduced
            .terms()
            .iter()
            .map(|(w, c)| self.resolve(index, w, *c, mode))
            .collect()
    }
}

/// Dense coefficient vector of resolved terms over `n_vars + 1` columns.
#[must_use]
pub fn dense_row(terms: &[ResolvedTerm], n_vars: usize) -> Vec<Complex64> {
    let mut row = vec![Complex64::new(0.0, 0.0); n_vars + 1];
    for t in terms {
        row[t.var] += t.coeff;
    }
    row
}
