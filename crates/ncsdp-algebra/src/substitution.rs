//! Substitution rules and their fixpoint application.
//!
//! A rule rewrites every occurrence of a pattern word into a replacement
//! polynomial. A rule is *pure* if the replacement has at most one term:
//! pure rules map monomials to monomials and can be applied by workers
//! without touching any shared state.
//!
//! Rules are applied to a fixpoint with a worklist. Every single rewrite
//! counts against a global budget, so a rule set that never reaches a
//! normal form (such as `X -> Y`, `Y -> X`) fails with
//! [`AlgebraError::NonTerminatingSubstitution`] instead of spinning.

use num_complex::Complex64;

use crate::error::AlgebraError;
use crate::poly::Polynomial;
use crate::word::Word;

/// Default rewrite budget of a [`RuleSet`].
pub const DEFAULT_MAX_REWRITES: usize = 100_000;

/// A single rewrite rule `pattern -> replacement`.
#[derive(Clone, Debug, PartialEq)]
pub struct SubstitutionRule {
    pattern: Word,
    replacement: Polynomial,
}

impl SubstitutionRule {
    /// Creates a rule.
    ///
    /// # Errors
    ///
    /// Returns [`AlgebraError::EmptyPattern`] if `pattern` is the identity.
    pub fn new(pattern: Word, replacement: Polynomial) -> Result<Self, AlgebraError> {
        if pattern.is_identity() {
            return Err(AlgebraError::EmptyPattern);
        }
        Ok(Self {
            pattern,
            replacement,
        })
    }

    /// Returns the pattern word.
    #[must_use]
    pub fn pattern(&self) -> &Word {
        &self.pattern
    }

    /// Returns the replacement polynomial.
    #[must_use]
    pub fn replacement(&self) -> &Polynomial {
        &self.replacement
    }

    /// Returns true if the replacement is zero or a single term.
    #[must_use]
    pub fn is_pure(&self) -> bool {
        self.replacement.len() <= 1
    }

    /// Returns true if the replacement carries imaginary coefficients.
    #[must_use]
    pub fn is_complex(&self) -> bool {
        self.replacement.is_complex()
    }

    /// Rewrites the first occurrence of the pattern in `word`.
    ///
    /// Returns `None` if the pattern does not occur.
    #[must_use]
    pub fn apply_once(&self, word: &Word) -> Option<Polynomial> {
        let pos = word.find(&self.pattern)?;
        let (prefix, suffix) = word.split_around(pos, self.pattern.degree());
        Some(self.replacement.sandwich(&prefix, &suffix))
    }
}

/// An ordered collection of substitution rules.
///
/// Earlier rules take precedence when several patterns match a word.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSet {
    rules: Vec<SubstitutionRule>,
    max_rewrites: usize,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            max_rewrites: DEFAULT_MAX_REWRITES,
        }
    }
}

impl RuleSet {
    /// Creates an empty rule set with the default rewrite budget.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rewrite budget.
    #[must_use]
    pub fn with_max_rewrites(mut self, max_rewrites: usize) -> Self {
        self.max_rewrites = max_rewrites;
        self
    }

    /// Returns the rewrite budget.
    #[must_use]
    pub fn max_rewrites(&self) -> usize {
        self.max_rewrites
    }

    /// Appends a rule.
    pub fn push(&mut self, rule: SubstitutionRule) {
        self.rules.push(rule);
    }

    /// Returns the rules in precedence order.
    #[must_use]
    pub fn rules(&self) -> &[SubstitutionRule] {
        &self.rules
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns true if every rule is pure.
    #[must_use]
    pub fn is_pure(&self) -> bool {
        self.rules.iter().all(SubstitutionRule::is_pure)
    }

    /// Returns true if any rule carries imaginary coefficients.
    #[must_use]
    pub fn is_complex(&self) -> bool {
        self.rules.iter().any(SubstitutionRule::is_complex)
    }

    /// Returns the subset of pure rules, keeping their order and budget.
    #[must_use]
    pub fn pure_subset(&self) -> Self {
        Self {
            rules: self.rules.iter().filter(|r| r.is_pure()).cloned().collect(),
            max_rewrites: self.max_rewrites,
        }
    }

    /// Rewrites a polynomial to its normal form.
    ///
    /// # Errors
    ///
    /// Returns [`AlgebraError::NonTerminatingSubstitution`] if more than
    /// `max_rewrites` single rewrites are needed.
    pub fn apply(&self, poly: &Polynomial) -> Result<Polynomial, AlgebraError> {
        if self.rules.is_empty() {
            return Ok(poly.clone());
        }

        let mut pending: Vec<(Word, Complex64)> = poly.terms().to_vec();
        let mut done: Vec<(Word, Complex64)> = Vec::with_capacity(pending.len());
        let mut rewrites = 0usize;

        while let Some((word, coeff)) = pending.pop() {
            let rewritten = self.rules.iter().find_map(|rule| rule.apply_once(&word));
            match rewritten {
                None => done.push((word, coeff)),
                Some(replacement) => {
                    rewrites += 1;
                    if rewrites > self.max_rewrites {
                        return Err(AlgebraError::NonTerminatingSubstitution {
                            limit: self.max_rewrites,
                        });
                    }
                    pending.extend(
                        replacement
                            .into_terms()
                            .into_iter()
                            .map(|(w, c)| (w, c * coeff)),
                    );
                }
            }
        }

        Ok(Polynomial::from_terms(done))
    }

    /// Rewrites a single word to its normal form.
    ///
    /// # Errors
    ///
    /// See [`RuleSet::apply`].
    pub fn reduce_word(&self, word: &Word) -> Result<Polynomial, AlgebraError> {
        self.apply(&Polynomial::from(word.clone()))
    }
}

impl FromIterator<SubstitutionRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = SubstitutionRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
            max_rewrites: DEFAULT_MAX_REWRITES,
        }
    }
}
