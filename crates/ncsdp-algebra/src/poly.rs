//! Noncommutative polynomials with complex coefficients.
//!
//! Terms are stored as (word, coefficient) pairs sorted by the graded
//! word order, with like terms combined and zero coefficients removed.
//! The constant term, if any, is therefore always first.

use std::fmt;

use num_complex::Complex64;
use num_traits::{One, Zero};

use crate::symbol::{SymbolId, SymbolTable};
use crate::word::Word;

/// A noncommutative polynomial.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Polynomial {
    /// Terms in ascending graded order.
    terms: Vec<(Word, Complex64)>,
}

impl Polynomial {
    /// Creates a polynomial from terms, combining like terms.
    pub fn from_terms<I: IntoIterator<Item = (Word, Complex64)>>(terms: I) -> Self {
        let mut poly = Self {
            terms: terms.into_iter().collect(),
        };
        poly.normalize();
        poly
    }

    /// The zero polynomial.
    #[must_use]
    pub fn zero() -> Self {
        Self { terms: Vec::new() }
    }

    /// The constant polynomial 1.
    #[must_use]
    pub fn one() -> Self {
        Self::constant(Complex64::one())
    }

    /// A constant polynomial.
    pub fn constant(c: impl Into<Complex64>) -> Self {
        Self::monomial(Word::identity(), c)
    }

    /// A single term `c * word`.
    pub fn monomial(word: Word, c: impl Into<Complex64>) -> Self {
        let c = c.into();
        if c.is_zero() {
            Self::zero()
        } else {
            Self {
                terms: vec![(word, c)],
            }
        }
    }

    /// Returns the terms.
    #[must_use]
    pub fn terms(&self) -> &[(Word, Complex64)] {
        &self.terms
    }

    /// Consumes the polynomial, returning its terms.
    #[must_use]
    pub fn into_terms(self) -> Vec<(Word, Complex64)> {
        self.terms
    }

    /// Returns the number of terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Returns true if there are no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns true if this is the zero polynomial.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns true if the polynomial has no non-identity words.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.terms.iter().all(|(w, _)| w.is_identity())
    }

    /// Returns the coefficient of the identity word.
    #[must_use]
    pub fn constant_term(&self) -> Complex64 {
        match self.terms.first() {
            Some((w, c)) if w.is_identity() => *c,
            _ => Complex64::zero(),
        }
    }

    /// Returns the single term if the polynomial is a monomial.
    #[must_use]
    pub fn as_monomial(&self) -> Option<(&Word, Complex64)> {
        match self.terms.as_slice() {
            [(w, c)] => Some((w, *c)),
            _ => None,
        }
    }

    /// Noncommutative degree: the longest word with a non-zero coefficient.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.terms.iter().map(|(w, _)| w.degree()).max().unwrap_or(0)
    }

    /// Returns true if any coefficient has a non-zero imaginary part.
    #[must_use]
    pub fn is_complex(&self) -> bool {
        self.terms.iter().any(|(_, c)| c.im != 0.0)
    }

    /// Returns the distinct symbols the polynomial depends on.
    #[must_use]
    pub fn symbols(&self) -> Vec<SymbolId> {
        let mut ids: Vec<SymbolId> = self.terms.iter().flat_map(|(w, _)| w.symbols()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Adds two polynomials.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        Self::from_terms(self.terms.iter().chain(&other.terms).cloned())
    }

    /// Subtracts two polynomials.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    /// Negates the polynomial.
    #[must_use]
    pub fn neg(&self) -> Self {
        Self {
            terms: self.terms.iter().map(|(w, c)| (w.clone(), -c)).collect(),
        }
    }

    /// Multiplies every coefficient by a scalar.
    #[must_use]
    pub fn scale(&self, scalar: Complex64) -> Self {
        if scalar.is_zero() {
            return Self::zero();
        }
        Self {
            terms: self
                .terms
                .iter()
                .map(|(w, c)| (w.clone(), c * scalar))
                .collect(),
        }
    }

    /// Multiplies two polynomials, keeping the order of the factors.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        let mut terms = Vec::with_capacity(self.len() * other.len());
        for (wa, ca) in &self.terms {
            for (wb, cb) in &other.terms {
                terms.push((wa.mul(wb), ca * cb));
            }
        }
        Self::from_terms(terms)
    }

    /// Left- and right-multiplies by words: `left * self * right`.
    #[must_use]
    pub fn sandwich(&self, left: &Word, right: &Word) -> Self {
        Self::from_terms(
            self.terms
                .iter()
                .map(|(w, c)| (left.mul(w).mul(right), *c)),
        )
    }

    /// Returns the adjoint polynomial.
    #[must_use]
    pub fn adjoint(&self) -> Self {
        Self::from_terms(self.terms.iter().map(|(w, c)| (w.adjoint(), c.conj())))
    }

    /// Adds a single term in place.
    pub fn add_term(&mut self, word: Word, coeff: Complex64) {
        match self.terms.binary_search_by(|(w, _)| w.cmp(&word)) {
            Ok(pos) => {
                self.terms[pos].1 += coeff;
                if self.terms[pos].1.is_zero() {
                    self.terms.remove(pos);
                }
            }
            Err(pos) => {
                if !coeff.is_zero() {
                    self.terms.insert(pos, (word, coeff));
                }
            }
        }
    }

    /// Formats the polynomial using the names stored in `table`.
    #[must_use]
    pub fn display<'a>(&'a self, table: &'a SymbolTable) -> PolynomialDisplay<'a> {
        PolynomialDisplay { poly: self, table }
    }

    /// Sorts terms and combines like terms.
    fn normalize(&mut self) {
        self.terms.sort_by(|a, b| a.0.cmp(&b.0));

        let mut merged: Vec<(Word, Complex64)> = Vec::with_capacity(self.terms.len());
        for (w, c) in self.terms.drain(..) {
            match merged.last_mut() {
                Some((last, acc)) if *last == w => *acc += c,
                _ => merged.push((w, c)),
            }
        }
        merged.retain(|(_, c)| !c.is_zero());
        self.terms = merged;
    }
}

impl From<Word> for Polynomial {
    fn from(word: Word) -> Self {
        Self::monomial(word, Complex64::one())
    }
}

/// Display adapter returned by [`Polynomial::display`].
pub struct PolynomialDisplay<'a> {
    poly: &'a Polynomial,
    table: &'a SymbolTable,
}

fn fmt_coeff(c: Complex64) -> String {
    if c.im == 0.0 {
        format!("{}", c.re)
    } else if c.re == 0.0 {
        format!("{}i", c.im)
    } else {
        format!("({}{:+}i)", c.re, c.im)
    }
}

impl fmt::Display for PolynomialDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.poly.is_zero() {
            return f.write_str("0");
        }
        for (i, (w, c)) in self.poly.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            if w.is_identity() {
                f.write_str(&fmt_coeff(*c))?;
            } else if *c == Complex64::one() {
                write!(f, "{}", w.display(self.table))?;
            } else {
                write!(f, "{}*{}", fmt_coeff(*c), w.display(self.table))?;
            }
        }
        Ok(())
    }
}
