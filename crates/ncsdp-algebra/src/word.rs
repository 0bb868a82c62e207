//! Coefficient-free operator words (noncommutative monomials).
//!
//! A [`Word`] is an ordered product of letters. Commuting letters are
//! gathered at the front in sorted order; noncommuting letters keep the
//! order they were multiplied in. The empty word is the identity.

use std::cmp::Ordering;
use std::fmt;

use smallvec::SmallVec;

use crate::symbol::{Letter, SymbolId, SymbolTable};

/// Inline capacity of a word before it spills to the heap.
const INLINE_LETTERS: usize = 6;

/// A normalized product of operator letters.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Word(SmallVec<[Letter; INLINE_LETTERS]>);

impl Word {
    /// The identity word.
    #[must_use]
    pub fn identity() -> Self {
        Self(SmallVec::new())
    }

    /// A word with a single letter.
    #[must_use]
    pub fn from_letter(letter: Letter) -> Self {
        let mut letters = SmallVec::new();
        letters.push(letter);
        Self(letters)
    }

    /// Builds a word from letters, normalizing commuting letters.
    pub fn from_letters<I: IntoIterator<Item = Letter>>(letters: I) -> Self {
        let mut word = Self(letters.into_iter().collect());
        word.normalize();
        word
    }

    /// Returns true if this is the identity word.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the noncommutative degree (number of letters).
    #[must_use]
    pub fn degree(&self) -> usize {
        self.0.len()
    }

    /// Returns the letters of the word.
    #[must_use]
    pub fn letters(&self) -> &[Letter] {
        &self.0
    }

    /// Multiplies two words (concatenation).
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        if self.is_identity() {
            return other.clone();
        }
        if other.is_identity() {
            return self.clone();
        }
        let mut letters = self.0.clone();
        letters.extend_from_slice(&other.0);
        let mut word = Self(letters);
        word.normalize();
        word
    }

    /// Returns the adjoint: letters reversed, non-Hermitian letters daggered.
    #[must_use]
    pub fn adjoint(&self) -> Self {
        let mut word = Self(self.0.iter().rev().map(|l| l.dagger()).collect());
        word.normalize();
        word
    }

    /// Returns true if the word equals its own adjoint.
    #[must_use]
    pub fn is_self_adjoint(&self) -> bool {
        *self == self.adjoint()
    }

    /// Finds the first position at which `pattern` occurs as a contiguous subword.
    #[must_use]
    pub fn find(&self, pattern: &Self) -> Option<usize> {
        let n = pattern.degree();
        if n == 0 || n > self.degree() {
            return None;
        }
        self.0.windows(n).position(|window| window == pattern.letters())
    }

    /// Splits the word around the subword `[pos, pos + len)`.
    ///
    /// Returns the prefix and suffix surrounding the removed range.
    #[must_use]
    pub fn split_around(&self, pos: usize, len: usize) -> (Self, Self) {
        let prefix = Self::from_letters(self.0[..pos].iter().copied());
        let suffix = Self::from_letters(self.0[pos + len..].iter().copied());
        (prefix, suffix)
    }

    /// Returns the distinct symbol ids occurring in the word.
    #[must_use]
    pub fn symbols(&self) -> Vec<SymbolId> {
        let mut ids: Vec<SymbolId> = self.0.iter().map(|l| l.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Formats the word using the names stored in `table`.
    #[must_use]
    pub fn display<'a>(&'a self, table: &'a SymbolTable) -> WordDisplay<'a> {
        WordDisplay { word: self, table }
    }

    /// Moves commuting letters to the front in sorted order.
    fn normalize(&mut self) {
        if !self.0.iter().any(|l| l.is_commutative()) {
            return;
        }
        let mut commuting: SmallVec<[Letter; INLINE_LETTERS]> =
            self.0.iter().copied().filter(|l| l.is_commutative()).collect();
        commuting.sort_unstable();
        commuting.extend(self.0.iter().copied().filter(|l| !l.is_commutative()));
        self.0 = commuting;
    }
}

impl PartialOrd for Word {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Graded order: degree first, then letters lexicographically.
impl Ord for Word {
    fn cmp(&self, other: &Self) -> Ordering {
        self.degree()
            .cmp(&other.degree())
            .then_with(|| self.0.as_slice().cmp(other.0.as_slice()))
    }
}

impl From<Letter> for Word {
    fn from(letter: Letter) -> Self {
        Self::from_letter(letter)
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            return f.write_str("Word(1)");
        }
        f.write_str("Word(")?;
        for (i, letter) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("*")?;
            }
            write!(f, "x{}", letter.id())?;
            if letter.is_daggered() {
                f.write_str("†")?;
            }
        }
        f.write_str(")")
    }
}

/// Display adapter returned by [`Word::display`].
pub struct WordDisplay<'a> {
    word: &'a Word,
    table: &'a SymbolTable,
}

impl fmt::Display for WordDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letters = self.word.letters();
        if letters.is_empty() {
            return f.write_str("1");
        }

        let mut i = 0;
        let mut first = true;
        while i < letters.len() {
            let mut run = 1;
            while i + run < letters.len() && letters[i + run] == letters[i] {
                run += 1;
            }
            if !first {
                f.write_str("*")?;
            }
            write!(f, "{}", letters[i].display(self.table))?;
            if run > 1 {
                write!(f, "^{run}")?;
            }
            first = false;
            i += run;
        }
        Ok(())
    }
}
