//! Mapping from canonical monomials to SDP variable ids.
//!
//! Id 0 is reserved for the constant column. Ids are handed out in
//! first-seen order, so the traversal order of the generators fixes the
//! numbering. Variables may also be created without a monomial (fresh
//! unconstrained blocks, a non-normalized top-left moment).

use rustc_hash::FxHashMap;

use ncsdp_algebra::Word;

/// Identifier of an SDP variable; 0 is the constant.
pub type VarId = usize;

/// The constant column.
pub const CONSTANT: VarId = 0;

/// Incrementally built monomial index.
#[derive(Clone, Debug, Default)]
pub struct MonomialIndex {
    ids: FxHashMap<Word, VarId>,
    /// `words[k]` belongs to variable `k + 1`.
    words: Vec<Option<Word>>,
}

impl MonomialIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of variables handed out.
    #[must_use]
    pub fn n_vars(&self) -> usize {
        self.words.len()
    }

    /// Returns the number of indexed monomials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if no monomial is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the variable of a monomial without creating one.
    #[must_use]
    pub fn lookup(&self, word: &Word) -> Option<VarId> {
        self.ids.get(word).copied()
    }

    /// Returns the variable of a monomial, creating it on first sight.
    ///
    /// The flag is true if the variable was created by this call.
    pub fn lookup_or_create(&mut self, word: &Word) -> (VarId, bool) {
        if let Some(&id) = self.ids.get(word) {
            return (id, false);
        }
        self.words.push(Some(word.clone()));
        let id = self.words.len();
        self.ids.insert(word.clone(), id);
        (id, true)
    }

    /// Creates a variable that stands for no monomial.
    pub fn fresh(&mut self) -> VarId {
        self.words.push(None);
        self.words.len()
    }

    /// Returns the monomial of a variable, if it has one.
    #[must_use]
    pub fn word(&self, id: VarId) -> Option<&Word> {
        id.checked_sub(1)
            .and_then(|k| self.words.get(k))
            .and_then(Option::as_ref)
    }

    /// Forgets every variable above `n_vars`.
    pub fn truncate(&mut self, n_vars: usize) {
        if n_vars >= self.words.len() {
            return;
        }
        for word in self.words.drain(n_vars..).flatten() {
            self.ids.remove(&word);
        }
    }

    /// Iterates over `(id, monomial)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Word)> {
        self.words
            .iter()
            .enumerate()
            .filter_map(|(k, w)| w.as_ref().map(|w| (k + 1, w)))
    }
}
