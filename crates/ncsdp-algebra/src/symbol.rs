//! Operator symbols and the letters words are spelled with.
//!
//! Every operator is interned once in a [`SymbolTable`], which hands out
//! a [`Letter`]: a 32-bit symbol id together with the flags the algebra
//! needs (hermiticity, commutativity, and whether this occurrence is
//! daggered). Letters are `Copy` and carry everything required to
//! multiply and adjoint words without consulting the table again.

use std::fmt;

use hashbrown::HashMap;

/// Unique identifier for an operator symbol.
pub type SymbolId = u32;

/// A single operator occurrence inside a word.
///
/// Ordering is by symbol id first, then by dagger, so that the
/// undaggered form of a symbol sorts before its adjoint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Letter {
    id: SymbolId,
    dagger: bool,
    hermitian: bool,
    commutative: bool,
}

impl Letter {
    /// Returns the symbol id.
    #[must_use]
    pub const fn id(self) -> SymbolId {
        self.id
    }

    /// Returns true if this occurrence is the adjoint of the symbol.
    #[must_use]
    pub const fn is_daggered(self) -> bool {
        self.dagger
    }

    /// Returns true if the symbol is self-adjoint.
    #[must_use]
    pub const fn is_hermitian(self) -> bool {
        self.hermitian
    }

    /// Returns true if the symbol commutes with every other symbol.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        self.commutative
    }

    /// Returns the adjoint of this letter.
    ///
    /// Hermitian letters are their own adjoint.
    #[must_use]
    pub const fn dagger(self) -> Self {
        if self.hermitian {
            self
        } else {
            Self {
                dagger: !self.dagger,
                ..self
            }
        }
    }

    /// Returns the undaggered form of this letter.
    #[must_use]
    pub const fn base(self) -> Self {
        Self {
            dagger: false,
            ..self
        }
    }

    /// Formats the letter using the names stored in `table`.
    #[must_use]
    pub fn display(self, table: &SymbolTable) -> LetterDisplay<'_> {
        LetterDisplay {
            letter: self,
            table,
        }
    }
}

/// Metadata of an interned operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorInfo {
    /// Human-readable name.
    pub name: String,
    /// Whether the operator is self-adjoint.
    pub hermitian: bool,
    /// Whether the operator commutes with all others.
    pub commutative: bool,
}

/// Interning table for operator symbols.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    /// Maps symbol names to their IDs.
    symbols: HashMap<String, SymbolId>,
    /// Operator metadata indexed by ID.
    operators: Vec<OperatorInfo>,
}

impl SymbolTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a noncommuting Hermitian operator.
    pub fn hermitian(&mut self, name: &str) -> Letter {
        self.declare(name, true, false)
    }

    /// Declares a noncommuting, non-Hermitian operator.
    pub fn operator(&mut self, name: &str) -> Letter {
        self.declare(name, false, false)
    }

    /// Declares a commuting Hermitian variable (a real scalar unknown).
    pub fn commuting(&mut self, name: &str) -> Letter {
        self.declare(name, true, true)
    }

    /// Declares an operator with explicit flags.
    ///
    /// Declaring an existing name returns the letter of the first
    /// declaration; the flags passed here are ignored in that case.
    pub fn declare(&mut self, name: &str, hermitian: bool, commutative: bool) -> Letter {
        if let Some(&id) = self.symbols.get(name) {
            let info = &self.operators[id as usize];
            return Letter {
                id,
                dagger: false,
                hermitian: info.hermitian,
                commutative: info.commutative,
            };
        }

        let id = self.operators.len() as SymbolId;
        self.symbols.insert(name.to_string(), id);
        self.operators.push(OperatorInfo {
            name: name.to_string(),
            hermitian,
            commutative,
        });
        Letter {
            id,
            dagger: false,
            hermitian,
            commutative,
        }
    }

    /// Looks up a previously declared symbol by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Letter> {
        self.symbols.get(name).and_then(|&id| self.letter(id))
    }

    /// Returns the undaggered letter of a symbol id.
    #[must_use]
    pub fn letter(&self, id: SymbolId) -> Option<Letter> {
        self.operators.get(id as usize).map(|info| Letter {
            id,
            dagger: false,
            hermitian: info.hermitian,
            commutative: info.commutative,
        })
    }

    /// Gets the metadata of a symbol.
    #[must_use]
    pub fn info(&self, id: SymbolId) -> Option<&OperatorInfo> {
        self.operators.get(id as usize)
    }

    /// Gets the name of a symbol by its ID.
    #[must_use]
    pub fn name(&self, id: SymbolId) -> Option<&str> {
        self.operators.get(id as usize).map(|info| info.name.as_str())
    }

    /// Returns the number of declared symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    /// Returns true if no symbols were declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Display adapter returned by [`Letter::display`].
pub struct LetterDisplay<'a> {
    letter: Letter,
    table: &'a SymbolTable,
}

impl fmt::Display for LetterDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.table.name(self.letter.id) {
            Some(name) => f.write_str(name)?,
            None => write!(f, "x{}", self.letter.id)?,
        }
        if self.letter.dagger {
            f.write_str("†")?;
        }
        Ok(())
    }
}
