//! Localizing matrices of polynomial constraints.
//!
//! For a constraint `g` and monomials `m`, cell `(r, c)` of the block is
//! the moment of `m[r]† · g · m[c]`. The monomials are the words of the
//! constraint's variable group up to the localization order
//! `floor((2·level - deg g) / 2)`.

use tracing::trace;

use ncsdp_algebra::{pick_up_to_degree, Polynomial, Word};
use ncsdp_linalg::{try_map_ordered, ParallelConfig};

use crate::assembler::ConstraintAssembler;
use crate::canonical::{Canonicalizer, IndexMode};
use crate::error::Result;
use crate::index::MonomialIndex;

/// Localization order of a constraint of degree `degree` at `level`.
///
/// A level of `-1` marks explicitly given monomial sets; the order is 0.
/// The result is negative when the constraint's degree exceeds twice the
/// level.
#[must_use]
pub fn localization_order(level: i32, degree: usize) -> i64 {
    if level < 0 {
        return 0;
    }
    let slack = 2 * i64::from(level) - i64::try_from(degree).unwrap_or(i64::MAX);
    slack.div_euclid(2)
}

/// Monomials of the localizing matrix for a given order.
///
/// Falls back to `{1}` when the order is negative or nothing qualifies.
#[must_use]
pub fn localizing_monomials(basis: &[Word], order: i64) -> Vec<Word> {
    let picked = usize::try_from(order)
        .map(|d| pick_up_to_degree(basis, d))
        .unwrap_or_default();
    if picked.is_empty() {
        vec![Word::identity()]
    } else {
        picked
    }
}

/// Builder of localizing blocks.
pub struct LocalizingGenerator<'a> {
    /// Reduction and resolution of products.
    pub canon: Canonicalizer<'a>,
    /// Worker pool settings.
    pub parallel: &'a ParallelConfig,
}

impl LocalizingGenerator<'_> {
    /// Fills `block` with the localizing matrix of `g` over `monomials`.
    ///
    /// # Errors
    ///
    /// Propagates substitution failures.
    pub fn generate(
        &self,
        asm: &mut ConstraintAssembler,
        index: &mut MonomialIndex,
        block: usize,
        monomials: &[Word],
        g: &Polynomial,
    ) -> Result<()> {
        let n = monomials.len();
        let pairs: Vec<(usize, usize)> = (0..n).flat_map(|r| (r..n).map(move |c| (r, c))).collect();
        let entry = |&(r, c): &(usize, usize)| g.sandwich(&monomials[r].adjoint(), &monomials[c]);

        let partial = try_map_ordered(&pairs, self.parallel, |pair| self.canon.reduce_pure(&entry(pair)))?;
        for (&(r, c), poly) in pairs.iter().zip(partial) {
            let reduced = self.canon.reduce_rest(poly)?;
            let row = asm.blocks().cell_row(block, r, c);
            for (word, coeff) in reduced.terms() {
                let term = self.canon.resolve(index, word, *coeff, IndexMode::Create)?;
                asm.push(row, term.var, term.coeff);
            }
        }
        trace!(block, size = n, "localizing block generated");
        Ok(())
    }
}
