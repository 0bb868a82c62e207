//! Moment matrix generation.
//!
//! A moment block is indexed by pairs from two ordered bases `A` and `B`
//! (`B = {1}` for an ordinary block). Row `(rowA, rowB)` and column
//! `(columnA, columnB)` hold the moment of
//! `rowA† · columnA · rowB† · columnB`, or of the partially transposed
//! `rowA† · columnA · columnB† · rowB` when PPT is requested and
//! `columnB < rowB`.
//!
//! Cells are visited in a fixed order: `rowA`, then `columnA >= rowA`,
//! then `rowB`, then `columnB` (from `rowB` on when `rowA == columnA`).
//! This order decides the variable numbering. In parallel mode workers
//! compute the products of whole `(rowA, columnA, rowB)` triples and the
//! coordinator replays them in the same order.

use num_complex::Complex64;
use tracing::debug;

use ncsdp_algebra::{Polynomial, Word};
use ncsdp_linalg::{try_map_ordered, ParallelConfig};

use crate::assembler::ConstraintAssembler;
use crate::canonical::{Canonicalizer, IndexMode};
use crate::error::{RelaxationError, Result};
use crate::index::MonomialIndex;

/// Row/column basis of a moment block.
#[derive(Clone, Debug, PartialEq)]
pub struct MomentBasis {
    a: Vec<Word>,
    b: Vec<Word>,
    product: bool,
}

impl MomentBasis {
    /// A block over a single basis.
    #[must_use]
    pub fn single(a: Vec<Word>) -> Self {
        Self {
            a,
            b: vec![Word::identity()],
            product: false,
        }
    }

    /// A block over the product of two bases of equal length.
    ///
    /// # Errors
    ///
    /// Returns [`RelaxationError::UnequalProductBasis`] if the lengths differ.
    pub fn product(a: Vec<Word>, b: Vec<Word>) -> Result<Self> {
        if a.len() != b.len() {
            return Err(RelaxationError::UnequalProductBasis {
                left: a.len(),
                right: b.len(),
            });
        }
        Ok(Self { a, b, product: true })
    }

    /// Returns the first basis.
    #[must_use]
    pub fn a(&self) -> &[Word] {
        &self.a
    }

    /// Returns the second basis (`{1}` for a single basis).
    #[must_use]
    pub fn b(&self) -> &[Word] {
        &self.b
    }

    /// Returns true for a product basis.
    #[must_use]
    pub fn is_product(&self) -> bool {
        self.product
    }

    /// Side length of the block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.a.len() * self.b.len()
    }

    /// Returns true if the block is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of upper-triangle cells.
    #[must_use]
    pub fn n_cells(&self) -> usize {
        let n = self.len();
        n * (n + 1) / 2
    }

    /// The raw product held by a cell.
    #[must_use]
    pub fn entry_word(&self, cell: MomentCell, ppt: bool) -> Word {
        let MomentCell {
            row_a,
            col_a,
            row_b,
            col_b,
        } = cell;
        let head = self.a[row_a].adjoint().mul(&self.a[col_a]);
        let tail = if ppt && col_b < row_b {
            self.b[col_b].adjoint().mul(&self.b[row_b])
        } else {
            self.b[row_b].adjoint().mul(&self.b[col_b])
        };
        head.mul(&tail)
    }
}

/// A cell of a moment block in tensor coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MomentCell {
    /// Row in the first basis.
    pub row_a: usize,
    /// Column in the first basis.
    pub col_a: usize,
    /// Row in the second basis.
    pub row_b: usize,
    /// Column in the second basis.
    pub col_b: usize,
}

impl MomentCell {
    /// Flattened `(i, j)` position inside a block with second basis of
    /// length `len_b`.
    #[must_use]
    pub fn position(&self, len_b: usize) -> (usize, usize) {
        (self.row_a * len_b + self.row_b, self.col_a * len_b + self.col_b)
    }

    fn is_top_left(&self) -> bool {
        self.row_a == 0 && self.col_a == 0 && self.row_b == 0 && self.col_b == 0
    }
}

/// Upper-triangle triples `(rowA, columnA, rowB)` in traversal order.
fn triples(basis: &MomentBasis) -> Vec<(usize, usize, usize)> {
    let (len_a, len_b) = (basis.a.len(), basis.b.len());
    let mut out = Vec::with_capacity(len_a * (len_a + 1) / 2 * len_b);
    for row_a in 0..len_a {
        for col_a in row_a..len_a {
            for row_b in 0..len_b {
                out.push((row_a, col_a, row_b));
            }
        }
    }
    out
}

fn triple_cells(basis: &MomentBasis, (row_a, col_a, row_b): (usize, usize, usize)) -> impl Iterator<Item = MomentCell> {
    let start = if row_a == col_a { row_b } else { 0 };
    (start..basis.b.len()).map(move |col_b| MomentCell {
        row_a,
        col_a,
        row_b,
        col_b,
    })
}

/// Every cell of the block in traversal order.
#[must_use]
pub fn cells(basis: &MomentBasis) -> Vec<MomentCell> {
    triples(basis)
        .into_iter()
        .flat_map(|t| triple_cells(basis, t))
        .collect()
}

/// Shared state of a moment-block build.
pub struct MomentGenerator<'a> {
    /// Reduction and resolution of products.
    pub canon: Canonicalizer<'a>,
    /// Fix the top-left moment to 1.
    pub normalized: bool,
    /// Worker pool settings.
    pub parallel: &'a ParallelConfig,
}

impl MomentGenerator<'_> {
    /// Fills `block` with the moment matrix of `basis`.
    ///
    /// # Errors
    ///
    /// Propagates substitution failures.
    pub fn generate(
        &self,
        asm: &mut ConstraintAssembler,
        index: &mut MonomialIndex,
        block: usize,
        basis: &MomentBasis,
        ppt: bool,
    ) -> Result<()> {
        let work = triples(basis);
        if self.parallel.should_parallelize(work.len()) {
            debug!(block, triples = work.len(), "computing moment products in parallel");
            let computed = try_map_ordered(&work, self.parallel, |&t| {
                triple_cells(basis, t)
                    .map(|cell| {
                        let raw = Polynomial::from(basis.entry_word(cell, ppt));
                        Ok((cell, self.canon.reduce_pure(&raw)?))
                    })
                    .collect::<Result<Vec<_>>>()
            })?;
            for (cell, partial) in computed.into_iter().flatten() {
                let reduced = self.canon.reduce_rest(partial)?;
                self.push_cell(asm, index, block, basis, cell, &reduced)?;
            }
        } else {
            for t in work {
                for cell in triple_cells(basis, t) {
                    let raw = Polynomial::from(basis.entry_word(cell, ppt));
                    let reduced = self.canon.reduce(&raw)?;
                    self.push_cell(asm, index, block, basis, cell, &reduced)?;
                }
            }
        }
        debug!(block, n_vars = index.n_vars(), "moment block generated");
        Ok(())
    }

    fn push_cell(
        &self,
        asm: &mut ConstraintAssembler,
        index: &mut MonomialIndex,
        block: usize,
        basis: &MomentBasis,
        cell: MomentCell,
        reduced: &Polynomial,
    ) -> Result<()> {
        let (i, j) = cell.position(basis.b.len());
        let row = asm.blocks().cell_row(block, i, j);
        let one = Complex64::new(1.0, 0.0);

        for (word, coeff) in reduced.terms() {
            if word.is_identity() {
                if cell.is_top_left() && *coeff == one && !self.normalized {
                    let var = index.fresh();
                    asm.push(row, var, one);
                } else {
                    asm.push_constant(row, *coeff);
                }
                continue;
            }
            let term = self.canon.resolve(index, word, *coeff, IndexMode::Create)?;
            asm.push(row, term.var, term.coeff);
        }
        Ok(())
    }
}
