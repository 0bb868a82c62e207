//! The sparse constraint structure `F` and its block bookkeeping.
//!
//! `F` has one row per cell of every block, flattened row-major, and one
//! column per SDP variable plus the constant column 0. Only cells with
//! `i <= j` are written; the lower triangle is implied by symmetry.
//!
//! A block of signed size `n > 0` is an `n × n` matrix block. A block of
//! size `-n` holds `n` free diagonal constraints; it still reserves `n²`
//! rows and only its diagonal cells are used.

use num_complex::Complex64;

use ncsdp_linalg::SparseRows;

use crate::index::{MonomialIndex, VarId, CONSTANT};

/// Signed block sizes with cached row offsets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockStructure {
    sizes: Vec<i64>,
    /// `offsets[b]` is the first row of block `b`; one extra trailing entry.
    offsets: Vec<usize>,
}

impl BlockStructure {
    /// Creates an empty structure.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sizes: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Creates a structure from signed sizes.
    #[must_use]
    pub fn from_sizes(sizes: &[i64]) -> Self {
        let mut blocks = Self::new();
        for &s in sizes {
            blocks.push(s);
        }
        blocks
    }

    /// Appends a block and returns its index.
    pub fn push(&mut self, size: i64) -> usize {
        let width = size.unsigned_abs() as usize;
        let last = self.total_rows();
        self.sizes.push(size);
        self.offsets.push(last + width * width);
        self.sizes.len() - 1
    }

    /// Drops every block from `len` on.
    pub fn truncate(&mut self, len: usize) {
        self.sizes.truncate(len);
        self.offsets.truncate(len + 1);
    }

    /// Returns the signed sizes.
    #[must_use]
    pub fn sizes(&self) -> &[i64] {
        &self.sizes
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Returns true if there are no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Returns the first row of a block.
    #[must_use]
    pub fn row_offset(&self, block: usize) -> usize {
        self.offsets[block]
    }

    /// Returns the side length of a block.
    #[must_use]
    pub fn width(&self, block: usize) -> usize {
        self.sizes[block].unsigned_abs() as usize
    }

    /// Returns the total number of rows.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Returns the row of cell `(i, j)` of a block.
    #[must_use]
    pub fn cell_row(&self, block: usize, i: usize, j: usize) -> usize {
        self.offsets[block] + i * self.width(block) + j
    }

    /// Maps a row back to `(block, i, j)`.
    #[must_use]
    pub fn locate(&self, row: usize) -> Option<(usize, usize, usize)> {
        if row >= self.total_rows() {
            return None;
        }
        // offsets is sorted; find the last block starting at or before row
        let block = self.offsets.partition_point(|&o| o <= row) - 1;
        let width = self.width(block);
        let local = row - self.offsets[block];
        Some((block, local / width, local % width))
    }
}

/// Owner of `F` and the block structure.
#[derive(Clone, Debug)]
pub struct ConstraintAssembler {
    blocks: BlockStructure,
    f: SparseRows<Complex64>,
}

impl Default for ConstraintAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintAssembler {
    /// Creates an empty assembler with only the constant column.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: BlockStructure::new(),
            f: SparseRows::new(0, 1),
        }
    }

    /// Returns the block structure.
    #[must_use]
    pub fn blocks(&self) -> &BlockStructure {
        &self.blocks
    }

    /// Returns `F`.
    #[must_use]
    pub fn f(&self) -> &SparseRows<Complex64> {
        &self.f
    }

    /// Replaces `F`, keeping the block structure.
    pub fn replace_f(&mut self, f: SparseRows<Complex64>) {
        debug_assert_eq!(f.num_rows(), self.blocks.total_rows());
        self.f = f;
    }

    /// Appends a block of the given signed size and returns its index.
    pub fn add_block(&mut self, size: i64) -> usize {
        let block = self.blocks.push(size);
        self.f.resize_rows(self.blocks.total_rows());
        block
    }

    /// Removes every block from `block` on, with their rows.
    pub fn truncate_blocks(&mut self, block: usize) {
        self.blocks.truncate(block);
        self.f.resize_rows(self.blocks.total_rows());
    }

    /// Sets the number of variable columns; entries beyond are dropped.
    pub fn set_n_vars(&mut self, n_vars: usize) {
        self.f.set_num_cols(n_vars + 1);
    }

    /// Adds `coeff` to variable `var` at `row`.
    pub fn push(&mut self, row: usize, var: VarId, coeff: Complex64) {
        if var >= self.f.num_cols() {
            self.f.set_num_cols(var + 1);
        }
        self.f.add_to(row, var, coeff);
    }

    /// Adds `value` to the constant column at `row`.
    pub fn push_constant(&mut self, row: usize, value: Complex64) {
        self.push(row, CONSTANT, value);
    }

    /// Adds `scale` times row `source` onto row `target`.
    pub fn add_scaled_row(&mut self, target: usize, source: usize, scale: Complex64) {
        self.f.add_scaled_row(target, source, scale);
    }

    /// Copies block `src` verbatim into block `dst`, which must have the
    /// same width. Variable ids are kept.
    pub fn copy_block(&mut self, src: usize, dst: usize) {
        let width = self.blocks.width(src);
        debug_assert_eq!(width, self.blocks.width(dst));
        let (from, to) = (self.blocks.row_offset(src), self.blocks.row_offset(dst));
        for k in 0..width * width {
            let entries = self.f.row(from + k).to_vec();
            self.f.set_row(to + k, entries);
        }
    }

    /// Gives every upper-triangle cell of a block its own new variable.
    pub fn fresh_block(&mut self, block: usize, index: &mut MonomialIndex) {
        let width = self.blocks.width(block);
        let one = Complex64::new(1.0, 0.0);
        for i in 0..width {
            for j in i..width {
                let var = index.fresh();
                let row = self.blocks.cell_row(block, i, j);
                self.push(row, var, one);
            }
        }
    }

    /// Applies the partial transpose on the second tensor factor of a
    /// block whose rows are indexed by `(rowA, rowB)` pairs.
    ///
    /// Within every upper cell `(rowA, columnA)` of the first factor, the
    /// entries `(rowB, columnB)` with `columnB < rowB` trade places with
    /// their transposes `(columnB, rowB)`.
    pub fn impose_ppt(&mut self, block: usize, len_a: usize, len_b: usize) {
        let offset = self.blocks.row_offset(block);
        let n = len_a * len_b;
        debug_assert_eq!(n, self.blocks.width(block));
        for row_a in 0..len_a {
            for col_a in row_a..len_a {
                for row_b in 0..len_b {
                    let start = if row_a == col_a { row_b } else { 0 };
                    for col_b in start..row_b {
                        let here = offset + (row_a * len_b + row_b) * n + col_a * len_b + col_b;
                        let there = offset + (row_a * len_b + col_b) * n + col_a * len_b + row_b;
                        self.f.swap_rows(here, there);
                    }
                }
            }
        }
    }
}
