//! Sparse matrices for constraint assembly and export.
//!
//! Two layouts are provided:
//! - [`SparseRows`]: a row-list (LIL) matrix that supports additive
//!   writes, row swaps and row wipes while a relaxation is assembled
//! - [`CsrMatrix`]: compressed sparse rows for frozen data, used to
//!   transpose and export

use std::fmt::Debug;
use std::ops::{AddAssign, Mul};

use num_traits::Zero;

/// Scalar types stored in the sparse matrices.
pub trait Scalar: Copy + Debug + PartialEq + Zero + Mul<Output = Self> + AddAssign + Send + Sync {}

impl<T> Scalar for T where T: Copy + Debug + PartialEq + Zero + Mul<Output = T> + AddAssign + Send + Sync {}

/// Row-list sparse matrix.
///
/// Every row holds its non-zero entries sorted by column. Writes are
/// additive: pushing to an occupied cell accumulates, and an entry that
/// cancels to zero is removed.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseRows<T> {
    rows: Vec<Vec<(usize, T)>>,
    num_cols: usize,
}

impl<T: Scalar> SparseRows<T> {
    /// Creates an empty matrix.
    #[must_use]
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            rows: vec![Vec::new(); num_rows],
            num_cols,
        }
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Sets the number of columns, dropping entries beyond the new width.
    pub fn set_num_cols(&mut self, num_cols: usize) {
        if num_cols < self.num_cols {
            for row in &mut self.rows {
                row.retain(|&(col, _)| col < num_cols);
            }
        }
        self.num_cols = num_cols;
    }

    /// Resizes the row count; new rows are empty.
    pub fn resize_rows(&mut self, num_rows: usize) {
        self.rows.resize_with(num_rows, Vec::new);
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Adds `value` to the entry at `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is out of bounds.
    pub fn add_to(&mut self, row: usize, col: usize, value: T) {
        assert!(col < self.num_cols, "column {col} out of bounds");
        if value.is_zero() {
            return;
        }
        let entries = &mut self.rows[row];
        match entries.binary_search_by_key(&col, |&(c, _)| c) {
            Ok(pos) => {
                entries[pos].1 += value;
                if entries[pos].1.is_zero() {
                    entries.remove(pos);
                }
            }
            Err(pos) => entries.insert(pos, (col, value)),
        }
    }

    /// Overwrites the entry at `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is out of bounds.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        assert!(col < self.num_cols, "column {col} out of bounds");
        let entries = &mut self.rows[row];
        match entries.binary_search_by_key(&col, |&(c, _)| c) {
            Ok(pos) if value.is_zero() => {
                entries.remove(pos);
            }
            Ok(pos) => entries[pos].1 = value,
            Err(_) if value.is_zero() => {}
            Err(pos) => entries.insert(pos, (col, value)),
        }
    }

    /// Returns the entry at `(row, col)`, zero if absent.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> T {
        let entries = &self.rows[row];
        entries
            .binary_search_by_key(&col, |&(c, _)| c)
            .map_or_else(|_| T::zero(), |pos| entries[pos].1)
    }

    /// Returns the non-zero entries of a row, sorted by column.
    #[must_use]
    pub fn row(&self, row: usize) -> &[(usize, T)] {
        &self.rows[row]
    }

    /// Replaces a row with the given entries.
    pub fn set_row(&mut self, row: usize, mut entries: Vec<(usize, T)>) {
        entries.retain(|(_, v)| !v.is_zero());
        entries.sort_by_key(|&(c, _)| c);
        self.rows[row] = entries;
    }

    /// Adds `scale * source_row` onto `target_row`.
    pub fn add_scaled_row(&mut self, target: usize, source: usize, scale: T) {
        let source_entries = self.rows[source].clone();
        for (col, value) in source_entries {
            self.add_to(target, col, value * scale);
        }
    }

    /// Removes every entry of a row.
    pub fn clear_row(&mut self, row: usize) {
        self.rows[row].clear();
    }

    /// Removes every entry of the rows starting at `start`.
    pub fn clear_rows_from(&mut self, start: usize) {
        for row in self.rows.iter_mut().skip(start) {
            row.clear();
        }
    }

    /// Swaps two rows.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        self.rows.swap(a, b);
    }

    /// Iterates over all `(row, col, value)` triplets in row order.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, entries)| entries.iter().map(move |&(c, v)| (r, c, v)))
    }

    /// Applies `f` to every stored value, producing a new matrix.
    #[must_use]
    pub fn map<U: Scalar>(&self, f: impl Fn(T) -> U) -> SparseRows<U> {
        let mut out = SparseRows::new(self.num_rows(), self.num_cols);
        for (r, entries) in self.rows.iter().enumerate() {
            out.set_row(r, entries.iter().map(|&(c, v)| (c, f(v))).collect());
        }
        out
    }

    /// Freezes the matrix into CSR form.
    #[must_use]
    pub fn to_csr(&self) -> CsrMatrix<T> {
        let mut values = Vec::with_capacity(self.nnz());
        let mut col_indices = Vec::with_capacity(self.nnz());
        let mut row_ptrs = Vec::with_capacity(self.num_rows() + 1);
        for entries in &self.rows {
            row_ptrs.push(values.len());
            for &(c, v) in entries {
                col_indices.push(c);
                values.push(v);
            }
        }
        row_ptrs.push(values.len());
        CsrMatrix {
            values,
            col_indices,
            row_ptrs,
            num_cols: self.num_cols,
        }
    }
}

/// Sparse matrix in Compressed Sparse Row (CSR) format.
///
/// # Memory Layout
///
/// For an m×n matrix with nnz non-zero entries:
/// - `values`: Vec of nnz non-zero values
/// - `col_indices`: Vec of nnz column indices
/// - `row_ptrs`: Vec of m+1 row pointers
///
/// Row i contains entries from `row_ptrs[i]` to `row_ptrs[i+1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<T> {
    values: Vec<T>,
    col_indices: Vec<usize>,
    row_ptrs: Vec<usize>,
    num_cols: usize,
}

impl<T: Scalar> CsrMatrix<T> {
    /// Creates a new empty sparse matrix.
    #[must_use]
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            values: Vec::new(),
            col_indices: Vec::new(),
            row_ptrs: vec![0; num_rows + 1],
            num_cols,
        }
    }

    /// Creates a sparse matrix from triplets (row, col, value).
    ///
    /// Duplicate entries are summed and entries summing to zero dropped.
    #[must_use]
    pub fn from_triplets(num_rows: usize, num_cols: usize, triplets: &[(usize, usize, T)]) -> Self {
        let mut rows = SparseRows::new(num_rows, num_cols);
        for &(r, c, v) in triplets {
            rows.add_to(r, c, v);
        }
        rows.to_csr()
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.row_ptrs.len().saturating_sub(1)
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Returns the number of non-zero entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Returns an iterator over non-zero entries in a row.
    pub fn row_iter(&self, row: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        let start = self.row_ptrs[row];
        let end = self.row_ptrs[row + 1];
        self.col_indices[start..end]
            .iter()
            .zip(&self.values[start..end])
            .map(|(&col, &val)| (col, val))
    }

    /// Returns the transpose of the matrix.
    #[must_use]
    pub fn transpose(&self) -> Self {
        let triplets: Vec<_> = (0..self.num_rows())
            .flat_map(|row| self.row_iter(row).map(move |(col, val)| (col, row, val)))
            .collect();
        Self::from_triplets(self.num_cols, self.num_rows(), &triplets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    #[test]
    fn test_additive_writes() {
        let mut m: SparseRows<f64> = SparseRows::new(2, 3);
        m.add_to(0, 2, 1.5);
        m.add_to(0, 0, 2.0);
        m.add_to(0, 2, 0.5);
        assert_eq!(m.get(0, 2), 2.0);
        assert_eq!(m.row(0), &[(0, 2.0), (2, 2.0)]);

        m.add_to(0, 0, -2.0);
        assert_eq!(m.row(0), &[(2, 2.0)]);
        assert_eq!(m.nnz(), 1);
    }

    #[test]
    fn test_swap_and_clear() {
        let mut m: SparseRows<f64> = SparseRows::new(3, 2);
        m.set(0, 0, 1.0);
        m.set(1, 1, 2.0);
        m.set(2, 0, 3.0);

        m.swap_rows(0, 1);
        assert_eq!(m.get(0, 1), 2.0);
        assert_eq!(m.get(1, 0), 1.0);

        m.clear_rows_from(1);
        assert_eq!(m.nnz(), 1);
    }

    #[test]
    fn test_add_scaled_row() {
        let mut m: SparseRows<Complex64> = SparseRows::new(2, 2);
        m.set(0, 1, Complex64::new(1.0, 1.0));
        m.add_scaled_row(1, 0, Complex64::new(2.0, 0.0));
        assert_eq!(m.get(1, 1), Complex64::new(2.0, 2.0));
    }

    #[test]
    fn test_from_triplets_sums_duplicates() {
        let m = CsrMatrix::from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 2.0), (0, 0, 3.0)]);
        assert_eq!(m.row_iter(0).collect::<Vec<_>>(), vec![(0, 4.0)]);
        assert_eq!(m.nnz(), 2);
    }

    #[test]
    fn test_transpose() {
        let m = CsrMatrix::from_triplets(2, 3, &[(0, 0, 1.0), (0, 1, 2.0), (1, 1, 3.0), (1, 2, 4.0)]);
        let t = m.transpose();
        assert_eq!(t.num_rows(), 3);
        assert_eq!(t.num_cols(), 2);
        assert_eq!(t.row_iter(1).collect::<Vec<_>>(), vec![(0, 2.0), (1, 3.0)]);
        assert_eq!(t.row_iter(2).collect::<Vec<_>>(), vec![(1, 4.0)]);
    }
}
