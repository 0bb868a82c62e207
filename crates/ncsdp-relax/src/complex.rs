//! Embedding of complex Hermitian blocks into real symmetric ones.
//!
//! A Hermitian `n × n` block `A + iB` is positive semidefinite exactly when
//! the real `2n × 2n` block `[[A, -B], [B, A]]` is. Only the upper triangle
//! is stored, so a complex entry `a + ib` at `(i, j)` becomes `a` at
//! `(i, j)` and `(i + n, j + n)`, `b` at `(i, j + n)` and `-b` at
//! `(j, i + n)`.

use num_complex::Complex64;

use ncsdp_linalg::SparseRows;

use crate::assembler::BlockStructure;

/// Returns true if any entry of `F` has an imaginary part.
#[must_use]
pub fn has_imaginary(f: &SparseRows<Complex64>) -> bool {
    f.triplets().any(|(_, _, v)| v.im != 0.0)
}

/// Lifts a complex `F` to a real one with doubled blocks.
///
/// With `lift == false` the structure is kept and only real parts are
/// returned, which is exact for real relaxations.
#[must_use]
pub fn lift(blocks: &BlockStructure, f: &SparseRows<Complex64>, lift: bool) -> (BlockStructure, SparseRows<f64>) {
    if !lift {
        return (blocks.clone(), f.map(|v| v.re));
    }

    let doubled: Vec<i64> = blocks.sizes().iter().map(|s| 2 * s).collect();
    let lifted = BlockStructure::from_sizes(&doubled);
    let mut out = SparseRows::new(lifted.total_rows(), f.num_cols());

    for (row, col, value) in f.triplets() {
        let Some((b, i, j)) = blocks.locate(row) else {
            continue;
        };
        let n = blocks.width(b);
        if value.re != 0.0 {
            out.add_to(lifted.cell_row(b, i, j), col, value.re);
            out.add_to(lifted.cell_row(b, i + n, j + n), col, value.re);
        }
        if value.im != 0.0 {
            out.add_to(lifted.cell_row(b, i, j + n), col, value.im);
            out.add_to(lifted.cell_row(b, j, i + n), col, -value.im);
        }
    }
    (lifted, out)
}
