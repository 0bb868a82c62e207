//! Post-processing of solved relaxations.
//!
//! Both routines work on the block matrices a solver returns:
//! - numerical ranks of leading submatrices of the primal moment matrix,
//!   one per degree, to detect a rank loop
//! - a sum-of-squares certificate read off the eigen-decomposition of
//!   each dual block

use nalgebra::{DMatrix, SymmetricEigen};
use num_complex::Complex64;

use ncsdp_algebra::{pick_up_to_degree, Polynomial, Word};

use crate::error::{RelaxationError, Result};

/// Eigenvalues of a dual block below this are treated as a failure
/// rather than rounding noise.
pub const NEGATIVE_EIGENVALUE_TOLERANCE: f64 = -1e-3;

/// Numerical rank, counting singular values above
/// `σ_max · max(rows, cols) · ε`.
#[must_use]
pub fn matrix_rank(m: &DMatrix<f64>) -> usize {
    if m.is_empty() {
        return 0;
    }
    let svd = m.clone().svd(false, false);
    let largest = svd.singular_values.max();
    let tolerance = largest * m.nrows().max(m.ncols()) as f64 * f64::EPSILON;
    svd.singular_values.iter().filter(|&&s| s > tolerance).count()
}

/// Ranks of the leading submatrices of a moment matrix over `basis`.
///
/// With `base_level` 0 there is one rank per degree from 1 to `level`;
/// otherwise only the submatrix up to `base_level` is checked. The rank
/// of the whole matrix is appended when the last submatrix is smaller.
#[must_use]
pub fn solution_ranks(x: &DMatrix<f64>, basis: &[Word], level: i32, base_level: usize) -> Vec<usize> {
    let degrees: Vec<usize> = if base_level == 0 {
        (1..=usize::try_from(level).unwrap_or(0)).collect()
    } else {
        vec![base_level]
    };
    let n = x.nrows().min(x.ncols());
    let mut ranks = Vec::with_capacity(degrees.len() + 1);
    let mut last = 0;
    for d in degrees {
        last = pick_up_to_degree(basis, d).len().min(n);
        ranks.push(matrix_rank(&x.view((0, 0), (last, last)).into_owned()));
    }
    if ranks.is_empty() || last < n {
        ranks.push(matrix_rank(x));
    }
    ranks
}

/// The polynomial `Σ λ (Σ v_i m_i)† (Σ v_i m_i)` over the eigenpairs of
/// a dual block, with the basis words `m_i` indexing its rows.
///
/// Eigenvalues and eigenvector entries at or below `threshold` in
/// magnitude are dropped.
///
/// # Errors
///
/// [`RelaxationError::NegativeEigenvalue`] if the block is not positive
/// semidefinite.
pub fn sos_polynomial(y: &DMatrix<f64>, basis: &[Word], threshold: f64, block: usize) -> Result<Polynomial> {
    let eigen = SymmetricEigen::new(y.clone());
    let mut sigma = Polynomial::zero();
    for (k, &value) in eigen.eigenvalues.iter().enumerate() {
        if value < NEGATIVE_EIGENVALUE_TOLERANCE {
            return Err(RelaxationError::NegativeEigenvalue { block, value });
        }
        if value <= threshold {
            continue;
        }
        let root = Polynomial::from_terms(
            eigen
                .eigenvectors
                .column(k)
                .iter()
                .zip(basis)
                .filter(|(v, _)| v.abs() > threshold)
                .map(|(&v, w)| (w.clone(), Complex64::new(v, 0.0))),
        );
        let square = root.adjoint().mul(&root).scale(Complex64::new(value, 0.0));
        sigma = sigma.add(&square);
    }
    Ok(sigma)
}
