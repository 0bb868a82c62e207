//! Householder QR factorization with column pivoting.
//!
//! Computes `A P = Q R` for a dense real `m × n` matrix, with `Q` the full
//! `m × m` orthogonal factor. The trailing columns of `Q` beyond the
//! numerical rank span the orthogonal complement of the column space of
//! `A`, which is what basis reduction needs.

use nalgebra::{DMatrix, DVector};

use crate::error::LinalgError;

/// Column-pivoted QR decomposition.
#[derive(Clone, Debug)]
pub struct ColPivQr {
    q: DMatrix<f64>,
    r: DMatrix<f64>,
    perm: Vec<usize>,
}

impl ColPivQr {
    /// Factorizes `a`.
    #[must_use]
    pub fn new(a: &DMatrix<f64>) -> Self {
        let (m, n) = a.shape();
        let mut r = a.clone();
        let mut q = DMatrix::<f64>::identity(m, m);
        let mut perm: Vec<usize> = (0..n).collect();

        for k in 0..m.min(n) {
            // Pivot: remaining column with the largest trailing norm
            let mut pivot = k;
            let mut best = -1.0;
            for j in k..n {
                let norm: f64 = (k..m).map(|i| r[(i, j)] * r[(i, j)]).sum();
                if norm > best {
                    best = norm;
                    pivot = j;
                }
            }
            if best <= 0.0 {
                break;
            }
            if pivot != k {
                r.swap_columns(k, pivot);
                perm.swap(k, pivot);
            }

            let alpha = best.sqrt();
            let sign = if r[(k, k)] >= 0.0 { 1.0 } else { -1.0 };
            let mut v: Vec<f64> = (k..m).map(|i| r[(i, k)]).collect();
            v[0] += sign * alpha;
            let v_norm2: f64 = v.iter().map(|x| x * x).sum();
            if v_norm2 == 0.0 {
                continue;
            }
            let beta = 2.0 / v_norm2;

            // R <- H R on the trailing block
            for j in k..n {
                let s: f64 = v.iter().enumerate().map(|(l, vl)| vl * r[(k + l, j)]).sum();
                let s = s * beta;
                for (l, vl) in v.iter().enumerate() {
                    r[(k + l, j)] -= s * vl;
                }
            }

            // Q <- Q H
            for i in 0..m {
                let s: f64 = v.iter().enumerate().map(|(l, vl)| q[(i, k + l)] * vl).sum();
                let s = s * beta;
                for (l, vl) in v.iter().enumerate() {
                    q[(i, k + l)] -= s * vl;
                }
            }

            for i in k + 1..m {
                r[(i, k)] = 0.0;
            }
        }

        Self { q, r, perm }
    }

    /// Returns the orthogonal factor `Q` (`m × m`).
    #[must_use]
    pub fn q(&self) -> &DMatrix<f64> {
        &self.q
    }

    /// Returns the upper-triangular factor `R` (`m × n`).
    #[must_use]
    pub fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    /// Returns the column permutation: column `k` of `A P` is column
    /// `perm[k]` of `A`.
    #[must_use]
    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    /// Numerical rank: one past the last row of `R` whose absolute row
    /// sum exceeds `tol` times the largest row sum.
    #[must_use]
    pub fn rank(&self, tol: f64) -> usize {
        let sums: Vec<f64> = self
            .r
            .row_iter()
            .map(|row| row.iter().map(|x| x.abs()).sum())
            .collect();
        let largest = sums.iter().copied().fold(0.0, f64::max);
        if largest == 0.0 {
            return 0;
        }
        let threshold = tol * largest.max(1.0);
        sums.iter().rposition(|&s| s > threshold).map_or(0, |i| i + 1)
    }

    /// Solves `Aᵀ x = b` in the least-squares sense restricted to the
    /// column space of `A`, and verifies that the system is consistent.
    ///
    /// Returns `x = Q_r y` where `R_rᵀ y = Pᵀ b` is solved by forward
    /// substitution on the first `rank` equations.
    ///
    /// # Errors
    ///
    /// Returns [`LinalgError::DimensionMismatch`] if `b` does not have
    /// one entry per column of `A`, and [`LinalgError::Inconsistent`] if
    /// the remaining equations are violated by more than `√tol` (scaled
    /// by the magnitude of `b`).
    pub fn solve_transposed(&self, b: &[f64], rank: usize, tol: f64) -> Result<DVector<f64>, LinalgError> {
        let n = self.perm.len();
        if b.len() != n {
            return Err(LinalgError::DimensionMismatch {
                expected: n,
                found: b.len(),
            });
        }

        let rhs: Vec<f64> = self.perm.iter().map(|&p| b[p]).collect();
        let mut y = vec![0.0; rank];
        for k in 0..rank {
            let mut acc = rhs[k];
            for (j, yj) in y.iter().enumerate().take(k) {
                acc -= self.r[(j, k)] * yj;
            }
            y[k] = acc / self.r[(k, k)];
        }

        let scale = rhs.iter().fold(1.0f64, |m, x| m.max(x.abs()));
        let threshold = tol.sqrt() * scale;
        for (k, &target) in rhs.iter().enumerate().skip(rank) {
            let lhs: f64 = y.iter().enumerate().map(|(j, yj)| self.r[(j, k)] * yj).sum();
            let residual = (target - lhs).abs();
            if residual > threshold {
                return Err(LinalgError::Inconsistent { residual });
            }
        }

        let m = self.q.nrows();
        let mut x = DVector::zeros(m);
        for (j, yj) in y.iter().enumerate() {
            x.axpy(*yj, &self.q.column(j), 1.0);
        }
        Ok(x)
    }

    /// Returns the trailing columns of `Q` past `rank`.
    #[must_use]
    pub fn complement_basis(&self, rank: usize) -> DMatrix<f64> {
        let m = self.q.nrows();
        self.q.columns(rank, m - rank).into_owned()
    }
}
