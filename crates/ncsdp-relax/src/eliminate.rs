//! Numerical elimination of linear equality constraints.
//!
//! Equalities `a₀ + A y = 0` over the variables `y` are solved once:
//! every solution is `y = x + H z`, with `x` a particular solution and the
//! columns of `H` an orthonormal basis of the null space of `A`. The
//! relaxation is then rewritten over `z`:
//! `F_new = [F·[1; x] | F_vars·H]`, `obj_new = Hᵀ obj` and the constant
//! term gains `obj · x`.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use tracing::debug;

use ncsdp_linalg::{try_map_ordered, ColPivQr, ParallelConfig, SparseRows};

use crate::error::{RelaxationError, Result};

/// Entries of the transformed `F` at or below this magnitude are dropped.
const DROP_TOLERANCE: f64 = 1e-12;

/// A computed reparametrization `y = x + H z`.
#[derive(Clone, Debug, PartialEq)]
pub struct Elimination {
    x: DVector<f64>,
    h: DMatrix<f64>,
}

fn real_part(value: Complex64) -> Result<f64> {
    if value.im == 0.0 {
        Ok(value.re)
    } else {
        Err(RelaxationError::ComplexElimination)
    }
}

impl Elimination {
    /// Solves the equality rows, each a dense vector over the constant
    /// column and `n_vars` variables.
    ///
    /// Returns `None` when there are no rows.
    ///
    /// # Errors
    ///
    /// [`RelaxationError::ComplexElimination`] for imaginary coefficients,
    /// [`RelaxationError::Elimination`] for an inconsistent system.
    pub fn compute(rows: &[Vec<Complex64>], n_vars: usize, tol: f64) -> Result<Option<Self>> {
        if rows.is_empty() {
            return Ok(None);
        }

        // M = A_varsᵀ, with every row sign-normalized to a non-negative constant
        let mut m = DMatrix::<f64>::zeros(n_vars, rows.len());
        let mut rhs = Vec::with_capacity(rows.len());
        for (k, row) in rows.iter().enumerate() {
            let a0 = real_part(row[0])?;
            let sign = if a0 < 0.0 { -1.0 } else { 1.0 };
            for (v, &value) in row.iter().enumerate().skip(1) {
                m[(v - 1, k)] = sign * real_part(value)?;
            }
            rhs.push(-sign * a0);
        }

        let qr = ColPivQr::new(&m);
        let rank = qr.rank(tol);
        let x = qr.solve_transposed(&rhs, rank, tol)?;
        let h = qr.complement_basis(rank);
        debug!(equalities = rows.len(), rank, remaining = h.ncols(), "equalities eliminated");
        Ok(Some(Self { x, h }))
    }

    /// Number of variables before elimination.
    #[must_use]
    pub fn original_n_vars(&self) -> usize {
        self.x.len()
    }

    /// Number of variables after elimination.
    #[must_use]
    pub fn n_vars(&self) -> usize {
        self.h.ncols()
    }

    /// The particular solution `x`.
    #[must_use]
    pub fn particular(&self) -> &DVector<f64> {
        &self.x
    }

    /// The null-space basis `H`.
    #[must_use]
    pub fn basis(&self) -> &DMatrix<f64> {
        &self.h
    }

    /// Rewrites `F` over the new variables.
    ///
    /// # Errors
    ///
    /// [`RelaxationError::ComplexElimination`] if `F` has imaginary entries.
    pub fn transform_f(&self, f: &SparseRows<Complex64>, parallel: &ParallelConfig) -> Result<SparseRows<Complex64>> {
        let n = self.original_n_vars();
        let rows: Vec<usize> = (0..f.num_rows()).collect();
        let transformed = try_map_ordered(&rows, parallel, |&r| -> Result<Vec<(usize, Complex64)>> {
            let mut constant = 0.0;
            let mut reduced = vec![0.0; self.n_vars()];
            for &(col, value) in f.row(r) {
                let value = real_part(value)?;
                if col == 0 {
                    constant += value;
                } else if col <= n {
                    constant += value * self.x[col - 1];
                    for (k, slot) in reduced.iter_mut().enumerate() {
                        *slot += value * self.h[(col - 1, k)];
                    }
                }
            }
            Ok(std::iter::once(constant)
                .chain(reduced)
                .enumerate()
                .filter(|(_, v)| v.abs() > DROP_TOLERANCE)
                .map(|(c, v)| (c, Complex64::new(v, 0.0)))
                .collect())
        })?;

        let mut out = SparseRows::new(f.num_rows(), self.n_vars() + 1);
        for (r, entries) in transformed.into_iter().enumerate() {
            out.set_row(r, entries);
        }
        Ok(out)
    }

    /// Rewrites the objective: returns `Hᵀ obj` and `obj · x`.
    #[must_use]
    pub fn transform_objective(&self, obj: &[f64]) -> (Vec<f64>, f64) {
        let c = DVector::from_fn(self.original_n_vars(), |i, _| obj.get(i).copied().unwrap_or(0.0));
        let reduced = self.h.tr_mul(&c);
        (reduced.iter().copied().collect(), c.dot(&self.x))
    }

    /// Maps a solution over the new variables back to the original ones:
    /// `y = x + H z`.
    #[must_use]
    pub fn expand_back(&self, z: &[f64]) -> Vec<f64> {
        let z = DVector::from_column_slice(z);
        let y = &self.x + &self.h * z;
        y.iter().copied().collect()
    }
}
