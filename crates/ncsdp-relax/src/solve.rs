//! The contract with external SDP solvers.

use std::collections::BTreeMap;

use nalgebra::DMatrix;

use crate::error::{RelaxationError, Result};
use crate::export::LiftedProblem;

/// Outcome reported by a solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SolveStatus {
    /// An optimal solution was found.
    Optimal,
    /// The problem is infeasible.
    Infeasible,
    /// The objective is unbounded.
    Unbounded,
    /// Anything else.
    Unknown,
}

/// Solver-specific parameters as string pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SolverParams {
    values: BTreeMap<String, String>,
}

impl SolverParams {
    /// Creates an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.values.insert(key.into(), value.to_string());
        self
    }

    /// Returns a parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Iterates over the parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Checks every key against the keys a solver understands.
    ///
    /// # Errors
    ///
    /// Returns [`RelaxationError::UnknownSolverParameter`] for the first
    /// unknown key.
    pub fn ensure_known(&self, solver: &str, allowed: &[&str]) -> Result<()> {
        match self.values.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(key) => Err(RelaxationError::UnknownSolverParameter {
                solver: solver.to_string(),
                key: key.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// What a solver returns for a [`LiftedProblem`].
#[derive(Clone, Debug, PartialEq)]
pub struct RawSolution {
    /// Primal objective value, without the constant term.
    pub primal: f64,
    /// Dual objective value, without the constant term.
    pub dual: f64,
    /// Primal matrices, one per block.
    pub x_mat: Vec<DMatrix<f64>>,
    /// Dual matrices, one per block.
    pub y_mat: Vec<DMatrix<f64>>,
    /// Values of the SDP variables.
    pub x_vec: Vec<f64>,
    /// Reported status.
    pub status: SolveStatus,
}

/// An SDP solver backend.
pub trait SdpSolver {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Solves a lifted problem.
    ///
    /// # Errors
    ///
    /// [`RelaxationError::SolverUnavailable`] if the backend cannot run,
    /// [`RelaxationError::SolverFailed`] if it fails, and
    /// [`RelaxationError::UnknownSolverParameter`] for unsupported
    /// parameters.
    fn solve(&self, problem: &LiftedProblem, params: &SolverParams) -> Result<RawSolution>;
}

/// A solution attached to a relaxation.
#[derive(Clone, Debug, PartialEq)]
pub struct SdpSolution {
    /// Primal objective including the constant term.
    pub primal: f64,
    /// Dual objective including the constant term.
    pub dual: f64,
    /// Primal matrices, one per (lifted) block.
    pub x_mat: Vec<DMatrix<f64>>,
    /// Dual matrices, one per (lifted) block.
    pub y_mat: Vec<DMatrix<f64>>,
    /// Variable values over the solved variables.
    pub x_vec: Vec<f64>,
    /// Variable values over the monomial index, after undoing any
    /// equality elimination.
    pub moments: Vec<f64>,
    /// Reported status.
    pub status: SolveStatus,
    /// Name of the solver.
    pub solver: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_known() {
        let params = SolverParams::new().set("tolerance", 1e-7).set("max_iter", 50);
        assert!(params.ensure_known("mock", &["tolerance", "max_iter"]).is_ok());

        let err = params.ensure_known("mock", &["tolerance"]).unwrap_err();
        assert_eq!(
            err,
            RelaxationError::UnknownSolverParameter {
                solver: "mock".into(),
                key: "max_iter".into()
            }
        );
        assert_eq!(params.get("max_iter"), Some("50"));
        assert_eq!(params.iter().count(), 2);
    }
}
