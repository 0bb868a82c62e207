//! # ncsdp-linalg
//!
//! Sparse and dense linear algebra for SDP relaxations.
//!
//! This crate provides:
//! - A row-list sparse matrix with additive writes, used while assembling
//!   constraint blocks
//! - Sparse matrices in CSR (Compressed Sparse Row) format for export
//! - Householder QR with column pivoting and full `Q`, used to reduce a
//!   variable basis under linear equalities
//! - Order-preserving parallel maps via rayon

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod parallel;
pub mod qr;
pub mod sparse_matrix;

pub use error::LinalgError;
pub use parallel::{map_ordered, try_map_ordered, ParallelConfig};
pub use qr::ColPivQr;
pub use sparse_matrix::{CsrMatrix, Scalar, SparseRows};
