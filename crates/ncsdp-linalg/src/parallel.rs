//! Parallel helpers built on rayon.
//!
//! Work is only dispatched to the pool when parallelism is enabled and
//! the job is large enough; below the threshold everything runs on the
//! calling thread. Results always come back in input order.

use rayon::prelude::*;

/// Configuration for parallel entry computation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Whether the worker pool may be used at all.
    pub enabled: bool,
    /// Minimum number of work items to enable parallelism.
    pub parallel_threshold: usize,
    /// Minimum number of items a worker takes at once.
    pub chunk_size: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            parallel_threshold: 64,
            chunk_size: 16,
        }
    }
}

impl ParallelConfig {
    /// A configuration with the pool enabled and default thresholds.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Returns true if `n` work items should go to the pool.
    #[must_use]
    pub fn should_parallelize(&self, n: usize) -> bool {
        self.enabled && n >= self.parallel_threshold
    }
}

/// Maps `f` over `items`, in parallel when the config allows it.
///
/// The output is in the same order as `items` either way.
pub fn map_ordered<T, U, F>(items: &[T], config: &ParallelConfig, f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    if config.should_parallelize(items.len()) {
        items
            .par_iter()
            .with_min_len(config.chunk_size.max(1))
            .map(f)
            .collect()
    } else {
        items.iter().map(f).collect()
    }
}

/// Fallible [`map_ordered`]: stops at the first error.
///
/// # Errors
///
/// Returns an error produced by `f`. In parallel mode it is one of the
/// errors produced, not necessarily the first in input order.
pub fn try_map_ordered<T, U, E, F>(items: &[T], config: &ParallelConfig, f: F) -> Result<Vec<U>, E>
where
    T: Sync,
    U: Send,
    E: Send,
    F: Fn(&T) -> Result<U, E> + Sync + Send,
{
    if config.should_parallelize(items.len()) {
        items
            .par_iter()
            .with_min_len(config.chunk_size.max(1))
            .map(f)
            .collect()
    } else {
        items.iter().map(f).collect()
    }
}
