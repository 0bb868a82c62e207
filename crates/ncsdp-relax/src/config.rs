//! Build configuration.

pub use ncsdp_linalg::ParallelConfig;

use ncsdp_algebra::substitution::DEFAULT_MAX_REWRITES;

/// Configuration of a relaxation build.
#[derive(Clone, Debug, PartialEq)]
pub struct RelaxationConfig {
    /// Fix the top-left moment to 1. When off, it becomes a free variable.
    pub normalized: bool,
    /// Worker pool settings for entry computation.
    pub parallel: ParallelConfig,
    /// Rewrite budget for substitution rules.
    pub max_rewrites: usize,
    /// Relative tolerance for the numerical rank in equality elimination.
    pub elimination_tolerance: f64,
}

impl Default for RelaxationConfig {
    fn default() -> Self {
        Self {
            normalized: true,
            parallel: ParallelConfig::default(),
            max_rewrites: DEFAULT_MAX_REWRITES,
            elimination_tolerance: 1e-10,
        }
    }
}

impl RelaxationConfig {
    /// Enables or disables normalization of the top-left moment.
    #[must_use]
    pub fn normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    /// Sets the worker pool configuration.
    #[must_use]
    pub fn parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the rewrite budget.
    #[must_use]
    pub fn max_rewrites(mut self, max_rewrites: usize) -> Self {
        self.max_rewrites = max_rewrites;
        self
    }

    /// Sets the elimination tolerance.
    #[must_use]
    pub fn elimination_tolerance(mut self, tol: f64) -> Self {
        self.elimination_tolerance = tol;
        self
    }
}
