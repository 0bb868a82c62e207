//! Errors raised while building, transforming and solving a relaxation.

use ncsdp_algebra::AlgebraError;
use ncsdp_linalg::LinalgError;
use thiserror::Error;

/// Coarse classification of a [`RelaxationError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request itself is invalid.
    Configuration,
    /// An algebraic query or rewrite failed.
    Algebraic,
    /// A numerical routine failed.
    Numerical,
    /// The external solver could not be run or failed.
    Solver,
}

/// Errors from the relaxation engine.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RelaxationError {
    /// Levels below -1 are meaningless.
    #[error("invalid relaxation level {0}")]
    InvalidLevel(i32),

    /// Level -1 was requested but no basis was supplied for a group.
    #[error("relaxation at level -1 needs explicit monomials for variable group {group}")]
    MissingBasis {
        /// Index of the group without a basis.
        group: usize,
    },

    /// A product basis was built from lists of different lengths.
    #[error("cannot build a square block from monomial lists of lengths {left} and {right}")]
    UnequalProductBasis {
        /// Length of the first list.
        left: usize,
        /// Length of the second list.
        right: usize,
    },

    /// Reprocessed constraints changed the constraint block sizes.
    #[error("constraint block sizes changed from {expected:?} to {found:?}")]
    BlockMismatch {
        /// Sizes of the constraint blocks at build time.
        expected: Vec<i64>,
        /// Sizes requested now.
        found: Vec<i64>,
    },

    /// Reprocessed moment equalities changed the moment substitutions.
    #[error("moment substitutions cannot change after the moment matrix is built")]
    MomentSubstitutionsChanged,

    /// The operation needs the variables that equality elimination removed.
    #[error("operation is not available after equalities were eliminated")]
    AlreadyEliminated,

    /// An equality is of higher degree than the level can localize.
    #[error("an equality constraint has degree {degree}; choose a relaxation level of at least {needed}")]
    EqualityDegree {
        /// Degree of the equality.
        degree: usize,
        /// Smallest adequate level.
        needed: usize,
    },

    /// A constraint mixes variables of several groups.
    #[error("constraint {index} uses variables from more than one variable group")]
    MixedVariableGroups {
        /// Position of the constraint in processing order.
        index: usize,
    },

    /// A moment expression refers to a cell outside the block structure.
    #[error("moment expression refers to cell [{i},{j}] of block {block}, which does not exist")]
    InvalidMomentReference {
        /// Block index.
        block: usize,
        /// Row.
        i: usize,
        /// Column.
        j: usize,
    },

    /// A moment expression could not be parsed.
    #[error("cannot parse moment expression `{input}`: {reason}")]
    MomentExprParse {
        /// The offending input.
        input: String,
        /// What went wrong.
        reason: String,
    },

    /// Localizing overrides do not match the number of constraints.
    #[error("{given} localizing monomial sets given for {expected} constraints")]
    LocalizingOverrideCount {
        /// Number of constraints.
        expected: usize,
        /// Number of overrides.
        given: usize,
    },

    /// A solver parameter is not understood by the solver.
    #[error("unknown parameter `{key}` for solver {solver}")]
    UnknownSolverParameter {
        /// Solver name.
        solver: String,
        /// Offending key.
        key: String,
    },

    /// A monomial has no SDP variable.
    #[error("monomial {0} could not be found in the monomial index")]
    MonomialNotFound(String),

    /// Substitution rules failed.
    #[error(transparent)]
    Algebra(#[from] AlgebraError),

    /// The equality system could not be reduced.
    #[error("equality elimination failed: {0}")]
    Elimination(#[from] LinalgError),

    /// Equality elimination only handles real relaxations.
    #[error("equality elimination is not supported for complex relaxations")]
    ComplexElimination,

    /// Solution blocks cannot be paired with monomials.
    #[error("cannot match solution blocks to monomials: {0}")]
    UnmatchedBlocks(String),

    /// A dual block is not positive semidefinite.
    #[error("dual block {block} has eigenvalue {value} and cannot be positive semidefinite")]
    NegativeEigenvalue {
        /// Block index.
        block: usize,
        /// The offending eigenvalue.
        value: f64,
    },

    /// The relaxation has not been built yet.
    #[error("relaxation is not generated yet")]
    NotBuilt,

    /// The relaxation has not been solved yet.
    #[error("relaxation is not solved yet")]
    NotSolved,

    /// The solver could not be started.
    #[error("solver {0} is not available")]
    SolverUnavailable(String),

    /// The solver ran but reported a failure.
    #[error("solver {solver} failed: {message}")]
    SolverFailed {
        /// Solver name.
        solver: String,
        /// Failure description.
        message: String,
    },
}

impl RelaxationError {
    /// Returns the category of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MonomialNotFound(_) | Self::Algebra(_) => ErrorKind::Algebraic,
            Self::Elimination(_) | Self::NegativeEigenvalue { .. } => ErrorKind::Numerical,
            Self::SolverUnavailable(_) | Self::SolverFailed { .. } => ErrorKind::Solver,
            Self::InvalidLevel(_)
            | Self::MissingBasis { .. }
            | Self::UnequalProductBasis { .. }
            | Self::BlockMismatch { .. }
            | Self::MomentSubstitutionsChanged
            | Self::AlreadyEliminated
            | Self::EqualityDegree { .. }
            | Self::MixedVariableGroups { .. }
            | Self::InvalidMomentReference { .. }
            | Self::MomentExprParse { .. }
            | Self::LocalizingOverrideCount { .. }
            | Self::UnknownSolverParameter { .. }
            | Self::ComplexElimination
            | Self::UnmatchedBlocks(_)
            | Self::NotBuilt
            | Self::NotSolved => ErrorKind::Configuration,
        }
    }
}

/// Result alias for the relaxation engine.
pub type Result<T> = std::result::Result<T, RelaxationError>;
