//! Crate error type.
//!
//! Every failure surfaces synchronously to the immediate caller. Nothing in the
//! crate logs-and-continues, retries, or falls back to a different estimator.

/// Errors produced by the regressors, the ODR solver and the evidence routine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdentError {
    /// A covariance (or precision) matrix the computation depends on is singular
    /// or indefinite.
    #[error("Covariance matrix {matrix} is not positive definite")]
    NonPositiveDefiniteCovariance {
        /// Which matrix failed (e.g. "C", "prior precision").
        matrix: &'static str,
    },

    /// The orthogonal distance solver hit its iteration limit.
    #[error("ODR fit did not converge after {iterations} iterations (sum of squares {sum_of_squares:.6e})")]
    FitDidNotConverge {
        iterations: usize,
        sum_of_squares: f64,
    },

    /// The orthogonal distance solver rejected its inputs or could not form a step.
    #[error("ODR solver error: {0}")]
    SolverError(String),

    /// A least-squares solve produced a non-finite solution.
    #[error("Least-squares solve failed: {0}")]
    LeastSquares(String),

    /// Shape or parameter validation failed before any computation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl IdentError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        IdentError::InvalidInput(message.into())
    }

    pub(crate) fn solver(message: impl Into<String>) -> Self {
        IdentError::SolverError(message.into())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, IdentError>;
