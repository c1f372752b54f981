use std::fmt::Debug;

use thiserror::Error;

// Unified error type for cgsolve

/// Failure signals raised by the conjugate gradient solver.
///
/// The breakdown variants carry the last finite iterate so callers can still
/// inspect (or reuse as a warm start) what the solve had reached.
#[derive(Error, Debug)]
pub enum CgError<T: Debug> {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("singular search direction at iteration {iteration} (v^T A v = {curvature:?})")]
    SingularDirection {
        iteration: usize,
        curvature: T,
        best: Vec<T>,
    },
    #[error("numerical divergence at iteration {iteration}: {quantity} is not finite")]
    NumericalDivergence {
        iteration: usize,
        quantity: &'static str,
        best: Vec<T>,
    },
}

impl<T: Debug> CgError<T> {
    /// Shorthand for an `InvalidInput` with a formatted message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        CgError::InvalidInput(msg.into())
    }

    /// 1-based iteration at which a breakdown was detected; `None` for input errors.
    pub fn iteration(&self) -> Option<usize> {
        match self {
            CgError::InvalidInput(_) => None,
            CgError::SingularDirection { iteration, .. }
            | CgError::NumericalDivergence { iteration, .. } => Some(*iteration),
        }
    }

    /// Best finite estimate reached before the breakdown.
    pub fn best_estimate(&self) -> Option<&[T]> {
        match self {
            CgError::InvalidInput(_) => None,
            CgError::SingularDirection { best, .. }
            | CgError::NumericalDivergence { best, .. } => Some(best),
        }
    }

    pub fn into_best_estimate(self) -> Option<Vec<T>> {
        match self {
            CgError::InvalidInput(_) => None,
            CgError::SingularDirection { best, .. }
            | CgError::NumericalDivergence { best, .. } => Some(best),
        }
    }
}
