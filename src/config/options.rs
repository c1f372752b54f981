//! API options for the conjugate gradient solver.
//!
//! `CgOptions` bundles the stopping criterion (tolerance on the squared residual
//! norm and iteration cap), the residual update strategy, an optional wall-clock
//! deadline and the set of input checks run before iterating.

use std::time::Duration;

use bitflags::bitflags;
use num_traits::Float;

use crate::error::CgError;

/// Default tolerance on `‖r‖²`.
pub const DEFAULT_TOL: f64 = 1e-10;
/// Default iteration cap.
pub const DEFAULT_MAX_ITER: usize = 500;

bitflags! {
    /// Input checks performed before the first iteration.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct InputChecks: u32 {
        /// Reject NaN or infinite entries in `A`, `b` or `x0`.
        const FINITE_INPUT = 0b0000_0001;
        /// Reject matrices with `|a_ij - a_ji|` beyond rounding level.
        const SYMMETRY     = 0b0000_0010;
        const ALL          = Self::FINITE_INPUT.bits() | Self::SYMMETRY.bits();
    }
}

impl Default for InputChecks {
    fn default() -> Self {
        InputChecks::FINITE_INPUT
    }
}

/// How the residual is obtained after each step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ResidualUpdate {
    /// `r = b - A x` from scratch, before and after every step.
    #[default]
    Recompute,
    /// `r ← r - t A v`, one matrix-vector product per iteration.
    Incremental,
}

/// Solver parameters.
#[derive(Clone, Debug)]
pub struct CgOptions<T> {
    /// Convergence threshold on the squared residual norm `r·r`.
    ///
    /// `1e-10` therefore asks for `‖r‖ ≈ 1e-5`.
    pub tol: T,
    /// Maximum number of iterations.
    pub max_iter: usize,
    pub residual: ResidualUpdate,
    /// Stop iterating (without error) once this much wall time has elapsed.
    pub deadline: Option<Duration>,
    pub checks: InputChecks,
}

impl<T: Float> Default for CgOptions<T> {
    fn default() -> Self {
        Self {
            tol: T::from(DEFAULT_TOL).unwrap_or_else(T::epsilon),
            max_iter: DEFAULT_MAX_ITER,
            residual: ResidualUpdate::default(),
            deadline: None,
            checks: InputChecks::default(),
        }
    }
}

impl<T: Float + std::fmt::Debug> CgOptions<T> {
    pub fn new(tol: T, max_iter: usize) -> Self {
        Self {
            tol,
            max_iter,
            ..Self::default()
        }
    }

    pub fn with_residual(mut self, residual: ResidualUpdate) -> Self {
        self.residual = residual;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_checks(mut self, checks: InputChecks) -> Self {
        self.checks = checks;
        self
    }

    /// Rejects a non-positive or non-finite `tol` and a zero `max_iter`.
    pub fn validate(&self) -> Result<(), CgError<T>> {
        if !self.tol.is_finite() || self.tol <= T::zero() {
            return Err(CgError::invalid(format!(
                "tolerance must be a positive finite value, got {:?}",
                self.tol
            )));
        }
        if self.max_iter == 0 {
            return Err(CgError::invalid("max_iter must be at least 1"));
        }
        Ok(())
    }
}
