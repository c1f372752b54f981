//! Convergence tracking & tolerance checks for the iterative solver.

use std::time::Duration;

/// Stopping criteria & stats.
///
/// Convergence is declared when the squared residual norm drops strictly below
/// `tol`; no square root is taken.
pub struct Convergence<T> {
    pub tol: T,
    pub max_iters: usize,
}

#[derive(Clone, Debug)]
pub struct SolveStats<T> {
    /// Completed iterations (1-based).
    pub iterations: usize,
    /// Squared residual norm `r·r` at termination.
    pub final_residual: T,
    pub converged: bool,
    /// Wall time spent in the iteration loop.
    pub elapsed: Duration,
}

impl<T> SolveStats<T> {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

impl<T: Copy + num_traits::Float> Convergence<T> {
    /// Returns (should_stop, stats) given the current `res_sq` after iteration `i` (1-based).
    pub fn check(&self, res_sq: T, i: usize, elapsed: Duration) -> (bool, SolveStats<T>) {
        let converged = res_sq < self.tol;
        (
            converged || i >= self.max_iters,
            SolveStats {
                iterations: i,
                final_residual: res_sq,
                converged,
                elapsed,
            },
        )
    }
}
