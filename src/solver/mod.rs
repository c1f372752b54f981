//! Solver interfaces.

use crate::utils::convergence::SolveStats;

/// Common interface for iterative solvers.
pub trait LinearSolver<M: ?Sized, T> {
    type Error;
    /// Solve A·x = b, using `x` as the initial guess and writing the result into it.
    /// Returns iteration stats (including convergence info).
    fn solve(&mut self, a: &M, b: &[T], x: &mut [T]) -> Result<SolveStats<T>, Self::Error>;
}

pub mod cg;
pub use cg::{CgSolution, CgSolver, conjugate_gradient};
