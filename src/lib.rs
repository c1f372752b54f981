//! cgsolve: conjugate gradient for dense symmetric positive-definite systems over Faer
//!
//! Solves `A x = b` for small-to-moderate dense SPD matrices, reporting the solution,
//! the number of iterations used and the wall time of the iteration loop. Degenerate
//! steps (vanishing curvature, non-finite iterates) are surfaced as errors carrying the
//! best estimate reached.
//!
//! ```rust,ignore
//! use cgsolve::{CgOptions, conjugate_gradient};
//! let a = vec![vec![4.0, 1.0], vec![1.0, 3.0]];
//! let sol = conjugate_gradient(&a, &[1.0, 2.0], None, &CgOptions::default())?;
//! let (x, iterations, seconds) = sol.into_parts();
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod matrix;
pub mod solver;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use self::core::*;
pub use error::*;
pub use matrix::*;
pub use solver::*;

// Re-export SolveStats at the crate root for convenience
pub use utils::convergence::SolveStats;
