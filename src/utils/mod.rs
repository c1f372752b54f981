//! Convergence bookkeeping and input validation shared by the solver.

pub mod convergence;
pub mod validation;
