//! Solver configuration.

pub mod options;
pub use options::{CgOptions, InputChecks, ResidualUpdate};
