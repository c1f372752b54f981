//! Core traits and the dense-storage implementations behind them.

pub mod traits;
pub mod wrappers;

pub use traits::{InnerProduct, MatShape, MatVec, MatrixGet};
