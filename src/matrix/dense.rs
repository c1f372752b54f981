//! Dense‐matrix API on top of Faer.
//!
//! This module provides the `DenseMatrix` trait and its implementation for the `faer::Mat<T>` type,
//! enabling construction from raw column-major storage or from row-major rows as entered
//! cell by cell.

use crate::core::traits::{MatShape, MatVec, MatrixGet};
use crate::error::CgError;
use faer::Mat;
use num_traits::Float;
use std::fmt::Debug;

/// First pair `(i, j)`, `i < j`, with `|a_ij - a_ji| > ulps · ε · max(|a_ij|, |a_ji|)`.
///
/// Only the leading `n x n` block is scanned.
pub fn find_asymmetry<M, T>(a: &M, n: usize, ulps: T) -> Option<(usize, usize)>
where
    M: MatrixGet<T> + ?Sized,
    T: Float,
{
    for i in 0..n {
        for j in (i + 1)..n {
            let (upper, lower) = (a.get(i, j), a.get(j, i));
            let scale = upper.abs().max(lower.abs());
            if (upper - lower).abs() > ulps * T::epsilon() * scale {
                return Some((i, j));
            }
        }
    }
    None
}

/// Owned dense matrix that can be built from flat or row-major data and fed to the solver.
pub trait DenseMatrix<T: Debug>: MatVec<T> + MatShape + MatrixGet<T> + Sized {
    /// Construct from raw column-major storage.
    fn from_raw(nrows: usize, ncols: usize, data: Vec<T>) -> Result<Self, CgError<T>>;

    /// Construct from row-major rows; every row must have the same length.
    fn from_row_major(rows: &[Vec<T>]) -> Result<Self, CgError<T>>;

    /// Square and equal to its transpose up to `ulps` machine epsilons (relative).
    fn is_symmetric(&self, ulps: T) -> bool
    where
        T: Float,
    {
        self.nrows() == self.ncols() && find_asymmetry(self, self.nrows(), ulps).is_none()
    }
}

impl<T: Copy + Float + Debug> DenseMatrix<T> for Mat<T> {
    fn from_raw(nrows: usize, ncols: usize, data: Vec<T>) -> Result<Self, CgError<T>> {
        if data.len() != nrows * ncols {
            return Err(CgError::invalid(format!(
                "{} values cannot fill a {nrows}x{ncols} matrix",
                data.len()
            )));
        }
        Ok(Mat::from_fn(nrows, ncols, |i, j| data[j * nrows + i]))
    }

    fn from_row_major(rows: &[Vec<T>]) -> Result<Self, CgError<T>> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        if let Some(i) = rows.iter().position(|r| r.len() != ncols) {
            return Err(CgError::invalid(format!(
                "row {i} has {} entries, expected {ncols}",
                rows[i].len()
            )));
        }
        Ok(Mat::from_fn(nrows, ncols, |i, j| rows[i][j]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_storage_is_column_major() {
        let m: Mat<f64> = DenseMatrix::from_raw(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(m[(0, 1)], 3.0);
        assert_eq!(m[(1, 0)], 2.0);
        assert!(<Mat<f64> as DenseMatrix<f64>>::from_raw(2, 2, vec![1.0; 3]).is_err());
    }

    #[test]
    fn rows_are_row_major() {
        let m: Mat<f64> = DenseMatrix::from_row_major(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m[(0, 1)], 2.0);
        assert_eq!(m[(1, 0)], 3.0);
        assert!(<Mat<f64> as DenseMatrix<f64>>::from_row_major(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    #[test]
    fn symmetry_is_checked_to_rounding_level() {
        let sym: Mat<f64> =
            DenseMatrix::from_row_major(&[vec![4.0, 1.0 + 1e-15], vec![1.0, 3.0]]).unwrap();
        assert!(DenseMatrix::is_symmetric(&sym, 64.0));
        let asym: Mat<f64> = DenseMatrix::from_row_major(&[vec![4.0, 1.5], vec![1.0, 3.0]]).unwrap();
        assert!(!DenseMatrix::is_symmetric(&asym, 64.0));
        assert_eq!(find_asymmetry(&asym, 2, 64.0), Some((0, 1)));
        let rect: Mat<f64> = DenseMatrix::from_raw(1, 2, vec![1.0, 1.0]).unwrap();
        assert!(!DenseMatrix::is_symmetric(&rect, 64.0));
    }
}
