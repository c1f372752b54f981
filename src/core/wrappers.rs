//! Wrappers for faer dense matrix types and vector operations.
//!
//! This module implements the core linear algebra traits for `faer::Mat`, `faer::MatRef`
//! and row-major `Vec<Vec<T>>` storage, so any of them can be handed to the
//! conjugate gradient solver. Vector kernels are serial; the solver targets small
//! dense systems solved once per call.
//!
//! # References
//! - [faer crate documentation](https://docs.rs/faer)
//! - [num-traits crate documentation](https://docs.rs/num-traits)

use crate::core::traits::{InnerProduct, MatShape, MatVec, MatrixGet};
use faer::{Mat, MatRef};
use num_traits::Float;

/// Implements matrix-vector multiplication for `faer::Mat`.
///
/// Computes `y = A * x` where `A` is a dense matrix, `x` and `y` are vectors.
impl<T: Float> MatVec<T> for Mat<T> {
    fn matvec(&self, x: &[T], y: &mut [T]) {
        assert_eq!(self.nrows(), y.len(), "Output vector y has incorrect length");
        assert_eq!(self.ncols(), x.len(), "Input vector x has incorrect length");
        for i in 0..self.nrows() {
            let mut acc = T::zero();
            for j in 0..self.ncols() {
                acc = acc + self[(i, j)] * x[j];
            }
            y[i] = acc;
        }
    }
}

/// Implements matrix-vector multiplication for a matrix reference (`faer::MatRef`).
impl<'a, T: Float> MatVec<T> for MatRef<'a, T> {
    fn matvec(&self, x: &[T], y: &mut [T]) {
        assert_eq!(self.nrows(), y.len(), "Output vector y has incorrect length");
        assert_eq!(self.ncols(), x.len(), "Input vector x has incorrect length");
        for i in 0..self.nrows() {
            let mut acc = T::zero();
            for j in 0..self.ncols() {
                acc = acc + self[(i, j)] * x[j];
            }
            y[i] = acc;
        }
    }
}

/// Row-major nested vectors, the layout produced by cell-by-cell entry.
impl<T: Float> MatVec<T> for Vec<Vec<T>> {
    fn matvec(&self, x: &[T], y: &mut [T]) {
        assert_eq!(self.len(), y.len(), "Output vector y has incorrect length");
        for (yi, row) in y.iter_mut().zip(self.iter()) {
            assert_eq!(row.len(), x.len(), "Input vector x has incorrect length");
            *yi = row
                .iter()
                .zip(x.iter())
                .fold(T::zero(), |acc, (&a, &xj)| acc + a * xj);
        }
    }
}

impl<T> MatShape for Mat<T> {
    fn nrows(&self) -> usize {
        self.nrows()
    }
    fn ncols(&self) -> usize {
        self.ncols()
    }
}

impl<'a, T> MatShape for MatRef<'a, T> {
    fn nrows(&self) -> usize {
        self.nrows()
    }
    fn ncols(&self) -> usize {
        self.ncols()
    }
}

impl<T> MatShape for Vec<Vec<T>> {
    fn nrows(&self) -> usize {
        self.len()
    }
    fn ncols(&self) -> usize {
        self.first().map_or(0, Vec::len)
    }
    fn is_rectangular(&self) -> bool {
        let ncols = MatShape::ncols(self);
        self.iter().all(|row| row.len() == ncols)
    }
}

impl<T: Copy> MatrixGet<T> for Mat<T> {
    fn get(&self, i: usize, j: usize) -> T {
        self[(i, j)]
    }
}

impl<'a, T: Copy> MatrixGet<T> for MatRef<'a, T> {
    fn get(&self, i: usize, j: usize) -> T {
        self[(i, j)]
    }
}

impl<T: Copy> MatrixGet<T> for Vec<Vec<T>> {
    fn get(&self, i: usize, j: usize) -> T {
        self[i][j]
    }
}

/// Implements inner product and norm for slices.
impl<T: Float> InnerProduct<T> for () {
    /// Computes the dot product of two vectors: `x^T y`.
    fn dot(&self, x: &[T], y: &[T]) -> T {
        assert_eq!(x.len(), y.len(), "Vectors must have the same length");
        x.iter()
            .zip(y.iter())
            .fold(T::zero(), |acc, (&xi, &yi)| acc + xi * yi)
    }
    fn norm_sq(&self, x: &[T]) -> T {
        x.iter().fold(T::zero(), |acc, &xi| acc + xi * xi)
    }
    /// Computes the Euclidean norm of a vector: `||x||_2`.
    fn norm(&self, x: &[T]) -> T {
        self.norm_sq(x).sqrt()
    }
}

/// `y ← y + alpha · x`.
pub fn axpy<T: Float>(alpha: T, x: &[T], y: &mut [T]) {
    assert_eq!(x.len(), y.len(), "axpy: length mismatch");
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = *yi + alpha * xi;
    }
}

/// `r ← b − A·x`.
pub fn residual<M, T>(a: &M, b: &[T], x: &[T], r: &mut [T])
where
    M: MatVec<T> + ?Sized,
    T: Float,
{
    a.matvec(x, r);
    for (ri, &bi) in r.iter_mut().zip(b) {
        *ri = bi - *ri;
    }
}

/// True when every entry is neither NaN nor infinite.
pub fn all_finite<T: Float>(x: &[T]) -> bool {
    x.iter().all(|v| v.is_finite())
}
