//! Core linear-algebra traits for cgsolve.

/// Matrix–vector product: y ← A x.
pub trait MatVec<T> {
    /// Compute y = A · x.
    fn matvec(&self, x: &[T], y: &mut [T]);
}

/// Inner products & norms.
pub trait InnerProduct<T> {
    /// Compute dot(x, y).
    fn dot(&self, x: &[T], y: &[T]) -> T;
    /// Compute ‖x‖₂².
    fn norm_sq(&self, x: &[T]) -> T;
    /// Compute ‖x‖₂.
    fn norm(&self, x: &[T]) -> T;
}

/// Shape queries for dense operators.
pub trait MatShape {
    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;
    /// False when the storage has rows of differing length.
    fn is_rectangular(&self) -> bool {
        true
    }
}

/// Random access to a single entry, used by the input checks.
pub trait MatrixGet<T> {
    fn get(&self, i: usize, j: usize) -> T;
}
