//! Input validation run before the solver touches any arithmetic.
//!
//! Checks are raised eagerly so that callers get a clear `InvalidInput`
//! instead of an out-of-bounds panic or a NaN-polluted result. Shape checks
//! always run; the finiteness and symmetry scans are controlled by
//! [`InputChecks`].

use std::fmt::Debug;

use num_traits::Float;

use crate::config::InputChecks;
use crate::core::traits::{MatShape, MatrixGet};
use crate::error::CgError;
use crate::matrix::dense::find_asymmetry;

/// Multiple of machine epsilon allowed between `a_ij` and `a_ji`.
const SYMMETRY_ULPS: f64 = 64.0;

/// Validate `A`, `b` and the optional initial guess, returning the system size `n`.
pub fn validate_system<M, T>(
    a: &M,
    b: &[T],
    x0: Option<&[T]>,
    checks: InputChecks,
) -> Result<usize, CgError<T>>
where
    M: MatShape + MatrixGet<T> + ?Sized,
    T: Float + Debug,
{
    if !a.is_rectangular() {
        return Err(CgError::invalid("matrix rows have differing lengths"));
    }
    let (rows, cols) = (a.nrows(), a.ncols());
    if rows != cols {
        return Err(CgError::invalid(format!(
            "conjugate gradient requires a square matrix but got {rows}x{cols}"
        )));
    }
    if b.len() != rows {
        return Err(CgError::invalid(format!(
            "rhs length {} does not match matrix rows {rows}",
            b.len()
        )));
    }
    if let Some(x0) = x0 {
        if x0.len() != rows {
            return Err(CgError::invalid(format!(
                "initial guess length {} does not match matrix rows {rows}",
                x0.len()
            )));
        }
    }
    let n = rows;

    if checks.contains(InputChecks::FINITE_INPUT) {
        check_finite(a, n, b, x0)?;
    }
    if checks.contains(InputChecks::SYMMETRY) {
        check_symmetric(a, n)?;
    }
    Ok(n)
}

fn check_finite<M, T>(a: &M, n: usize, b: &[T], x0: Option<&[T]>) -> Result<(), CgError<T>>
where
    M: MatrixGet<T> + ?Sized,
    T: Float + Debug,
{
    for i in 0..n {
        for j in 0..n {
            if !a.get(i, j).is_finite() {
                return Err(CgError::invalid(format!(
                    "matrix entry ({i}, {j}) is not finite"
                )));
            }
        }
    }
    if let Some(i) = b.iter().position(|v| !v.is_finite()) {
        return Err(CgError::invalid(format!("rhs entry {i} is not finite")));
    }
    if let Some(i) = x0.and_then(|x0| x0.iter().position(|v| !v.is_finite())) {
        return Err(CgError::invalid(format!(
            "initial guess entry {i} is not finite"
        )));
    }
    Ok(())
}

fn check_symmetric<M, T>(a: &M, n: usize) -> Result<(), CgError<T>>
where
    M: MatrixGet<T> + ?Sized,
    T: Float + Debug,
{
    let ulps = T::from(SYMMETRY_ULPS).unwrap_or_else(T::one);
    if let Some((i, j)) = find_asymmetry(a, n, ulps) {
        let (upper, lower) = (a.get(i, j), a.get(j, i));
        return Err(CgError::invalid(format!(
            "matrix is not symmetric: A[{i}][{j}] = {upper:?} but A[{j}][{i}] = {lower:?}"
        )));
    }
    Ok(())
}
