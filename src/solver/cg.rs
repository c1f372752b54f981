//! Conjugate Gradient (unpreconditioned) per Saad §6.1, for dense SPD systems.
//!
//! ```text
//! x = x0
//! for i in 0..max_iter:
//!     r0 = b - A x
//!     if i == 0: v = r0
//!     t  = (v . r0) / (v . A v)
//!     x  = x + t v
//!     r1 = b - A x                  (or r0 - t A v when incremental)
//!     if r1 . r1 < tol: break
//!     s  = (r1 . r1) / (r0 . r0)
//!     v  = r1 + s v
//! ```
//!
//! Convergence is tested on the *squared* residual norm. A curvature `v . A v`
//! that vanishes relative to `‖v‖ ‖A v‖` is reported as
//! [`CgError::SingularDirection`]; any non-finite step quantity is reported as
//! [`CgError::NumericalDivergence`]. Running out of iterations (or past the
//! optional deadline) is not an error: the best iterate is returned with
//! `converged == false`.

use std::fmt::Debug;
use std::time::{Duration, Instant};

use num_traits::Float;
use tracing::{debug, trace, warn};

use crate::config::{CgOptions, ResidualUpdate};
use crate::core::traits::{InnerProduct, MatShape, MatVec, MatrixGet};
use crate::core::wrappers::{all_finite, axpy, residual};
use crate::error::CgError;
use crate::solver::LinearSolver;
use crate::utils::convergence::{Convergence, SolveStats};
use crate::utils::validation::validate_system;

/// Solution vector plus the statistics of the solve that produced it.
#[derive(Clone, Debug)]
pub struct CgSolution<T> {
    pub x: Vec<T>,
    pub stats: SolveStats<T>,
}

impl<T> CgSolution<T> {
    pub fn iterations(&self) -> usize {
        self.stats.iterations
    }

    pub fn converged(&self) -> bool {
        self.stats.converged
    }

    /// Squared residual norm `r·r` at termination.
    pub fn residual_sq(&self) -> T
    where
        T: Copy,
    {
        self.stats.final_residual
    }

    pub fn elapsed(&self) -> Duration {
        self.stats.elapsed
    }

    /// Loop wall time in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.stats.elapsed_secs()
    }

    /// `(x, iterations, seconds)`.
    pub fn into_parts(self) -> (Vec<T>, usize, f64) {
        let secs = self.stats.elapsed_secs();
        (self.x, self.stats.iterations, secs)
    }
}

pub struct CgSolver<T> {
    pub opts: CgOptions<T>,
    pub monitor: Option<Box<dyn FnMut(usize, T)>>,
    /// `r·r` after each completed iteration of the last solve.
    pub residual_history: Vec<T>,
}

impl<T: Float + Debug> CgSolver<T> {
    pub fn new(tol: T, max_iter: usize) -> Self {
        Self::with_options(CgOptions::new(tol, max_iter))
    }

    pub fn with_options(opts: CgOptions<T>) -> Self {
        Self {
            opts,
            monitor: None,
            residual_history: Vec::new(),
        }
    }

    pub fn with_residual(mut self, residual: ResidualUpdate) -> Self {
        self.opts.residual = residual;
        self
    }

    /// Called with `(iteration, r·r)` after every completed iteration.
    pub fn with_monitor<F>(mut self, f: F) -> Self
    where
        F: FnMut(usize, T) + 'static,
    {
        self.monitor = Some(Box::new(f));
        self
    }

    pub fn clear_history(&mut self) {
        self.residual_history.clear();
    }

    /// Solve `A x = b` starting from `x0` (zero when `None`).
    ///
    /// `x0` is copied, never written to.
    pub fn run<M>(&mut self, a: &M, b: &[T], x0: Option<&[T]>) -> Result<CgSolution<T>, CgError<T>>
    where
        M: MatVec<T> + MatShape + MatrixGet<T> + ?Sized,
    {
        self.opts.validate()?;
        let n = validate_system(a, b, x0, self.opts.checks)?;
        self.residual_history.clear();

        let start = Instant::now();
        if n == 0 {
            debug!("empty system, nothing to solve");
            return Ok(CgSolution {
                x: Vec::new(),
                stats: SolveStats {
                    iterations: 0,
                    final_residual: T::zero(),
                    converged: true,
                    elapsed: start.elapsed(),
                },
            });
        }

        let ip = ();
        let conv = Convergence {
            tol: self.opts.tol,
            max_iters: self.opts.max_iter,
        };
        let recompute = self.opts.residual == ResidualUpdate::Recompute;

        let mut x = x0.map_or_else(|| vec![T::zero(); n], <[T]>::to_vec);
        let mut x_next = vec![T::zero(); n];
        let mut r0 = vec![T::zero(); n];
        let mut r1 = vec![T::zero(); n];
        let mut v = vec![T::zero(); n];
        let mut av = vec![T::zero(); n];
        let mut r0_sq = T::zero();
        let mut warned_indefinite = false;
        let mut stats = SolveStats {
            iterations: 0,
            final_residual: T::zero(),
            converged: false,
            elapsed: Duration::ZERO,
        };

        debug!(
            n,
            tol = ?self.opts.tol,
            max_iter = self.opts.max_iter,
            residual = ?self.opts.residual,
            "starting conjugate gradient"
        );

        for i in 0..self.opts.max_iter {
            let iteration = i + 1;

            if i > 0 {
                if let Some(limit) = self.opts.deadline {
                    if start.elapsed() >= limit {
                        warn!(iteration = i, ?limit, "deadline reached before convergence");
                        break;
                    }
                }
            }

            if i == 0 || recompute {
                residual(a, b, &x, &mut r0);
                r0_sq = ip.norm_sq(&r0);
            }
            if !r0_sq.is_finite() {
                warn!(iteration, "residual overflowed");
                return Err(CgError::NumericalDivergence {
                    iteration,
                    quantity: "residual",
                    best: x,
                });
            }
            if r0_sq == T::zero() {
                // The current iterate already solves the system exactly.
                self.record(iteration, r0_sq);
                stats = SolveStats {
                    iterations: iteration,
                    final_residual: r0_sq,
                    converged: true,
                    elapsed: start.elapsed(),
                };
                break;
            }
            if i == 0 {
                v.copy_from_slice(&r0);
            }

            a.matvec(&v, &mut av);
            let curvature = ip.dot(&v, &av);
            if !curvature.is_finite() {
                warn!(iteration, "curvature v^T A v is not finite");
                return Err(CgError::NumericalDivergence {
                    iteration,
                    quantity: "curvature",
                    best: x,
                });
            }
            if curvature.abs() <= T::epsilon() * ip.norm(&v) * ip.norm(&av) {
                warn!(iteration, curvature = ?curvature, "search direction is singular");
                return Err(CgError::SingularDirection {
                    iteration,
                    curvature,
                    best: x,
                });
            }
            if curvature < T::zero() && !warned_indefinite {
                warn!(iteration, curvature = ?curvature, "negative curvature, matrix is not positive definite");
                warned_indefinite = true;
            }

            let t = ip.dot(&v, &r0) / curvature;
            if !t.is_finite() {
                warn!(iteration, "step size is not finite");
                return Err(CgError::NumericalDivergence {
                    iteration,
                    quantity: "step size",
                    best: x,
                });
            }
            x_next.copy_from_slice(&x);
            axpy(t, &v, &mut x_next);
            if !all_finite(&x_next) {
                warn!(iteration, "iterate is not finite");
                return Err(CgError::NumericalDivergence {
                    iteration,
                    quantity: "solution",
                    best: x,
                });
            }
            std::mem::swap(&mut x, &mut x_next);

            if recompute {
                residual(a, b, &x, &mut r1);
            } else {
                r1.copy_from_slice(&r0);
                axpy(-t, &av, &mut r1);
            }
            let r1_sq = ip.norm_sq(&r1);
            if !r1_sq.is_finite() {
                warn!(iteration, "residual overflowed");
                return Err(CgError::NumericalDivergence {
                    iteration,
                    quantity: "residual",
                    best: x,
                });
            }

            self.record(iteration, r1_sq);
            trace!(iteration, residual_sq = ?r1_sq, step = ?t, "cg iteration");

            let (stop, s) = conv.check(r1_sq, iteration, start.elapsed());
            stats = s;
            if stop {
                break;
            }

            // r0_sq > 0 here; an exactly zero residual left the loop above.
            let beta = r1_sq / r0_sq;
            if !beta.is_finite() {
                warn!(iteration, "direction coefficient is not finite");
                return Err(CgError::NumericalDivergence {
                    iteration,
                    quantity: "direction coefficient",
                    best: x,
                });
            }
            for (vj, &rj) in v.iter_mut().zip(&r1) {
                *vj = rj + beta * *vj;
            }
            if !all_finite(&v) {
                warn!(iteration, "search direction is not finite");
                return Err(CgError::NumericalDivergence {
                    iteration,
                    quantity: "search direction",
                    best: x,
                });
            }

            std::mem::swap(&mut r0, &mut r1);
            r0_sq = r1_sq;
        }

        stats.elapsed = start.elapsed();
        if stats.converged {
            debug!(
                iterations = stats.iterations,
                residual_sq = ?stats.final_residual,
                "conjugate gradient converged"
            );
        } else {
            warn!(
                iterations = stats.iterations,
                residual_sq = ?stats.final_residual,
                "conjugate gradient stopped without converging"
            );
        }
        Ok(CgSolution { x, stats })
    }

    fn record(&mut self, iteration: usize, res_sq: T) {
        self.residual_history.push(res_sq);
        if let Some(ref mut monitor) = self.monitor {
            monitor(iteration, res_sq);
        }
    }
}

impl<M, T> LinearSolver<M, T> for CgSolver<T>
where
    M: MatVec<T> + MatShape + MatrixGet<T> + ?Sized,
    T: Float + Debug,
{
    type Error = CgError<T>;

    /// Uses `x` as the initial guess and overwrites it only on success.
    fn solve(&mut self, a: &M, b: &[T], x: &mut [T]) -> Result<SolveStats<T>, CgError<T>> {
        let sol = self.run(a, b, Some(&*x))?;
        x.copy_from_slice(&sol.x);
        Ok(sol.stats)
    }
}

/// Solve `A x = b` for SPD `A` with the given options.
///
/// Returns the solution together with the iteration count and the loop's wall
/// time. Hitting `max_iter` is reported through `converged == false`, not as an
/// error.
pub fn conjugate_gradient<M, T>(
    a: &M,
    b: &[T],
    x0: Option<&[T]>,
    opts: &CgOptions<T>,
) -> Result<CgSolution<T>, CgError<T>>
where
    M: MatVec<T> + MatShape + MatrixGet<T> + ?Sized,
    T: Float + Debug,
{
    CgSolver::with_options(opts.clone()).run(a, b, x0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputChecks;
    use approx::assert_abs_diff_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn dense(rows: &[&[f64]]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| r.to_vec()).collect()
    }

    fn diag(d: &[f64]) -> Vec<Vec<f64>> {
        (0..d.len())
            .map(|i| (0..d.len()).map(|j| if i == j { d[i] } else { 0.0 }).collect())
            .collect()
    }

    fn residual_sq(a: &Vec<Vec<f64>>, b: &[f64], x: &[f64]) -> f64 {
        let mut r = vec![0.0; b.len()];
        residual(a, b, x, &mut r);
        r.iter().map(|ri| ri * ri).sum()
    }

    #[test]
    fn cg_solves_simple_spd() {
        // SPD system: [[4,1],[1,3]] x = [1,2]
        let a = dense(&[&[4.0, 1.0], &[1.0, 3.0]]);
        let b = vec![1.0, 2.0];
        let mut x = vec![0.0, 0.0];
        let mut solver = CgSolver::new(1e-10, 20);
        let stats = solver.solve(&a, &b, &mut x).unwrap();
        let expected = vec![0.09090909090909091, 0.6363636363636364];
        for (xi, ei) in x.iter().zip(expected.iter()) {
            assert!((xi - ei).abs() < 1e-8, "xi = {}, expected = {}", xi, ei);
        }
        assert!(stats.converged, "CG did not converge");
        assert!(stats.iterations <= 2);
    }

    #[test]
    fn cg_solves_spd() {
        // A = [[4,1,0],[1,3,1],[0,1,2]], x_true = [1,2,3], b = A * x_true
        let a = dense(&[&[4.0, 1.0, 0.0], &[1.0, 3.0, 1.0], &[0.0, 1.0, 2.0]]);
        let x_true = vec![1.0, 2.0, 3.0];
        let mut b = vec![0.0; 3];
        a.matvec(&x_true, &mut b);
        let sol = conjugate_gradient(&a, &b, None, &CgOptions::default()).unwrap();
        assert!(sol.converged(), "CG did not converge");
        assert!(sol.iterations() <= 3);
        assert!(residual_sq(&a, &b, &sol.x) < 1e-10);
        for (xi, ti) in sol.x.iter().zip(&x_true) {
            assert_abs_diff_eq!(*xi, *ti, epsilon = 1e-5);
        }
    }

    #[test]
    fn reported_residual_matches_true_residual() {
        let a = dense(&[&[4.0, 1.0, 0.0], &[1.0, 3.0, 1.0], &[0.0, 1.0, 2.0]]);
        let b = [1.0, 2.0, 3.0];
        let sol = conjugate_gradient(&a, &b, None, &CgOptions::default()).unwrap();
        assert!(sol.residual_sq() < 1e-10);
        assert_abs_diff_eq!(sol.residual_sq(), residual_sq(&a, &b, &sol.x), epsilon = 1e-20);

        let capped = conjugate_gradient(&a, &b, None, &CgOptions::new(1e-30, 1)).unwrap();
        assert!(!capped.converged());
        assert!(capped.residual_sq() >= 1e-30);
        assert_eq!(capped.residual_sq(), capped.stats.final_residual);
    }

    #[test]
    fn identity_converges_in_one_iteration() {
        let a = diag(&[1.0; 4]);
        let b = vec![3.0, -1.5, 0.25, 8.0];
        let sol = conjugate_gradient(&a, &b, None, &CgOptions::default()).unwrap();
        assert_eq!(sol.iterations(), 1);
        assert!(sol.converged());
        for (xi, bi) in sol.x.iter().zip(&b) {
            assert_abs_diff_eq!(*xi, *bi, epsilon = 1e-12);
        }
    }

    #[test]
    fn diagonal_system_divides_elementwise() {
        let d = [2.0, 5.0, 0.5, 10.0];
        let b = [1.0, -2.0, 3.0, 4.0];
        let sol = conjugate_gradient(&diag(&d), &b, None, &CgOptions::default()).unwrap();
        assert!(sol.converged());
        assert!(sol.iterations() <= d.len());
        for i in 0..d.len() {
            assert_abs_diff_eq!(sol.x[i], b[i] / d[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn zero_rhs_returns_zero_after_one_iteration() {
        let a = dense(&[&[4.0, 1.0], &[1.0, 3.0]]);
        let sol = conjugate_gradient(&a, &[0.0, 0.0], None, &CgOptions::default()).unwrap();
        assert_eq!(sol.x, vec![0.0, 0.0]);
        assert_eq!(sol.iterations(), 1);
        assert!(sol.converged());
    }

    #[test]
    fn exact_initial_guess_is_returned_unchanged() {
        let a = dense(&[&[4.0, 1.0], &[1.0, 3.0]]);
        let x0 = [1.0, 2.0];
        let b = [6.0, 7.0];
        let sol = conjugate_gradient(&a, &b, Some(&x0), &CgOptions::default()).unwrap();
        assert_eq!(sol.x, x0.to_vec());
        assert_eq!(sol.iterations(), 1);
    }

    #[test]
    fn empty_system_returns_immediately() {
        let a: Vec<Vec<f64>> = Vec::new();
        let sol = conjugate_gradient(&a, &[], None, &CgOptions::default()).unwrap();
        assert!(sol.x.is_empty());
        assert_eq!(sol.iterations(), 0);
    }

    #[test]
    fn dimension_mismatch_is_invalid_input() {
        let a = diag(&[1.0, 2.0, 3.0]);
        let err = conjugate_gradient(&a, &[1.0; 4], None, &CgOptions::default()).unwrap_err();
        assert!(matches!(err, CgError::InvalidInput(_)));

        let err = conjugate_gradient(&a, &[1.0; 3], Some(&[0.0; 2][..]), &CgOptions::default())
            .unwrap_err();
        assert!(matches!(err, CgError::InvalidInput(_)));
    }

    #[test]
    fn invalid_options_are_rejected() {
        let a = diag(&[1.0]);
        let err = conjugate_gradient(&a, &[1.0], None, &CgOptions::new(0.0, 10)).unwrap_err();
        assert!(matches!(err, CgError::InvalidInput(_)));
        let err = conjugate_gradient(&a, &[1.0], None, &CgOptions::new(1e-10, 0)).unwrap_err();
        assert!(matches!(err, CgError::InvalidInput(_)));
    }

    #[test]
    fn orthogonal_curvature_is_singular_direction() {
        // diag(1, -1) with b = (1, 1): v^T A v = 1 - 1 = 0 on the first step
        let a = diag(&[1.0, -1.0]);
        let err = conjugate_gradient(&a, &[1.0, 1.0], None, &CgOptions::default()).unwrap_err();
        match err {
            CgError::SingularDirection { iteration, best, .. } => {
                assert_eq!(iteration, 1);
                assert_eq!(best, vec![0.0, 0.0]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn indefinite_matrix_never_panics_or_overruns() {
        let a = diag(&[1.0, -1.0]);
        for b in [[2.0, 1.0], [1.0, 0.0], [-3.0, 0.5], [1.0, 1.0]] {
            match conjugate_gradient(&a, &b, None, &CgOptions::new(1e-10, 50)) {
                Ok(sol) => assert!(sol.iterations() <= 50),
                Err(CgError::SingularDirection { .. }) | Err(CgError::NumericalDivergence { .. }) => {}
                Err(e) => panic!("unexpected error {e}"),
            }
        }
    }

    #[test]
    fn overflow_is_numerical_divergence() {
        let a = diag(&[1.0, 1.0]);
        let err = conjugate_gradient(&a, &[1e200, 1e200], None, &CgOptions::default()).unwrap_err();
        assert!(matches!(err, CgError::NumericalDivergence { iteration: 1, .. }));
        assert_eq!(err.best_estimate(), Some(&[0.0, 0.0][..]));
    }

    #[test]
    fn subnormal_curvature_overflows_step_size() {
        // v^T A v = 1e-310 is nonzero but 1 / 1e-310 overflows
        let a = dense(&[&[1e-310]]);
        let err = conjugate_gradient(&a, &[1.0], None, &CgOptions::default()).unwrap_err();
        match err {
            CgError::NumericalDivergence { iteration, quantity, best } => {
                assert_eq!(iteration, 1);
                assert_eq!(quantity, "step size");
                assert_eq!(best, vec![0.0]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unchecked_nan_input_surfaces_as_divergence() {
        let a = dense(&[&[f64::NAN, 0.0], &[0.0, 1.0]]);
        let opts = CgOptions::default().with_checks(InputChecks::empty());
        let err = conjugate_gradient(&a, &[1.0, 1.0], None, &opts).unwrap_err();
        assert!(matches!(err, CgError::NumericalDivergence { .. }));

        let checked = conjugate_gradient(&a, &[1.0, 1.0], None, &CgOptions::default()).unwrap_err();
        assert!(matches!(checked, CgError::InvalidInput(_)));
    }

    #[test]
    fn iteration_cap_is_respected() {
        let a = diag(&[1.0, 10.0, 100.0, 1e3, 1e4, 1e5]);
        let b = [1.0; 6];
        let sol = conjugate_gradient(&a, &b, None, &CgOptions::new(1e-30, 2)).unwrap();
        assert_eq!(sol.iterations(), 2);
        assert!(!sol.converged());
        assert!(sol.x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn zero_deadline_stops_after_first_iteration() {
        let a = diag(&[1.0, 10.0, 100.0, 1e3, 1e4, 1e5]);
        let opts = CgOptions::default().with_deadline(Duration::ZERO);
        let sol = conjugate_gradient(&a, &[1.0; 6], None, &opts).unwrap();
        assert_eq!(sol.iterations(), 1);
        assert!(!sol.converged());
    }

    #[test]
    fn incremental_residual_reaches_same_answer() {
        let a = dense(&[&[4.0, 1.0, 0.0], &[1.0, 3.0, 1.0], &[0.0, 1.0, 2.0]]);
        let b = [6.0, 10.0, 8.0];
        let full = conjugate_gradient(&a, &b, None, &CgOptions::default()).unwrap();
        let incr = conjugate_gradient(
            &a,
            &b,
            None,
            &CgOptions::default().with_residual(ResidualUpdate::Incremental),
        )
        .unwrap();
        assert!(incr.converged());
        for (p, q) in full.x.iter().zip(&incr.x) {
            assert_abs_diff_eq!(*p, *q, epsilon = 1e-5);
        }
    }

    #[test]
    fn repeated_solves_are_identical() {
        let a = dense(&[&[4.0, 1.0, 0.0], &[1.0, 3.0, 1.0], &[0.0, 1.0, 2.0]]);
        let b = [1.0, -2.0, 0.5];
        let x0 = [0.3, 0.3, 0.3];
        let first = conjugate_gradient(&a, &b, Some(&x0), &CgOptions::default()).unwrap();
        let second = conjugate_gradient(&a, &b, Some(&x0), &CgOptions::default()).unwrap();
        assert_eq!(first.x, second.x);
        assert_eq!(first.iterations(), second.iterations());
        assert_eq!(x0, [0.3, 0.3, 0.3]);
    }

    #[test]
    fn monitor_sees_every_iteration() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let a = dense(&[&[4.0, 1.0, 0.0], &[1.0, 3.0, 1.0], &[0.0, 1.0, 2.0]]);
        let mut solver = CgSolver::new(1e-10, 100).with_monitor(move |i, r| sink.borrow_mut().push((i, r)));
        let sol = solver.run(&a, &[1.0, 2.0, 3.0], None).unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), sol.iterations());
        assert_eq!(solver.residual_history.len(), sol.iterations());
        assert_eq!(seen.last().map(|&(i, _)| i), Some(sol.iterations()));
        assert!(seen.last().map_or(false, |&(_, r)| r < 1e-10));
    }

    #[test]
    fn failed_solve_leaves_caller_vector_untouched() {
        let a = diag(&[1.0, -1.0]);
        let mut x = vec![0.0, 0.0];
        let mut solver = CgSolver::new(1e-10, 10);
        assert!(solver.solve(&a, &[1.0, 1.0], &mut x).is_err());
        assert_eq!(x, vec![0.0, 0.0]);
    }

    #[test]
    fn works_in_single_precision() {
        let a: Vec<Vec<f32>> = vec![vec![4.0, 1.0], vec![1.0, 3.0]];
        let sol = conjugate_gradient(&a, &[1.0f32, 2.0], None, &CgOptions::new(1e-8, 20)).unwrap();
        assert!(sol.converged());
        assert_abs_diff_eq!(sol.x[0], 1.0 / 11.0, epsilon = 1e-4);
        assert_abs_diff_eq!(sol.x[1], 7.0 / 11.0, epsilon = 1e-4);
    }
}
