//! Newton-Raphson step for a component-local nonlinear system.
//!
//! The owning component rebuilds the residual vector and Jacobian at every
//! iteration; this solver only performs the LU solve and the weighted update
//! `x <- x - w_i * J^-1 * r`. Convergence is the component's business.

use crate::error::{SolverError, SolverResult};
use nalgebra::{DMatrix, DVector};
use tl_core::Real;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    /// The unknown vector was updated.
    Updated,
    /// The Jacobian could not be factorized; `x` is unchanged.
    Singular,
}

#[derive(Clone, Debug)]
pub struct EquationSystemSolver {
    size: usize,
    weights: Vec<Real>,
    singular_streak: usize,
    singular_total: usize,
}

impl EquationSystemSolver {
    /// Solver for `size` unknowns with unit relaxation on every iteration.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            weights: vec![1.0],
            singular_streak: 0,
            singular_total: 0,
        }
    }

    /// Per-iteration relaxation weights; the last weight repeats for later iterations.
    pub fn with_weights(size: usize, weights: &[Real]) -> SolverResult<Self> {
        if weights.is_empty() {
            return Err(SolverError::InvalidSetup {
                what: "at least one relaxation weight is required".to_string(),
            });
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w <= 0.0) {
            return Err(SolverError::InvalidSetup {
                what: format!("relaxation weight {w} must be positive and finite"),
            });
        }
        Ok(Self {
            size,
            weights: weights.to_vec(),
            ..Self::new(size)
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn weight(&self, iteration: usize) -> Real {
        let i = iteration.min(self.weights.len() - 1);
        self.weights[i]
    }

    /// Consecutive singular solves since the last successful update.
    pub fn singular_streak(&self) -> usize {
        self.singular_streak
    }

    pub fn singular_total(&self) -> usize {
        self.singular_total
    }

    pub fn reset_statistics(&mut self) {
        self.singular_streak = 0;
        self.singular_total = 0;
    }

    /// One weighted Newton update of `x` given residuals `r(x)` and Jacobian `J(x)`.
    pub fn solve(
        &mut self,
        jacobian: &DMatrix<Real>,
        residual: &DVector<Real>,
        x: &mut DVector<Real>,
        iteration: usize,
    ) -> SolverResult<SolveStatus> {
        self.check_dims(jacobian, residual, x)?;

        let dx = jacobian.clone().lu().solve(residual);
        match dx {
            Some(dx) if dx.iter().all(|v| v.is_finite()) => {
                let w = self.weight(iteration);
                x.axpy(-w, &dx, 1.0);
                self.singular_streak = 0;
                Ok(SolveStatus::Updated)
            }
            _ => {
                self.singular_streak += 1;
                self.singular_total += 1;
                debug!(
                    size = self.size,
                    iteration,
                    streak = self.singular_streak,
                    "singular Jacobian, update skipped"
                );
                Ok(SolveStatus::Singular)
            }
        }
    }

    /// Run a fixed number of Newton iterations, rebuilding `r` and `J` through `eval`.
    ///
    /// Stops early on a singular Jacobian and reports it.
    pub fn iterate<F>(
        &mut self,
        x: &mut DVector<Real>,
        iterations: usize,
        mut eval: F,
    ) -> SolverResult<SolveStatus>
    where
        F: FnMut(&DVector<Real>, &mut DVector<Real>, &mut DMatrix<Real>),
    {
        let mut residual = DVector::zeros(self.size);
        let mut jacobian = DMatrix::zeros(self.size, self.size);
        let mut status = SolveStatus::Updated;
        for i in 0..iterations {
            eval(x, &mut residual, &mut jacobian);
            status = self.solve(&jacobian, &residual, x, i)?;
            if status == SolveStatus::Singular {
                break;
            }
        }
        Ok(status)
    }

    fn check_dims(
        &self,
        jacobian: &DMatrix<Real>,
        residual: &DVector<Real>,
        x: &DVector<Real>,
    ) -> SolverResult<()> {
        let n = self.size;
        let checks = [
            ("jacobian rows", jacobian.nrows()),
            ("jacobian columns", jacobian.ncols()),
            ("residual length", residual.len()),
            ("unknown vector length", x.len()),
        ];
        for (what, got) in checks {
            if got != n {
                return Err(SolverError::DimensionMismatch {
                    what,
                    expected: n,
                    got,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_system_solves_in_one_step() {
        // 2x + y = 5, x - y = 1  =>  x = 2, y = 1
        let mut s = EquationSystemSolver::new(2);
        let mut x = DVector::from_vec(vec![0.0, 0.0]);
        let status = s
            .iterate(&mut x, 1, |x, r, j| {
                r[0] = 2.0 * x[0] + x[1] - 5.0;
                r[1] = x[0] - x[1] - 1.0;
                j[(0, 0)] = 2.0;
                j[(0, 1)] = 1.0;
                j[(1, 0)] = 1.0;
                j[(1, 1)] = -1.0;
            })
            .unwrap();
        assert_eq!(status, SolveStatus::Updated);
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert!((x[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn weights_scale_the_update() {
        let mut s = EquationSystemSolver::with_weights(1, &[0.5]).unwrap();
        let j = DMatrix::from_element(1, 1, 1.0);
        let r = DVector::from_element(1, 4.0);
        let mut x = DVector::from_element(1, 4.0);
        s.solve(&j, &r, &mut x, 0).unwrap();
        assert_eq!(x[0], 2.0);
    }

    #[test]
    fn last_weight_repeats() {
        let s = EquationSystemSolver::with_weights(4, &[1.0, 0.67, 0.5, 0.5]).unwrap();
        assert_eq!(s.weight(0), 1.0);
        assert_eq!(s.weight(1), 0.67);
        assert_eq!(s.weight(7), 0.5);
    }

    #[test]
    fn bad_weights_are_rejected() {
        assert!(EquationSystemSolver::with_weights(1, &[]).is_err());
        assert!(EquationSystemSolver::with_weights(1, &[1.0, 0.0]).is_err());
        assert!(EquationSystemSolver::with_weights(1, &[f64::NAN]).is_err());
    }

    #[test]
    fn singular_jacobian_leaves_x_unchanged() {
        let mut s = EquationSystemSolver::new(2);
        let j = DMatrix::zeros(2, 2);
        let r = DVector::from_vec(vec![1.0, 1.0]);
        let mut x = DVector::from_vec(vec![3.0, 4.0]);
        assert_eq!(s.solve(&j, &r, &mut x, 0).unwrap(), SolveStatus::Singular);
        assert_eq!(s.solve(&j, &r, &mut x, 1).unwrap(), SolveStatus::Singular);
        assert_eq!(x.as_slice(), &[3.0, 4.0]);
        assert_eq!(s.singular_streak(), 2);

        let ok = DMatrix::identity(2, 2);
        s.solve(&ok, &r, &mut x, 0).unwrap();
        assert_eq!(s.singular_streak(), 0);
        assert_eq!(s.singular_total(), 2);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let mut s = EquationSystemSolver::new(2);
        let j = DMatrix::identity(3, 3);
        let r = DVector::zeros(2);
        let mut x = DVector::zeros(2);
        let err = s.solve(&j, &r, &mut x, 0).unwrap_err();
        assert!(matches!(err, SolverError::DimensionMismatch { .. }));
    }

    #[test]
    fn newton_converges_on_quadratic() {
        // x^2 - 2 = 0
        let mut s = EquationSystemSolver::new(1);
        let mut x = DVector::from_element(1, 1.0);
        s.iterate(&mut x, 8, |x, r, j| {
            r[0] = x[0] * x[0] - 2.0;
            j[(0, 0)] = 2.0 * x[0];
        })
        .unwrap();
        assert!((x[0] - 2.0_f64.sqrt()).abs() < 1e-12);
    }
}
