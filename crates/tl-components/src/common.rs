//! Helpers shared by the component models.

use tl_core::Real;
use tl_kernel::StepContext;
use nalgebra::{DMatrix, DVector};
use tl_solver::{EquationSystemSolver, SolveStatus};
use tracing::warn;

/// Default oil density (kg/m^3).
pub const OIL_DENSITY: Real = 870.0;

/// Default effective bulk modulus of oil (Pa).
pub const BULK_MODULUS: Real = 1e9;

/// Newton solver plus the unknown vector it carries from step to step.
#[derive(Clone, Debug)]
pub(crate) struct Newton {
    solver: EquationSystemSolver,
    pub x: DVector<Real>,
}

impl Newton {
    pub fn new(solver: EquationSystemSolver, x0: &[Real]) -> Self {
        Self {
            solver,
            x: DVector::from_column_slice(x0),
        }
    }

    /// Run `iterations` weighted updates from inside `simulate_one_timestep`.
    ///
    /// A persistent singular Jacobian ends the run; a transient one leaves `x` as is.
    pub fn run<F>(&mut self, iterations: usize, ctx: &StepContext<'_>, eval: F)
    where
        F: FnMut(&DVector<Real>, &mut DVector<Real>, &mut DMatrix<Real>),
    {
        match self.solver.iterate(&mut self.x, iterations, eval) {
            Ok(SolveStatus::Updated) => {}
            Ok(SolveStatus::Singular) => {
                let streak = self.solver.singular_streak();
                if streak >= ctx.singular_streak_limit() {
                    warn!(component = ctx.path(), streak, "persistent singular Jacobian");
                    ctx.stop_simulation(format!(
                        "singular Jacobian for {streak} consecutive iterations at t = {}",
                        ctx.time()
                    ));
                }
            }
            Err(e) => ctx.stop_simulation(e.to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use nalgebra::{DMatrix, DVector};
    use tl_core::Real;
    use tl_solver::jacobian::{central_difference_jacobian, max_relative_deviation};

    /// Evaluate `eval` at `x` and compare its Jacobian against central differences.
    pub fn jacobian_deviation<F>(x: &[Real], eval: F) -> Real
    where
        F: Fn(&DVector<Real>, &mut DVector<Real>, &mut DMatrix<Real>),
    {
        let n = x.len();
        let x = DVector::from_column_slice(x);
        let mut r = DVector::zeros(n);
        let mut analytic = DMatrix::zeros(n, n);
        eval(&x, &mut r, &mut analytic);

        let residual = |x: &DVector<Real>| {
            let mut r = DVector::zeros(n);
            let mut j = DMatrix::zeros(n, n);
            eval(x, &mut r, &mut j);
            r
        };
        let numeric = central_difference_jacobian(&x, residual, 1e-7);
        max_relative_deviation(&analytic, &numeric)
    }
}
