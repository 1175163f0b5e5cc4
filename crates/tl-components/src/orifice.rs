//! Q-type orifices between two hydraulic C-type neighbours.
//!
//! Both models solve for `[q2, p1, p2]` with a few Newton iterations per step.
//! Flow is positive from P1 to P2; pressures are kept non-negative through
//! `low_limit`, applied inside the residual so the Jacobian sees it.

use crate::common::{Newton, OIL_DENSITY};
use nalgebra::{DMatrix, DVector};
use tl_core::Real;
use tl_core::limits::{dx_low_limit, dx_turbulent_sqrt, low_limit, on_positive, turbulent_sqrt};
use tl_kernel::{
    CqsType, Definition, InitContext, KernelResult, Model, ParamHandle, PortHandle, PowerVars,
    StepContext,
};
use tl_node::{NodeType, NodeVar};
use tl_solver::EquationSystemSolver;

/// Boundary rows `p1 = max(c1 - Zc1 q2, 0)` and `p2 = max(c2 + Zc2 q2, 0)`.
///
/// `q2, p1, p2` sit at `x[o..o + 3]`; rows `o + 1` and `o + 2` are written.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Boundary {
    pub c1: Real,
    pub zc1: Real,
    pub c2: Real,
    pub zc2: Real,
}

impl Boundary {
    pub fn read(n1: &PowerVars, n2: &PowerVars) -> Self {
        Self {
            c1: n1.wave.get(),
            zc1: n1.impedance.get(),
            c2: n2.wave.get(),
            zc2: n2.impedance.get(),
        }
    }

    pub fn eval(&self, x: &DVector<Real>, r: &mut DVector<Real>, j: &mut DMatrix<Real>, o: usize) {
        let (q2, p1, p2) = (x[o], x[o + 1], x[o + 2]);
        let a1 = self.c1 - q2 * self.zc1 * on_positive(p1);
        let a2 = self.c2 + q2 * self.zc2 * on_positive(p2);
        r[o + 1] = p1 - low_limit(a1, 0.0);
        r[o + 2] = p2 - low_limit(a2, 0.0);
        j[(o + 1, o)] = self.zc1 * dx_low_limit(a1, 0.0) * on_positive(p1);
        j[(o + 1, o + 1)] = 1.0;
        j[(o + 1, o + 2)] = 0.0;
        j[(o + 2, o)] = -self.zc2 * dx_low_limit(a2, 0.0) * on_positive(p2);
        j[(o + 2, o + 1)] = 0.0;
        j[(o + 2, o + 2)] = 1.0;
    }
}

/// Publish `q2, p1, p2` found at `x[o..o + 3]`.
pub(crate) fn write_result(n1: &PowerVars, n2: &PowerVars, x: &DVector<Real>, o: usize) {
    let (q2, p1, p2) = (x[o], x[o + 1], x[o + 2]);
    n1.flow.set(-q2);
    n1.effort.set(p1);
    n2.flow.set(q2);
    n2.effort.set(p2);
}

#[derive(Clone, Copy, Debug)]
struct TurbulentEquations {
    /// `Cq * w * xv * sqrt(2 / rho)`
    ks: Real,
    p0: Real,
    ends: Boundary,
}

impl TurbulentEquations {
    fn eval(&self, x: &DVector<Real>, r: &mut DVector<Real>, j: &mut DMatrix<Real>) {
        let (q2, p1, p2) = (x[0], x[1], x[2]);
        let dp = p1 - p2;
        r[0] = q2 - self.ks * turbulent_sqrt(dp, self.p0);
        let slope = self.ks * dx_turbulent_sqrt(dp, self.p0);
        j[(0, 0)] = 1.0;
        j[(0, 1)] = -slope;
        j[(0, 2)] = slope;
        self.ends.eval(x, r, j, 0);
    }
}

/// Sharp-edged orifice, `q = Cq * w * xv * sqrt(2 |dp| / rho)`, linearized below `p0`.
#[derive(Debug, Default)]
pub struct TurbulentOrificeQ {
    p1: PortHandle,
    p2: PortHandle,
    xv_in: PortHandle,
    cq: ParamHandle,
    w: ParamHandle,
    rho: ParamHandle,
    p0: ParamHandle,
    n1: PowerVars,
    n2: PowerVars,
    xv: NodeVar,
    coefficient: Real,
    transition: Real,
    newton: Option<Newton>,
}

impl TurbulentOrificeQ {
    const ITERATIONS: usize = 2;
}

impl Model for TurbulentOrificeQ {
    fn cqs_type(&self) -> CqsType {
        CqsType::Q
    }

    fn configure(&mut self, def: &mut Definition) {
        self.p1 = def.add_power_port("P1", NodeType::Hydraulic);
        self.p2 = def.add_power_port("P2", NodeType::Hydraulic);
        self.xv_in = def.add_input_variable("xv", "Opening", "m", 1e-4);
        self.cq = def.add_parameter("Cq", "Flow coefficient", "", 0.67);
        self.w = def.add_parameter("w", "Area gradient", "m", 1e-2);
        self.rho = def.add_parameter("rho", "Oil density", "kg/m^3", OIL_DENSITY);
        self.p0 = def.add_parameter("p0", "Turbulent transition pressure", "Pa", 1e4);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        let rho = ctx.real(self.rho);
        self.transition = ctx.real(self.p0);
        if rho <= 0.0 || self.transition <= 0.0 {
            return Err(ctx.error("rho and p0 must be positive"));
        }
        self.coefficient = ctx.real(self.cq) * ctx.real(self.w) * (2.0 / rho).sqrt();
        self.n1 = ctx.power_vars(self.p1)?;
        self.n2 = ctx.power_vars(self.p2)?;
        self.xv = ctx.signal(self.xv_in)?;
        let x0 = [self.n2.flow.get(), self.n1.effort.get(), self.n2.effort.get()];
        self.newton = Some(Newton::new(EquationSystemSolver::new(3), &x0));
        Ok(())
    }

    fn simulate_one_timestep(&mut self, ctx: &StepContext<'_>) {
        let Some(newton) = self.newton.as_mut() else {
            return;
        };
        let eq = TurbulentEquations {
            ks: self.coefficient * self.xv.get(),
            p0: self.transition,
            ends: Boundary::read(&self.n1, &self.n2),
        };
        newton.run(Self::ITERATIONS, ctx, |x, r, j| eq.eval(x, r, j));
        write_result(&self.n1, &self.n2, &newton.x, 0);
    }

    fn description(&self) -> &str {
        "Turbulent orifice"
    }
}

#[derive(Clone, Copy, Debug)]
struct LaminarEquations {
    kc: Real,
    ends: Boundary,
}

impl LaminarEquations {
    fn eval(&self, x: &DVector<Real>, r: &mut DVector<Real>, j: &mut DMatrix<Real>) {
        let (q2, p1, p2) = (x[0], x[1], x[2]);
        r[0] = q2 - self.kc * (p1 - p2);
        j[(0, 0)] = 1.0;
        j[(0, 1)] = -self.kc;
        j[(0, 2)] = self.kc;
        self.ends.eval(x, r, j, 0);
    }
}

/// Laminar restriction, `q = Kc * (p1 - p2)`.
#[derive(Debug, Default)]
pub struct LaminarOrificeQ {
    p1: PortHandle,
    p2: PortHandle,
    kc_in: PortHandle,
    iterations_h: ParamHandle,
    n1: PowerVars,
    n2: PowerVars,
    kc: NodeVar,
    iterations: usize,
    newton: Option<Newton>,
}

impl Model for LaminarOrificeQ {
    fn cqs_type(&self) -> CqsType {
        CqsType::Q
    }

    fn configure(&mut self, def: &mut Definition) {
        self.p1 = def.add_power_port("P1", NodeType::Hydraulic);
        self.p2 = def.add_power_port("P2", NodeType::Hydraulic);
        self.kc_in = def.add_input_variable("Kc", "Flow-pressure coefficient", "m^3/(s Pa)", 1e-11);
        self.iterations_h = def.add_integer_parameter("iterations", "Newton iterations per step", 1);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        let n = ctx.integer(self.iterations_h);
        if n < 1 {
            return Err(ctx.error(format!("iterations must be at least 1, got {n}")));
        }
        self.iterations = n as usize;
        self.n1 = ctx.power_vars(self.p1)?;
        self.n2 = ctx.power_vars(self.p2)?;
        self.kc = ctx.signal(self.kc_in)?;
        let x0 = [self.n2.flow.get(), self.n1.effort.get(), self.n2.effort.get()];
        self.newton = Some(Newton::new(EquationSystemSolver::new(3), &x0));
        Ok(())
    }

    fn simulate_one_timestep(&mut self, ctx: &StepContext<'_>) {
        let Some(newton) = self.newton.as_mut() else {
            return;
        };
        let eq = LaminarEquations {
            kc: self.kc.get(),
            ends: Boundary::read(&self.n1, &self.n2),
        };
        newton.run(self.iterations, ctx, |x, r, j| eq.eval(x, r, j));
        write_result(&self.n1, &self.n2, &newton.x, 0);
    }

    fn description(&self) -> &str {
        "Laminar orifice"
    }
}
