//! Spool-type pressure control (relief) valve.

use crate::common::{Newton, OIL_DENSITY};
use crate::orifice::{Boundary, write_result};
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;
use tl_core::{Real, guarded_div};
use tl_core::limits::{dx_limit, dx_signed_square_l, limit, signed_square_l};
use tl_kernel::{
    CqsType, Definition, InitContext, KernelResult, Model, ParamHandle, PortHandle, PowerVars,
    StepContext,
};
use tl_node::{NodeType, NodeVar};
use tl_solver::{Delay, EquationSystemSolver};

const WEIGHTS: [Real; 4] = [1.0, 0.67, 0.5, 0.5];
const ITERATIONS: usize = 2;
/// Smallest spool denominator magnitude; reverse flow forces can cancel the damping.
const MIN_DEN: Real = 1e-9;

#[derive(Clone, Copy, Debug)]
struct Geometry {
    /// Spool end area (m^2).
    area: Real,
    /// Opening area gradient (m).
    w: Real,
    damping: Real,
    spring: Real,
    xv_max: Real,
    cq: Real,
    cos_phi: Real,
    rho: Real,
    p0: Real,
}

#[derive(Clone, Copy, Debug)]
struct ValveEquations {
    g: Geometry,
    dt: Real,
    pref: Real,
    /// Pilot pressure, or `None` when piloted from P1.
    p3: Option<Real>,
    p4: Real,
    /// Spool dynamics carried over from the previous step.
    delayed: Real,
    ends: Boundary,
}

impl ValveEquations {
    fn flow_force(&self) -> Real {
        2.0 * self.g.cq * self.dt * self.g.w * self.g.cos_phi
    }

    fn den(&self, dp: Real) -> Real {
        2.0 * self.g.damping + self.g.spring * self.dt + self.flow_force() * dp
    }

    fn control(&self, p1: Real) -> Real {
        self.p3.unwrap_or(p1) - self.p4 - self.pref
    }

    fn kq(&self) -> Real {
        self.g.cq * (2.0 / self.g.rho).sqrt() * self.g.w
    }

    /// Unknowns `[xv, q2, p1, p2]`.
    fn eval(&self, x: &DVector<Real>, r: &mut DVector<Real>, j: &mut DMatrix<Real>) {
        let (xv, q2, p1, p2) = (x[0], x[1], x[2], x[3]);
        let dp = p1 - p2;
        let u = self.control(p1);
        let inv_den = guarded_div(1.0, self.den(dp), MIN_DEN);
        let ad = self.g.area * self.dt;
        let s = ad * u * inv_den - self.delayed;
        let dlim = dx_limit(s, 0.0, self.g.xv_max);
        let du_dp1 = if self.p3.is_none() { 1.0 } else { 0.0 };
        let ds_dp1 = ad * du_dp1 * inv_den - ad * u * self.flow_force() * inv_den * inv_den;
        let ds_dp2 = ad * u * self.flow_force() * inv_den * inv_den;

        r[0] = xv - limit(s, 0.0, self.g.xv_max);
        j[(0, 0)] = 1.0;
        j[(0, 1)] = 0.0;
        j[(0, 2)] = -dlim * ds_dp1;
        j[(0, 3)] = -dlim * ds_dp2;

        let kq = self.kq();
        r[1] = q2 - kq * xv * signed_square_l(dp, self.g.p0);
        j[(1, 0)] = -kq * signed_square_l(dp, self.g.p0);
        j[(1, 1)] = 1.0;
        j[(1, 2)] = -kq * xv * dx_signed_square_l(dp, self.g.p0);
        j[(1, 3)] = kq * xv * dx_signed_square_l(dp, self.g.p0);

        j[(2, 0)] = 0.0;
        j[(3, 0)] = 0.0;
        self.ends.eval(x, r, j, 1);
    }

    /// Spool history term for the next step, from the converged state.
    fn next_delayed(&self, xv: Real, p1: Real, p2: Real) -> Real {
        let dp = p1 - p2;
        let u = self.control(p1);
        let stiffness = self.g.spring * self.dt - 2.0 * self.g.damping + self.flow_force() * dp;
        guarded_div(-self.g.area * self.dt * u + xv * stiffness, self.den(dp), MIN_DEN)
    }
}

/// Relief valve: the spool opens P1 to P2 when the pilot pressure exceeds `pref`.
///
/// P3 carries the pilot pressure and P4 the spring chamber pressure. Without a
/// connection on P3 the valve is piloted from P1; an unconnected P4 is vented.
/// Spool position appears on the `xv` output.
#[derive(Debug, Default)]
pub struct PressureControlValveQ {
    ports: [PortHandle; 4],
    pref_in: PortHandle,
    xv_out: PortHandle,
    params: [ParamHandle; 9],
    nodes: [PowerVars; 4],
    pref: NodeVar,
    xv: NodeVar,
    pilot: bool,
    vented: bool,
    geometry: Option<Geometry>,
    dt: Real,
    spool: Option<Delay>,
    newton: Option<Newton>,
}

impl Model for PressureControlValveQ {
    fn cqs_type(&self) -> CqsType {
        CqsType::Q
    }

    fn configure(&mut self, def: &mut Definition) {
        self.ports = [
            def.add_power_port("P1", NodeType::Hydraulic),
            def.add_power_port("P2", NodeType::Hydraulic),
            def.add_optional_power_port("P3", NodeType::Hydraulic),
            def.add_optional_power_port("P4", NodeType::Hydraulic),
        ];
        self.pref_in = def.add_input_variable("pref", "Reference pressure", "Pa", 1e6);
        self.xv_out = def.add_output_variable("xv", "Spool position");
        self.params = [
            def.add_parameter("Dv", "Spool diameter", "m", 0.03),
            def.add_parameter("frac", "Fraction of spool circumference opening", "", 0.1),
            def.add_parameter("Bv", "Spool damping", "N s/m", 100.0),
            def.add_parameter("Xvmax", "Maximum spool displacement", "m", 0.03),
            def.add_parameter("Cq", "Flow coefficient", "", 0.67),
            def.add_parameter("phi", "Jet angle", "rad", 0.03),
            def.add_parameter("ks", "Spring constant", "N/m", 100.0),
            def.add_parameter("rho", "Oil density", "kg/m^3", OIL_DENSITY),
            def.add_parameter("p0", "Turbulent transition pressure", "Pa", 1e5),
        ];
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        let [dv, frac, bv, xv_max, cq, phi, ks, rho, p0] = self.params.map(|h| ctx.real(h));
        if dv <= 0.0 || rho <= 0.0 || xv_max <= 0.0 || bv < 0.0 || ks < 0.0 {
            return Err(ctx.error("Dv, rho, Xvmax must be positive and Bv, ks non-negative"));
        }
        if bv == 0.0 && ks == 0.0 {
            return Err(ctx.error("Bv and ks cannot both be zero"));
        }
        let g = Geometry {
            area: PI / 4.0 * dv * dv,
            w: PI * dv * frac * phi.sin(),
            damping: bv,
            spring: ks,
            xv_max,
            cq,
            cos_phi: phi.cos(),
            rho,
            p0,
        };

        for (slot, port) in self.nodes.iter_mut().zip(self.ports) {
            *slot = ctx.power_vars(port)?;
        }
        self.pilot = ctx.is_connected(self.ports[2]);
        self.vented = !ctx.is_connected(self.ports[3]);
        self.pref = ctx.signal(self.pref_in)?;
        self.xv = ctx.signal(self.xv_out)?;
        self.dt = ctx.timestep();

        let [n1, n2, ..] = &self.nodes;
        let (xv, p1, p2) = (self.xv.get(), n1.effort.get(), n2.effort.get());
        let eq = self.equations(g);
        self.spool = Some(Delay::new(1, eq.next_delayed(xv, p1, p2))?);
        let solver = EquationSystemSolver::with_weights(4, &WEIGHTS)?;
        self.newton = Some(Newton::new(solver, &[xv, n2.flow.get(), p1, p2]));
        self.geometry = Some(g);
        Ok(())
    }

    fn simulate_one_timestep(&mut self, ctx: &StepContext<'_>) {
        let (Some(g), Some(spool)) = (self.geometry, self.spool.as_ref()) else {
            return;
        };
        let eq = ValveEquations {
            delayed: spool.newest(),
            ..self.equations(g)
        };
        let Some(newton) = self.newton.as_mut() else {
            return;
        };
        newton.run(ITERATIONS, ctx, |x, r, j| eq.eval(x, r, j));
        let x = &newton.x;
        let (xv, p1, p2) = (x[0], x[2], x[3]);

        let [n1, n2, n3, n4] = &self.nodes;
        write_result(n1, n2, x, 1);
        for (n, p) in [(n3, eq.p3.unwrap_or(p1)), (n4, eq.p4)] {
            n.flow.set(0.0);
            n.effort.set(p);
        }
        self.xv.set(xv);
        if let Some(spool) = self.spool.as_mut() {
            spool.update(eq.next_delayed(xv, p1, p2));
        }
    }

    fn description(&self) -> &str {
        "Pressure control valve"
    }
}

impl PressureControlValveQ {
    fn equations(&self, g: Geometry) -> ValveEquations {
        let [n1, n2, n3, n4] = &self.nodes;
        ValveEquations {
            g,
            dt: self.dt,
            pref: self.pref.get(),
            p3: self.pilot.then(|| n3.wave.get()),
            p4: if self.vented { 0.0 } else { n4.wave.get() },
            delayed: 0.0,
            ends: Boundary::read(n1, n2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::jacobian_deviation;
    use proptest::prelude::*;

    fn geometry() -> Geometry {
        let dv: Real = 0.03;
        Geometry {
            area: PI / 4.0 * dv * dv,
            w: PI * dv * 0.1 * 0.03_f64.sin(),
            damping: 100.0,
            spring: 100.0,
            xv_max: 0.03,
            cq: 0.67,
            cos_phi: 0.03_f64.cos(),
            rho: 870.0,
            p0: 1e5,
        }
    }

    fn equations(p3: Option<Real>) -> ValveEquations {
        ValveEquations {
            g: geometry(),
            dt: 1e-3,
            pref: 1e6,
            p3,
            p4: 0.0,
            delayed: -0.01,
            ends: Boundary {
                c1: 2e6,
                zc1: 1e9,
                c2: 1e5,
                zc2: 5e8,
            },
        }
    }

    #[test]
    fn closed_below_reference_pressure() {
        let eq = ValveEquations {
            delayed: 0.0,
            ..equations(Some(5e5))
        };
        let mut solver = EquationSystemSolver::with_weights(4, &WEIGHTS).unwrap();
        let mut x = DVector::from_column_slice(&[0.0, 0.0, 1e6, 1e5]);
        solver.iterate(&mut x, 4, |x, r, j| eq.eval(x, r, j)).unwrap();
        assert!(x[0].abs() < 1e-15);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn weights_repeat_after_the_fourth_iteration() {
        let solver = EquationSystemSolver::with_weights(4, &WEIGHTS).unwrap();
        assert_eq!(solver.weight(1), 0.67);
        assert_eq!(solver.weight(7), 0.5);
    }

    #[test]
    fn spool_terms_stay_finite_when_reverse_flow_cancels_damping() {
        let eq = equations(Some(1.1e6));
        let g = eq.g;
        let dp = -(2.0 * g.damping + g.spring * eq.dt) / eq.flow_force();
        assert!(eq.den(dp).abs() < MIN_DEN);

        let (p1, p2) = (1e5, 1e5 - dp);
        assert!(eq.next_delayed(0.01, p1, p2).is_finite());
        let x = DVector::from_column_slice(&[0.01, 0.0, p1, p2]);
        let mut r = DVector::zeros(4);
        let mut j = DMatrix::zeros(4, 4);
        eq.eval(&x, &mut r, &mut j);
        assert!(r.iter().all(|v| v.is_finite()), "{r}");
        assert!(j.iter().all(|v| v.is_finite()), "{j}");
    }

    proptest! {
        #[test]
        fn jacobian_matches_differences_with_external_pilot(
            xv in 1e-3..2e-2f64,
            q2 in -1e-4..1e-4f64,
            p1 in 1.01e6..1.1e6f64,
            p2 in 1e5..5e5f64,
            p3 in 1.01e6..1.1e6f64,
        ) {
            let eq = equations(Some(p3));
            let dev = jacobian_deviation(&[xv, q2, p1, p2], |x, r, j| eq.eval(x, r, j));
            prop_assert!(dev < 1e-6, "deviation {dev}");
        }

        #[test]
        fn jacobian_matches_differences_with_internal_pilot(
            xv in 1e-3..2e-2f64,
            q2 in -1e-4..1e-4f64,
            p1 in 1.01e6..1.1e6f64,
            p2 in 1e5..5e5f64,
        ) {
            let eq = equations(None);
            let dev = jacobian_deviation(&[xv, q2, p1, p2], |x, r, j| eq.eval(x, r, j));
            prop_assert!(dev < 1e-6, "deviation {dev}");
        }
    }
}
