//! Rotational mechanics: sources, torsional shaft and inertia.

use tl_core::Real;
use tl_kernel::{
    CqsType, Definition, InitContext, KernelResult, Model, ParamHandle, PortHandle, PowerVars,
    StepContext,
};
use tl_node::{NodeType, NodeVar, Rotational};

/// Imposes a torque (C-type, zero impedance).
#[derive(Debug, Default)]
pub struct TorqueSourceC {
    port: PortHandle,
    input: PortHandle,
    torque: NodeVar,
    node: PowerVars,
}

impl Model for TorqueSourceC {
    fn cqs_type(&self) -> CqsType {
        CqsType::C
    }

    fn configure(&mut self, def: &mut Definition) {
        self.input = def.add_input_variable("T", "Torque", "Nm", 0.0);
        self.port = def.add_power_port("Pmr1", NodeType::MechanicRotational);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.torque = ctx.signal(self.input)?;
        self.node = ctx.power_vars(self.port)?;
        self.write();
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        self.write();
    }

    fn description(&self) -> &str {
        "Torque source"
    }
}

impl TorqueSourceC {
    fn write(&self) {
        self.node.wave.set(self.torque.get());
        self.node.impedance.set(0.0);
    }
}

/// Imposes an angular velocity into its neighbour (Q-type) and integrates the angle.
#[derive(Debug, Default)]
pub struct AngularVelocitySourceQ {
    port: PortHandle,
    input: PortHandle,
    w: NodeVar,
    node: PowerVars,
    angle: NodeVar,
    dt: Real,
}

impl Model for AngularVelocitySourceQ {
    fn cqs_type(&self) -> CqsType {
        CqsType::Q
    }

    fn configure(&mut self, def: &mut Definition) {
        self.input = def.add_input_variable("w", "Angular velocity", "rad/s", 1.0);
        self.port = def.add_power_port("Pmr1", NodeType::MechanicRotational);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.w = ctx.signal(self.input)?;
        self.node = ctx.power_vars(self.port)?;
        self.angle = ctx.node_var(self.port, Rotational::Angle)?;
        self.dt = ctx.timestep();
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let w = self.w.get();
        self.node.flow.set(w);
        self.node
            .effort
            .set(self.node.wave.get() + self.node.impedance.get() * w);
        self.angle.set(self.angle.get() + w * self.dt);
    }

    fn description(&self) -> &str {
        "Angular velocity source"
    }
}

/// Torsional spring of a solid or hollow circular shaft.
///
/// `Ks = pi/32 * (dy^4 - di^4) * G / len`; a two-port TLM line with
/// numerical damping `alpha` and one step of extra filter delay.
#[derive(Debug, Default)]
pub struct RotShaftC {
    p1: PortHandle,
    p2: PortHandle,
    params: [ParamHandle; 5],
    n1: PowerVars,
    n2: PowerVars,
    zc: Real,
    alpha: Real,
    c1: Real,
    c2: Real,
    c1f: Real,
    c2f: Real,
}

impl RotShaftC {
    pub fn stiffness(dy: Real, di: Real, len: Real, g: Real) -> Real {
        std::f64::consts::PI / 32.0 * (dy.powi(4) - di.powi(4)) * g / len
    }
}

impl Model for RotShaftC {
    fn cqs_type(&self) -> CqsType {
        CqsType::C
    }

    fn configure(&mut self, def: &mut Definition) {
        self.p1 = def.add_power_port("Pmr1", NodeType::MechanicRotational);
        self.p2 = def.add_power_port("Pmr2", NodeType::MechanicRotational);
        self.params = [
            def.add_parameter("dy", "Outer diameter", "m", 0.02),
            def.add_parameter("di", "Inner diameter", "m", 0.0),
            def.add_parameter("len", "Length", "m", 0.1),
            def.add_parameter("G", "Shear modulus", "Pa", 7.93e10),
            def.add_parameter("alpha", "Numerical damping", "", 0.3),
        ];
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        let [dy, di, len, g, alpha] = self.params.map(|h| ctx.real(h));
        if !(dy > di && di >= 0.0 && len > 0.0 && g > 0.0) {
            return Err(ctx.error("need dy > di >= 0, len > 0 and G > 0"));
        }
        if !(0.0..1.0).contains(&alpha) {
            return Err(ctx.error(format!("alpha must be in [0, 1), got {alpha}")));
        }
        self.alpha = alpha;
        self.zc = Self::stiffness(dy, di, len, g) * ctx.timestep() / (1.0 - alpha);

        self.n1 = ctx.power_vars(self.p1)?;
        self.n2 = ctx.power_vars(self.p2)?;
        let (t1, w1) = (self.n1.effort.get(), self.n1.flow.get());
        let (t2, w2) = (self.n2.effort.get(), self.n2.flow.get());
        self.c1 = t1 - w1 * self.zc;
        self.c2 = t2 - w2 * self.zc;
        self.c1f = t1;
        self.c2f = t2;
        self.publish();
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let w1 = self.n1.flow.get();
        let w2 = self.n2.flow.get();
        let c10 = self.c2 + 2.0 * w2 * self.zc;
        let c20 = self.c1 + 2.0 * w1 * self.zc;
        self.c1 = self.c1f;
        self.c2 = self.c2f;
        let a = self.alpha;
        self.c1f = (1.0 - a) * c10 + a * self.c1f;
        self.c2f = (1.0 - a) * c20 + a * self.c2f;
        self.publish();
    }

    fn description(&self) -> &str {
        "Torsional shaft"
    }
}

impl RotShaftC {
    fn publish(&self) {
        self.n1.wave.set(self.c1);
        self.n2.wave.set(self.c2);
        self.n1.impedance.set(self.zc);
        self.n2.impedance.set(self.zc);
    }
}

/// Rigid rotating inertia with viscous friction between two C-type neighbours.
///
/// `J dw/dt = T1 - T2 - B w`, integrated with backward Euler. Pmr2 turns with
/// `w`, Pmr1 with `-w`.
#[derive(Debug, Default)]
pub struct RotInertiaQ {
    p1: PortHandle,
    p2: PortHandle,
    j_h: ParamHandle,
    b_h: ParamHandle,
    n1: PowerVars,
    n2: PowerVars,
    angles: [NodeVar; 2],
    inertias: [NodeVar; 2],
    inertia: Real,
    friction: Real,
    dt: Real,
    w: Real,
    angle: Real,
}

impl Model for RotInertiaQ {
    fn cqs_type(&self) -> CqsType {
        CqsType::Q
    }

    fn configure(&mut self, def: &mut Definition) {
        self.p1 = def.add_power_port("Pmr1", NodeType::MechanicRotational);
        self.p2 = def.add_power_port("Pmr2", NodeType::MechanicRotational);
        self.j_h = def.add_parameter("J", "Moment of inertia", "kg m^2", 1.0);
        self.b_h = def.add_parameter("B", "Viscous friction", "Nm s/rad", 0.0);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.inertia = ctx.real(self.j_h);
        self.friction = ctx.real(self.b_h);
        if self.inertia <= 0.0 || self.friction < 0.0 {
            return Err(ctx.error("J must be positive and B non-negative"));
        }
        self.dt = ctx.timestep();
        self.n1 = ctx.power_vars(self.p1)?;
        self.n2 = ctx.power_vars(self.p2)?;
        self.angles = [
            ctx.node_var(self.p1, Rotational::Angle)?,
            ctx.node_var(self.p2, Rotational::Angle)?,
        ];
        self.inertias = [
            ctx.node_var(self.p1, Rotational::EquivalentInertia)?,
            ctx.node_var(self.p2, Rotational::EquivalentInertia)?,
        ];
        self.w = self.n2.flow.get();
        self.angle = self.angles[1].get();
        for v in &self.inertias {
            v.set(self.inertia);
        }
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let (c1, z1) = (self.n1.wave.get(), self.n1.impedance.get());
        let (c2, z2) = (self.n2.wave.get(), self.n2.impedance.get());
        let m = self.inertia / self.dt;
        self.w = (m * self.w + c1 - c2) / (m + z1 + z2 + self.friction);
        self.angle += self.w * self.dt;

        self.n1.flow.set(-self.w);
        self.n1.effort.set(c1 - z1 * self.w);
        self.n2.flow.set(self.w);
        self.n2.effort.set(c2 + z2 * self.w);
        self.angles[0].set(-self.angle);
        self.angles[1].set(self.angle);
        for v in &self.inertias {
            v.set(self.inertia);
        }
    }

    fn description(&self) -> &str {
        "Rotating inertia"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_shaft_stiffness() {
        // pi/32 * 0.02^4 * 7.93e10 / 0.1
        let ks = RotShaftC::stiffness(0.02, 0.0, 0.1, 7.93e10);
        assert!((ks - 12_456.415).abs() < 1e-2, "{ks}");
        assert!(RotShaftC::stiffness(0.02, 0.01, 0.1, 7.93e10) < ks);
    }
}
