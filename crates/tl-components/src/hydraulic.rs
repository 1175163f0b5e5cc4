//! Hydraulic sources and capacitive volumes.

use crate::common::BULK_MODULUS;
use tl_core::Real;
use tl_kernel::{
    CqsType, Definition, InitContext, KernelResult, Model, ParamHandle, PortHandle, PowerVars,
    StepContext,
};
use tl_node::{NodeType, NodeVar};

/// Imposes a pressure on its node (C-type, zero impedance).
#[derive(Debug, Default)]
pub struct PressureSourceC {
    port: PortHandle,
    input: PortHandle,
    p: NodeVar,
    node: PowerVars,
}

impl Model for PressureSourceC {
    fn cqs_type(&self) -> CqsType {
        CqsType::C
    }

    fn configure(&mut self, def: &mut Definition) {
        self.input = def.add_input_variable("p", "Set pressure", "Pa", 1e5);
        self.port = def.add_power_port("P1", NodeType::Hydraulic);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.p = ctx.signal(self.input)?;
        self.node = ctx.power_vars(self.port)?;
        self.write();
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        self.write();
    }

    fn description(&self) -> &str {
        "Pressure source"
    }
}

impl PressureSourceC {
    fn write(&self) {
        self.node.wave.set(self.p.get());
        self.node.impedance.set(0.0);
    }
}

/// Imposes a volume flow into its neighbour (Q-type).
#[derive(Debug, Default)]
pub struct FlowSourceQ {
    port: PortHandle,
    input: PortHandle,
    q: NodeVar,
    node: PowerVars,
}

impl Model for FlowSourceQ {
    fn cqs_type(&self) -> CqsType {
        CqsType::Q
    }

    fn configure(&mut self, def: &mut Definition) {
        self.input = def.add_input_variable("q", "Set flow", "m^3/s", 1e-3);
        self.port = def.add_power_port("P1", NodeType::Hydraulic);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.q = ctx.signal(self.input)?;
        self.node = ctx.power_vars(self.port)?;
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let q = self.q.get();
        let p = self.node.wave.get() + self.node.impedance.get() * q;
        self.node.flow.set(q);
        self.node.effort.set(p);
    }

    fn description(&self) -> &str {
        "Flow source"
    }
}

/// Two-port volume with compressibility: a short TLM line with numerical damping.
///
/// `Zc = Beta_e * dt / (V * (1 - alpha))`; each end's wave variable is the
/// other end's `c + 2 Zc q` from the previous step, low-pass filtered by `alpha`.
#[derive(Debug, Default)]
pub struct VolumeC {
    p1: PortHandle,
    p2: PortHandle,
    volume: ParamHandle,
    beta: ParamHandle,
    alpha_h: ParamHandle,
    n1: PowerVars,
    n2: PowerVars,
    zc: Real,
    alpha: Real,
}

impl Model for VolumeC {
    fn cqs_type(&self) -> CqsType {
        CqsType::C
    }

    fn configure(&mut self, def: &mut Definition) {
        self.p1 = def.add_power_port("P1", NodeType::Hydraulic);
        self.p2 = def.add_power_port("P2", NodeType::Hydraulic);
        self.volume = def.add_parameter("V", "Volume", "m^3", 1e-3);
        self.beta = def.add_parameter("Beta_e", "Bulk modulus", "Pa", BULK_MODULUS);
        self.alpha_h = def.add_parameter("alpha", "Numerical damping", "", 0.1);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        let v = ctx.real(self.volume);
        let beta = ctx.real(self.beta);
        self.alpha = ctx.real(self.alpha_h);
        if v <= 0.0 || beta <= 0.0 {
            return Err(ctx.error(format!("V ({v}) and Beta_e ({beta}) must be positive")));
        }
        if !(0.0..1.0).contains(&self.alpha) {
            return Err(ctx.error(format!("alpha must be in [0, 1), got {}", self.alpha)));
        }
        self.zc = beta * ctx.timestep() / (v * (1.0 - self.alpha));

        self.n1 = ctx.power_vars(self.p1)?;
        self.n2 = ctx.power_vars(self.p2)?;
        for n in [&self.n1, &self.n2] {
            n.wave.set(n.effort.get() - self.zc * n.flow.get());
            n.impedance.set(self.zc);
        }
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let (c1, q1) = (self.n1.wave.get(), self.n1.flow.get());
        let (c2, q2) = (self.n2.wave.get(), self.n2.flow.get());
        let c10 = c2 + 2.0 * self.zc * q2;
        let c20 = c1 + 2.0 * self.zc * q1;
        let a = self.alpha;
        self.n1.wave.set(a * c1 + (1.0 - a) * c10);
        self.n2.wave.set(a * c2 + (1.0 - a) * c20);
        self.n1.impedance.set(self.zc);
        self.n2.impedance.set(self.zc);
    }

    fn description(&self) -> &str {
        "Hydraulic volume"
    }
}
