//! Electric circuit elements.

use tl_core::Real;
use tl_kernel::{
    CqsType, Definition, InitContext, KernelResult, Model, ParamHandle, PortHandle, PowerVars,
    StepContext,
};
use tl_node::{NodeType, NodeVar};

#[derive(Debug, Default)]
pub struct VoltageSourceC {
    port: PortHandle,
    input: PortHandle,
    u: NodeVar,
    node: PowerVars,
}

impl Model for VoltageSourceC {
    fn cqs_type(&self) -> CqsType {
        CqsType::C
    }

    fn configure(&mut self, def: &mut Definition) {
        self.input = def.add_input_variable("U", "Voltage", "V", 10.0);
        self.port = def.add_power_port("Pel1", NodeType::Electric);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.u = ctx.signal(self.input)?;
        self.node = ctx.power_vars(self.port)?;
        self.write();
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        self.write();
    }

    fn description(&self) -> &str {
        "Voltage source"
    }
}

impl VoltageSourceC {
    fn write(&self) {
        self.node.wave.set(self.u.get());
        self.node.impedance.set(0.0);
    }
}

/// Capacitor to ground, trapezoidal rule: `Zc = dt / 2C`, `c = U + Zc I`.
#[derive(Debug, Default)]
pub struct CapacitorC {
    port: PortHandle,
    c_h: ParamHandle,
    node: PowerVars,
    zc: Real,
}

impl Model for CapacitorC {
    fn cqs_type(&self) -> CqsType {
        CqsType::C
    }

    fn configure(&mut self, def: &mut Definition) {
        self.port = def.add_power_port("Pel1", NodeType::Electric);
        self.c_h = def.add_parameter("C", "Capacitance", "F", 1e-3);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        let c = ctx.real(self.c_h);
        if c <= 0.0 {
            return Err(ctx.error(format!("C must be positive, got {c}")));
        }
        self.zc = ctx.timestep() / (2.0 * c);
        self.node = ctx.power_vars(self.port)?;
        let (u, i) = (self.node.effort.get(), self.node.flow.get());
        self.node.wave.set(u - self.zc * i);
        self.node.impedance.set(self.zc);
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let (u, i) = (self.node.effort.get(), self.node.flow.get());
        self.node.wave.set(u + self.zc * i);
        self.node.impedance.set(self.zc);
    }

    fn description(&self) -> &str {
        "Capacitor"
    }
}

/// Ohmic resistor; current flows from Pel1 to Pel2.
#[derive(Debug, Default)]
pub struct ResistorQ {
    p1: PortHandle,
    p2: PortHandle,
    r_h: ParamHandle,
    n1: PowerVars,
    n2: PowerVars,
    r: Real,
}

impl Model for ResistorQ {
    fn cqs_type(&self) -> CqsType {
        CqsType::Q
    }

    fn configure(&mut self, def: &mut Definition) {
        self.p1 = def.add_power_port("Pel1", NodeType::Electric);
        self.p2 = def.add_power_port("Pel2", NodeType::Electric);
        self.r_h = def.add_parameter("R", "Resistance", "Ohm", 1.0);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.r = ctx.real(self.r_h);
        if self.r <= 0.0 {
            return Err(ctx.error(format!("R must be positive, got {}", self.r)));
        }
        self.n1 = ctx.power_vars(self.p1)?;
        self.n2 = ctx.power_vars(self.p2)?;
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let (c1, z1) = (self.n1.wave.get(), self.n1.impedance.get());
        let (c2, z2) = (self.n2.wave.get(), self.n2.impedance.get());
        let i2 = (c1 - c2) / (self.r + z1 + z2);
        self.n1.flow.set(-i2);
        self.n1.effort.set(c1 - z1 * i2);
        self.n2.flow.set(i2);
        self.n2.effort.set(c2 + z2 * i2);
    }

    fn description(&self) -> &str {
        "Resistor"
    }
}
