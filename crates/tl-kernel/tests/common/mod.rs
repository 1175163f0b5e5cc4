#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use tl_kernel::{
    ComponentRegistry, CqsType, Definition, InitContext, KernelResult, Model, ParamHandle,
    PortHandle, PowerVars, StepContext,
};
use tl_node::{NodeType, NodeVar};

pub type Trace = Arc<Mutex<Vec<(String, f64)>>>;

/// C-type constant pressure.
#[derive(Default)]
pub struct Source {
    port: PortHandle,
    p: ParamHandle,
    vars: PowerVars,
    value: f64,
}

impl Model for Source {
    fn cqs_type(&self) -> CqsType {
        CqsType::C
    }
    fn configure(&mut self, def: &mut Definition) {
        self.port = def.add_power_port("P1", NodeType::Hydraulic);
        self.p = def.add_parameter("p", "Pressure", "Pa", 1e5);
    }
    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.vars = ctx.power_vars(self.port)?;
        self.value = ctx.real(self.p);
        self.vars.wave.set(self.value);
        self.vars.impedance.set(0.0);
        Ok(())
    }
    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        self.vars.wave.set(self.value);
        self.vars.impedance.set(0.0);
    }
}

/// Q-type linear restriction between two hydraulic ports.
#[derive(Default)]
pub struct Restrictor {
    p1: PortHandle,
    p2: PortHandle,
    r: ParamHandle,
    n1: PowerVars,
    n2: PowerVars,
    resistance: f64,
}

impl Model for Restrictor {
    fn cqs_type(&self) -> CqsType {
        CqsType::Q
    }
    fn configure(&mut self, def: &mut Definition) {
        self.p1 = def.add_power_port("P1", NodeType::Hydraulic);
        self.p2 = def.add_power_port("P2", NodeType::Hydraulic);
        self.r = def.add_parameter("R", "Resistance", "Pa s/m^3", 1e9);
    }
    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.n1 = ctx.power_vars(self.p1)?;
        self.n2 = ctx.power_vars(self.p2)?;
        self.resistance = ctx.real(self.r);
        Ok(())
    }
    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let (c1, z1) = (self.n1.wave.get(), self.n1.impedance.get());
        let (c2, z2) = (self.n2.wave.get(), self.n2.impedance.get());
        let q2 = (c1 - c2) / (self.resistance + z1 + z2);
        let q1 = -q2;
        self.n1.flow.set(q1);
        self.n1.effort.set(c1 + z1 * q1);
        self.n2.flow.set(q2);
        self.n2.effort.set(c2 + z2 * q2);
    }
}

/// Records its name and step time into a shared trace.
pub struct Probe {
    pub cqs: CqsType,
    pub trace: Trace,
    out: PortHandle,
    y: NodeVar,
    name: String,
}

impl Probe {
    pub fn new(cqs: CqsType, trace: Trace) -> Self {
        Self {
            cqs,
            trace,
            out: PortHandle::default(),
            y: NodeVar::default(),
            name: String::new(),
        }
    }
}

impl Model for Probe {
    fn cqs_type(&self) -> CqsType {
        self.cqs
    }
    fn configure(&mut self, def: &mut Definition) {
        self.out = def.add_output_variable("out", "Step count");
    }
    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.y = ctx.signal(self.out)?;
        self.name = ctx.path().to_string();
        Ok(())
    }
    fn simulate_one_timestep(&mut self, ctx: &StepContext<'_>) {
        self.y.set(self.y.get() + 1.0);
        self.trace
            .lock()
            .unwrap()
            .push((self.name.clone(), ctx.time()));
    }
}

/// Signal gain, used to build signal chains and loops.
#[derive(Default)]
pub struct Gain {
    input: PortHandle,
    output: PortHandle,
    k: ParamHandle,
    u: NodeVar,
    y: NodeVar,
    gain: f64,
}

impl Model for Gain {
    fn cqs_type(&self) -> CqsType {
        CqsType::Signal
    }
    fn configure(&mut self, def: &mut Definition) {
        self.input = def.add_input_variable("in", "Input", "", 0.0);
        self.output = def.add_output_variable("out", "Output");
        self.k = def.add_parameter("k", "Gain", "", 1.0);
    }
    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.u = ctx.signal(self.input)?;
        self.y = ctx.signal(self.output)?;
        self.gain = ctx.real(self.k);
        Ok(())
    }
    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        self.y.set(self.gain * self.u.get());
    }
}

/// Requests a stop on its n-th step.
#[derive(Default)]
pub struct Trigger {
    n: ParamHandle,
    limit: i64,
    count: i64,
}

impl Model for Trigger {
    fn cqs_type(&self) -> CqsType {
        CqsType::Signal
    }
    fn configure(&mut self, def: &mut Definition) {
        self.n = def.add_integer_parameter("n", "Step to fail on", 3);
    }
    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.limit = ctx.integer(self.n);
        self.count = 0;
        Ok(())
    }
    fn simulate_one_timestep(&mut self, ctx: &StepContext<'_>) {
        self.count += 1;
        if self.count == self.limit {
            ctx.stop_simulation("external resource lost");
        }
    }
}

/// Writes NaN to its output from the second step on.
#[derive(Default)]
pub struct NanWriter {
    out: PortHandle,
    y: NodeVar,
    count: u32,
}

impl Model for NanWriter {
    fn cqs_type(&self) -> CqsType {
        CqsType::Signal
    }
    fn configure(&mut self, def: &mut Definition) {
        self.out = def.add_output_variable("out", "Output");
    }
    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.y = ctx.signal(self.out)?;
        Ok(())
    }
    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        self.count += 1;
        self.y.set(if self.count >= 2 { f64::NAN } else { 1.0 });
    }
}

pub fn registry() -> ComponentRegistry {
    registry_with_trace(Trace::default())
}

pub fn registry_with_trace(trace: Trace) -> ComponentRegistry {
    let mut r = ComponentRegistry::new();
    r.register("Source", || Box::new(Source::default())).unwrap();
    r.register("Restrictor", || Box::new(Restrictor::default())).unwrap();
    r.register("Gain", || Box::new(Gain::default())).unwrap();
    r.register("Trigger", || Box::new(Trigger::default())).unwrap();
    r.register("NanWriter", || Box::new(NanWriter::default())).unwrap();
    for (name, cqs) in [
        ("ProbeC", CqsType::C),
        ("ProbeQ", CqsType::Q),
        ("ProbeS", CqsType::Signal),
    ] {
        let trace = trace.clone();
        r.register(name, move || Box::new(Probe::new(cqs, trace.clone())))
            .unwrap();
    }
    r
}
