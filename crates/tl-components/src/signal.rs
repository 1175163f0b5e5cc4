//! Signal sources, arithmetic, filters and run control.

use std::f64::consts::PI;
use tl_core::limits::limit;
use tl_core::{Real, Tolerances, nearly_equal};
use tl_kernel::{
    CqsType, Definition, InitContext, KernelResult, Model, ParamHandle, PortHandle, StepContext,
};
use tl_node::NodeVar;
use tl_solver::Delay;

#[derive(Debug, Default)]
pub struct Constant {
    out: PortHandle,
    value_h: ParamHandle,
    y: NodeVar,
    value: Real,
}

impl Model for Constant {
    fn cqs_type(&self) -> CqsType {
        CqsType::Signal
    }

    fn configure(&mut self, def: &mut Definition) {
        self.out = def.add_output_variable("out", "Constant value");
        self.value_h = def.add_parameter("y", "Value", "", 1.0);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.value = ctx.real(self.value_h);
        self.y = ctx.signal(self.out)?;
        self.y.set(self.value);
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        self.y.set(self.value);
    }

    fn description(&self) -> &str {
        "Constant"
    }
}

/// Half-cosine ramp from `BaseValue` to `BaseValue + Amplitude` between the two times.
#[derive(Debug, Default)]
pub struct SoftStep {
    out: PortHandle,
    params: [ParamHandle; 4],
    y: NodeVar,
    start: Real,
    stop: Real,
    base: Real,
    amplitude: Real,
}

impl SoftStep {
    pub fn value_at(&self, t: Real) -> Real {
        if t <= self.start {
            self.base
        } else if t < self.stop {
            let omega = PI / (self.stop - self.start);
            self.base + 0.5 * self.amplitude * (1.0 - (omega * (t - self.start)).cos())
        } else {
            self.base + self.amplitude
        }
    }
}

impl Model for SoftStep {
    fn cqs_type(&self) -> CqsType {
        CqsType::Signal
    }

    fn configure(&mut self, def: &mut Definition) {
        self.out = def.add_output_variable("out", "Step signal");
        self.params = [
            def.add_parameter("StartTime", "Start of the ramp", "s", 1.0),
            def.add_parameter("StopTime", "End of the ramp", "s", 2.0),
            def.add_parameter("BaseValue", "Value before the ramp", "", 0.0),
            def.add_parameter("Amplitude", "Step height", "", 1.0),
        ];
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        [self.start, self.stop, self.base, self.amplitude] = self.params.map(|h| ctx.real(h));
        if self.stop <= self.start {
            return Err(ctx.error(format!(
                "StopTime ({}) must be after StartTime ({})",
                self.stop, self.start
            )));
        }
        self.y = ctx.signal(self.out)?;
        self.y.set(self.value_at(ctx.time()));
        Ok(())
    }

    fn simulate_one_timestep(&mut self, ctx: &StepContext<'_>) {
        self.y.set(self.value_at(ctx.time()));
    }

    fn description(&self) -> &str {
        "Soft step"
    }
}

#[derive(Debug, Default)]
pub struct Gain {
    input: PortHandle,
    out: PortHandle,
    k_h: ParamHandle,
    u: NodeVar,
    y: NodeVar,
    k: Real,
}

impl Model for Gain {
    fn cqs_type(&self) -> CqsType {
        CqsType::Signal
    }

    fn configure(&mut self, def: &mut Definition) {
        self.input = def.add_input_variable("in", "Input", "", 0.0);
        self.out = def.add_output_variable("out", "Output");
        self.k_h = def.add_parameter("k", "Gain", "", 1.0);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.k = ctx.real(self.k_h);
        self.u = ctx.signal(self.input)?;
        self.y = ctx.signal(self.out)?;
        self.y.set(self.k * self.u.get());
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        self.y.set(self.k * self.u.get());
    }

    fn description(&self) -> &str {
        "Gain"
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Operator {
    #[default]
    Add,
    Subtract,
}

/// `out = in1 + in2` or `out = in1 - in2`.
#[derive(Debug, Default)]
pub struct Summation {
    op: Operator,
    ports: [PortHandle; 3],
    vars: [NodeVar; 3],
}

impl Summation {
    pub fn add() -> Self {
        Self::default()
    }

    pub fn subtract() -> Self {
        Self {
            op: Operator::Subtract,
            ..Self::default()
        }
    }

    fn evaluate(&self) {
        let [a, b, y] = &self.vars;
        let v = match self.op {
            Operator::Add => a.get() + b.get(),
            Operator::Subtract => a.get() - b.get(),
        };
        y.set(v);
    }
}

impl Model for Summation {
    fn cqs_type(&self) -> CqsType {
        CqsType::Signal
    }

    fn configure(&mut self, def: &mut Definition) {
        self.ports = [
            def.add_input_variable("in1", "First operand", "", 0.0),
            def.add_input_variable("in2", "Second operand", "", 0.0),
            def.add_output_variable("out", "Result"),
        ];
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        for (var, port) in self.vars.iter_mut().zip(self.ports) {
            *var = ctx.signal(port)?;
        }
        self.evaluate();
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        self.evaluate();
    }

    fn description(&self) -> &str {
        match self.op {
            Operator::Add => "Sum of two signals",
            Operator::Subtract => "Difference of two signals",
        }
    }
}

/// `k / (1 + s/wc)`, discretized with the bilinear transform and limited to `[ymin, ymax]`.
#[derive(Debug, Default)]
pub struct FirstOrderFilter {
    input: PortHandle,
    out: PortHandle,
    params: [ParamHandle; 4],
    u: NodeVar,
    y: NodeVar,
    k: Real,
    a: Real,
    ymin: Real,
    ymax: Real,
    history: Option<(Delay, Delay)>,
}

impl FirstOrderFilter {
    /// One filter step from the previous input and output.
    fn next(&self, u: Real, u_prev: Real, y_prev: Real) -> Real {
        let y = (self.k * (u + u_prev) - (1.0 - self.a) * y_prev) / (1.0 + self.a);
        limit(y, self.ymin, self.ymax)
    }
}

impl Model for FirstOrderFilter {
    fn cqs_type(&self) -> CqsType {
        CqsType::Signal
    }

    fn configure(&mut self, def: &mut Definition) {
        self.input = def.add_input_variable("in", "Input", "", 0.0);
        self.out = def.add_output_variable("out", "Filtered output");
        self.params = [
            def.add_parameter("k", "Static gain", "", 1.0),
            def.add_parameter("wc", "Break frequency", "rad/s", 1000.0),
            def.add_parameter("y_min", "Lower output limit", "", -1e300),
            def.add_parameter("y_max", "Upper output limit", "", 1e300),
        ];
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        let [k, wc, ymin, ymax] = self.params.map(|h| ctx.real(h));
        if wc <= 0.0 || ymin > ymax {
            return Err(ctx.error("wc must be positive and y_min <= y_max"));
        }
        self.k = k;
        self.a = 2.0 / (wc * ctx.timestep());
        self.ymin = ymin;
        self.ymax = ymax;
        self.u = ctx.signal(self.input)?;
        self.y = ctx.signal(self.out)?;
        let y0 = limit(self.y.get(), ymin, ymax);
        self.y.set(y0);
        self.history = Some((Delay::new(1, self.u.get())?, Delay::new(1, y0)?));
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        let Some((u_hist, y_hist)) = self.history.as_ref() else {
            return;
        };
        let u = self.u.get();
        let y = self.next(u, u_hist.newest(), y_hist.newest());
        self.y.set(y);
        if let Some((u_hist, y_hist)) = self.history.as_mut() {
            u_hist.update(u);
            y_hist.update(y);
        }
    }

    fn description(&self) -> &str {
        "First order low-pass filter"
    }
}

/// Pure transport delay of `deltat`, rounded to whole timesteps (at least one).
#[derive(Debug, Default)]
pub struct TimeDelay {
    input: PortHandle,
    out: PortHandle,
    delay_h: ParamHandle,
    u: NodeVar,
    y: NodeVar,
    buffer: Option<Delay>,
}

impl Model for TimeDelay {
    fn cqs_type(&self) -> CqsType {
        CqsType::Signal
    }

    fn configure(&mut self, def: &mut Definition) {
        self.input = def.add_input_variable("in", "Input", "", 0.0);
        self.out = def.add_output_variable("out", "Delayed input");
        self.delay_h = def.add_parameter("deltat", "Time delay", "s", 1e-3);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        let deltat = ctx.real(self.delay_h);
        if deltat < 0.0 {
            return Err(ctx.error(format!("deltat must be non-negative, got {deltat}")));
        }
        self.u = ctx.signal(self.input)?;
        self.y = ctx.signal(self.out)?;
        let buffer = Delay::for_time(deltat, ctx.timestep(), self.u.get())?;
        let exact = deltat / ctx.timestep();
        if !nearly_equal(exact, buffer.steps() as Real, Tolerances::default()) {
            ctx.warn(format!(
                "delay {deltat} s is not a whole number of steps; using {} steps",
                buffer.steps()
            ));
        }
        self.y.set(buffer.read());
        self.buffer = Some(buffer);
        Ok(())
    }

    fn simulate_one_timestep(&mut self, _ctx: &StepContext<'_>) {
        if let Some(buffer) = self.buffer.as_mut() {
            self.y.set(buffer.update(self.u.get()));
        }
    }

    fn description(&self) -> &str {
        "Time delay"
    }
}

/// Ends the run when its input exceeds 0.5.
#[derive(Debug, Default)]
pub struct StopSimulation {
    input: PortHandle,
    u: NodeVar,
}

impl Model for StopSimulation {
    fn cqs_type(&self) -> CqsType {
        CqsType::Signal
    }

    fn configure(&mut self, def: &mut Definition) {
        self.input = def.add_input_variable("in", "Stop when > 0.5", "", 0.0);
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        self.u = ctx.signal(self.input)?;
        Ok(())
    }

    fn simulate_one_timestep(&mut self, ctx: &StepContext<'_>) {
        let u = self.u.get();
        if u > 0.5 && !ctx.is_stop_requested() {
            ctx.stop_simulation(format!("stop signal {u} at t = {}", ctx.time()));
        }
    }

    fn description(&self) -> &str {
        "Stop simulation"
    }
}
