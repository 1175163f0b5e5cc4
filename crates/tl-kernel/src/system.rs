//! Hierarchical container that owns, orders and steps components.

use crate::component::{Component, check_name};
use crate::config::SimConfig;
use crate::error::{KernelError, KernelResult};
use crate::handles::{ProgressHandle, StopHandle};
use crate::log_data::{LogData, Recorder};
use crate::message::MessageQueue;
use crate::model::{CqsType, Definition, InitContext, Model, RunEnv, StepContext};
use crate::parameter::{self, ParameterScope};
use crate::plan::{ExecutionPlan, PHASES};
use crate::port::{Port, PortKind, Requirement};
use crate::registry::ComponentRegistry;
use crate::report::{RunReport, RunStatus};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tl_core::timing::{AccumulatingTimer, Timer, is_enabled as timing_enabled};
use tl_core::{CompId, Real, step_count};
use tl_node::Node;
use tracing::{debug, info};

const SUBSYSTEM_TYPE: &str = "Subsystem";

#[derive(Debug)]
struct Connection {
    a: (CompId, usize),
    b: (CompId, usize),
    node: Arc<Node>,
}

impl Connection {
    fn touches(&self, end: (CompId, usize)) -> bool {
        self.a == end || self.b == end
    }
}

/// An inner port made visible as a port of this system.
#[derive(Debug)]
struct Export {
    name: String,
    comp: CompId,
    port: usize,
}

#[derive(Clone, Copy, Debug)]
struct RunState {
    start: Real,
    dt: Real,
    total_steps: u64,
    log_every: u64,
}

pub struct ComponentSystem {
    name: String,
    components: Vec<Component>,
    by_name: HashMap<String, CompId>,
    connections: Vec<Connection>,
    exports: Vec<Export>,
    system_params: BTreeMap<String, String>,
    plan: ExecutionPlan,
    plan_dirty: bool,
    sealed: bool,
    initialized: bool,
    env: RunEnv,
    progress: ProgressHandle,
    pool: Option<rayon::ThreadPool>,
    log: LogData,
    recorder: Option<Recorder>,
    run: Option<RunState>,
    dt: Real,
    step: u64,
    last_recorded: Option<u64>,
    timers: [AccumulatingTimer; 3],
}

impl ComponentSystem {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            components: Vec::new(),
            by_name: HashMap::new(),
            connections: Vec::new(),
            exports: Vec::new(),
            system_params: BTreeMap::new(),
            plan: ExecutionPlan::default(),
            plan_dirty: true,
            sealed: false,
            initialized: false,
            env: RunEnv::default(),
            progress: ProgressHandle::new(),
            pool: None,
            log: LogData::default(),
            recorder: None,
            run: None,
            dt: 0.0,
            step: 0,
            last_recorded: None,
            timers: std::array::from_fn(|_| AccumulatingTimer::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ---- model construction ----

    pub fn add_model(&mut self, name: &str, type_name: &str, model: Box<dyn Model>) -> KernelResult<CompId> {
        self.check_topology_change()?;
        if self.by_name.contains_key(name) {
            return Err(KernelError::DuplicateName {
                what: "component",
                name: name.to_string(),
            });
        }
        let component = Component::new(name, type_name, model)?;
        let id = CompId::from_index(self.components.len());
        self.components.push(component);
        self.by_name.insert(name.to_string(), id);
        self.plan_dirty = true;
        debug!(system = %self.name, component = name, type_name, "component added");
        Ok(id)
    }

    pub fn add_component(
        &mut self,
        registry: &ComponentRegistry,
        type_name: &str,
        name: &str,
    ) -> KernelResult<CompId> {
        let model = registry.create(type_name)?;
        self.add_model(name, type_name, model)
    }

    /// Add a fully built system as a child. Its exported ports become the child's ports.
    pub fn add_subsystem(&mut self, name: &str, mut system: ComponentSystem) -> KernelResult<CompId> {
        system.cqs_type()?;
        system.name = name.to_string();
        self.add_model(name, SUBSYSTEM_TYPE, Box::new(system))
    }

    pub fn remove_component(&mut self, name: &str) -> KernelResult<()> {
        self.check_topology_change()?;
        let id = self.id_of(name)?;
        let ends: Vec<usize> = (0..self.components[id.index()].ports.len()).collect();
        for port in ends {
            if self.components[id.index()].ports[port].is_connected() {
                self.disconnect_end((id, port));
            }
        }
        self.exports.retain(|e| e.comp != id);
        self.components.remove(id.index());
        let shift = |c: &mut CompId| {
            if c.index() > id.index() {
                *c = CompId::from_index(c.index() - 1);
            }
        };
        for conn in &mut self.connections {
            shift(&mut conn.a.0);
            shift(&mut conn.b.0);
        }
        for e in &mut self.exports {
            shift(&mut e.comp);
        }
        self.by_name = self
            .components
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name().to_string(), CompId::from_index(i)))
            .collect();
        self.plan_dirty = true;
        Ok(())
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component_id(&self, name: &str) -> Option<CompId> {
        self.by_name.get(name).copied()
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.component_id(name).map(|id| &self.components[id.index()])
    }

    pub fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        let id = self.component_id(name)?;
        Some(&mut self.components[id.index()])
    }

    /// Look up a component by slash-separated path, descending into subsystems.
    pub fn find(&self, path: &str) -> Option<&Component> {
        match path.split_once('/') {
            None => self.component(path),
            Some((head, rest)) => self.component(head)?.as_system()?.find(rest),
        }
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Component> {
        match path.split_once('/') {
            None => self.component_mut(path),
            Some((head, rest)) => self.component_mut(head)?.as_system_mut()?.find_mut(rest),
        }
    }

    pub fn subsystem_mut(&mut self, path: &str) -> Option<&mut ComponentSystem> {
        self.find_mut(path)?.as_system_mut()
    }

    /// Connect two ports through a new shared node.
    ///
    /// Validation happens before anything is created; a failed connect leaves
    /// the model untouched.
    pub fn connect(&mut self, comp_a: &str, port_a: &str, comp_b: &str, port_b: &str) -> KernelResult<()> {
        self.check_topology_change()?;
        let ea = self.endpoint(comp_a, port_a)?;
        let eb = self.endpoint(comp_b, port_b)?;
        if ea == eb {
            return Err(KernelError::IncompatiblePorts {
                what: format!("{comp_a}.{port_a} cannot be connected to itself"),
            });
        }
        let pa = &self.components[ea.0.index()].ports[ea.1];
        let pb = &self.components[eb.0.index()].ports[eb.1];
        for (c, p) in [(comp_a, pa), (comp_b, pb)] {
            if p.is_connected() || p.is_exported() {
                return Err(KernelError::PortAlreadyConnected {
                    component: c.to_string(),
                    port: p.name().to_string(),
                });
            }
        }
        if pa.node_type() != pb.node_type() {
            return Err(KernelError::NodeTypeMismatch {
                a: format!("{comp_a}.{port_a}"),
                a_type: pa.node_type(),
                b: format!("{comp_b}.{port_b}"),
                b_type: pb.node_type(),
            });
        }
        check_port_kinds(pa, pb, &format!("{comp_a}.{port_a}"), &format!("{comp_b}.{port_b}"))?;

        let node = Node::shared(pa.node_type());
        self.components[ea.0.index()].ports[ea.1].connect(node.clone())?;
        self.components[eb.0.index()].ports[eb.1].connect(node.clone())?;
        self.connections.push(Connection { a: ea, b: eb, node });
        self.plan_dirty = true;
        debug!(system = %self.name, "{comp_a}.{port_a} <-> {comp_b}.{port_b}");
        Ok(())
    }

    pub fn disconnect(&mut self, comp: &str, port: &str) -> KernelResult<()> {
        self.check_topology_change()?;
        let end = self.endpoint(comp, port)?;
        if !self.components[end.0.index()].ports[end.1].is_connected() {
            return Err(KernelError::PortNotConnected {
                component: comp.to_string(),
                port: port.to_string(),
            });
        }
        self.disconnect_end(end);
        self.plan_dirty = true;
        Ok(())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether `comp.port` is connected to `other.other_port` at this level.
    pub fn are_connected(&self, comp: &str, port: &str, other: &str, other_port: &str) -> bool {
        match (self.endpoint(comp, port), self.endpoint(other, other_port)) {
            (Ok(a), Ok(b)) => self.connections.iter().any(|c| c.touches(a) && c.touches(b)),
            _ => false,
        }
    }

    /// Expose an inner port as `system_port` of this system. Must precede adding
    /// this system to a parent.
    pub fn export_port(&mut self, system_port: &str, comp: &str, port: &str) -> KernelResult<()> {
        if self.sealed {
            return Err(KernelError::Lifecycle {
                what: format!(
                    "ports of '{}' are fixed once it is part of another system",
                    self.name
                ),
            });
        }
        check_name(system_port)?;
        if self.exports.iter().any(|e| e.name == system_port) {
            return Err(KernelError::DuplicateName {
                what: "system port",
                name: system_port.to_string(),
            });
        }
        let (id, idx) = self.endpoint(comp, port)?;
        let p = &mut self.components[id.index()].ports[idx];
        if p.is_connected() || p.is_exported() {
            return Err(KernelError::PortAlreadyConnected {
                component: comp.to_string(),
                port: port.to_string(),
            });
        }
        p.exported = true;
        self.exports.push(Export {
            name: system_port.to_string(),
            comp: id,
            port: idx,
        });
        Ok(())
    }

    /// Role this system takes in its parent, derived from its exported power ports.
    pub fn cqs_type(&self) -> KernelResult<CqsType> {
        let mut role = None;
        for e in &self.exports {
            let p = &self.components[e.comp.index()].ports[e.port];
            if p.kind() != PortKind::Power {
                continue;
            }
            match role {
                None => role = Some(p.role()),
                Some(r) if r != p.role() => {
                    return Err(KernelError::InvalidConfig {
                        what: format!(
                            "system '{}' exports both {r}-type and {}-type power ports",
                            self.name,
                            p.role()
                        ),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(role.unwrap_or(CqsType::Signal))
    }

    pub fn set_parameter(&mut self, path: &str, name: &str, value: &str) -> KernelResult<()> {
        self.find_mut(path)
            .ok_or_else(|| KernelError::ComponentNotFound {
                name: path.to_string(),
            })?
            .set_parameter(name, value)
    }

    pub fn parameter(&self, path: &str, name: &str) -> KernelResult<String> {
        self.find(path)
            .ok_or_else(|| KernelError::ComponentNotFound {
                name: path.to_string(),
            })?
            .parameter_value(name)
    }

    /// Define or change a parameter visible to every component below this system.
    pub fn set_system_parameter(&mut self, name: &str, value: &str) -> KernelResult<()> {
        let v = value.trim();
        let literal = tl_core::units::split_quantity(v).is_some() || matches!(v, "true" | "false");
        if !parameter::is_identifier(name) {
            return Err(KernelError::InvalidName {
                name: name.to_string(),
                reason: "system parameter names must be identifiers",
            });
        }
        if !literal && !parameter::is_identifier(v) {
            return Err(KernelError::InvalidParameterValue {
                component: self.name.clone(),
                parameter: name.to_string(),
                value: value.to_string(),
                reason: "expected a number, boolean or parameter name".to_string(),
            });
        }
        self.system_params.insert(name.to_string(), v.to_string());
        Ok(())
    }

    pub fn system_parameter(&self, name: &str) -> Option<&str> {
        self.system_params.get(name).map(String::as_str)
    }

    pub fn set_timestep(&mut self, path: &str, dt: Option<Real>) -> KernelResult<()> {
        self.find_mut(path)
            .ok_or_else(|| KernelError::ComponentNotFound {
                name: path.to_string(),
            })?
            .set_timestep_override(dt)
    }

    // ---- run control ----

    /// Prepare a run from `start` to `stop` with timestep `dt`.
    pub fn initialize(&mut self, start: Real, dt: Real, stop: Real, config: &SimConfig) -> KernelResult<()> {
        if !(start.is_finite() && stop.is_finite() && dt.is_finite() && dt > 0.0 && stop >= start) {
            return Err(KernelError::InvalidConfig {
                what: format!("invalid time span: start={start}, dt={dt}, stop={stop}"),
            });
        }
        if self.initialized {
            return Err(KernelError::Lifecycle {
                what: format!("'{}' is already initialized; finalize first", self.name),
            });
        }
        let timer = Timer::start("initialize");

        self.env.stop.reset();
        self.env.check_finite = config.check_finite;
        self.env.singular_streak_limit = config.singular_streak_limit.max(1);
        self.pool = if config.multicore {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .thread_name(|i| format!("tl-worker-{i}"))
                .build()
                .map_err(|e| KernelError::InvalidConfig {
                    what: format!("cannot build worker pool: {e}"),
                })?;
            Some(pool)
        } else {
            None
        };
        self.log.set_max_generations(config.max_generations);
        for t in &self.timers {
            t.reset();
        }

        if let Err(e) = self.init_level(None, dt, start, None) {
            self.abandon_initialize();
            return Err(e);
        }

        let total_steps = step_count(stop - start, dt) as u64;
        self.run = Some(RunState {
            start,
            dt,
            total_steps,
            log_every: config.log_every.max(1) as u64,
        });

        let ports = self.log_ports();
        self.recorder = Some(self.log.begin(ports.iter().map(|(c, p, n)| (c.clone(), p.clone(), n))));
        self.record(start);
        self.progress.start(total_steps, start);

        self.env.messages.info(
            self.name.as_str(),
            format!(
                "initialized {} components, {total_steps} steps of {dt} s",
                self.components.len()
            ),
        );
        if let Some(s) = timer.stop() {
            info!(system = %self.name, seconds = s, "initialize timing");
        }
        Ok(())
    }

    /// Run until the stop time, a stop request or a component failure.
    pub fn simulate(&mut self) -> KernelResult<RunReport> {
        let run = self.run_state()?;
        let wall = Instant::now();
        info!(system = %self.name, steps = run.total_steps, "simulation started");

        while self.step < run.total_steps && !self.env.stop.is_stop_requested() {
            self.advance(run);
        }
        if self.last_recorded != Some(self.step) {
            self.record(self.time());
        }
        self.progress.finish();

        let report = self.report(run, wall.elapsed().as_secs_f64());
        match &report.status {
            RunStatus::Completed => self.env.messages.info(self.name.as_str(), "simulation completed"),
            RunStatus::Aborted => self.env.messages.warn(
                self.name.as_str(),
                format!("simulation aborted at t = {}", report.final_time),
            ),
            RunStatus::Failed { component, message } => self.env.messages.error(
                self.name.as_str(),
                format!("simulation failed at t = {} in {component}: {message}", report.final_time),
            ),
        }
        if timing_enabled() {
            for (phase, t) in PHASES.iter().zip(&self.timers) {
                info!(phase = %phase, seconds = t.total_seconds(), calls = t.count(), "phase timing");
            }
        }
        Ok(report)
    }

    /// Advance one step. Returns `false` when the run is over or stopped.
    pub fn simulate_one_timestep(&mut self) -> KernelResult<bool> {
        let run = self.run_state()?;
        if self.step >= run.total_steps || self.env.stop.is_stop_requested() {
            return Ok(false);
        }
        self.advance(run);
        Ok(true)
    }

    /// Request cooperative cancellation at the next step boundary.
    pub fn stop(&self) {
        self.env.stop.request_stop();
    }

    pub fn finalize(&mut self) {
        for c in &mut self.components {
            c.finalize();
        }
        self.initialized = false;
        self.run = None;
        self.recorder = None;
        self.pool = None;
        self.progress.finish();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Time at the end of the last completed step.
    pub fn time(&self) -> Real {
        match self.run {
            Some(r) => r.start + self.step as Real * r.dt,
            None => 0.0,
        }
    }

    pub fn steps_completed(&self) -> u64 {
        self.step
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.env.stop.clone()
    }

    pub fn progress_handle(&self) -> ProgressHandle {
        self.progress.clone()
    }

    pub fn messages(&self) -> &MessageQueue {
        &self.env.messages
    }

    pub fn log_data(&self) -> &LogData {
        &self.log
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    // ---- internals ----

    fn check_topology_change(&self) -> KernelResult<()> {
        if self.initialized {
            return Err(KernelError::Lifecycle {
                what: format!("topology of '{}' cannot change during a run", self.name),
            });
        }
        Ok(())
    }

    fn id_of(&self, name: &str) -> KernelResult<CompId> {
        self.component_id(name)
            .ok_or_else(|| KernelError::ComponentNotFound {
                name: name.to_string(),
            })
    }

    fn endpoint(&self, comp: &str, port: &str) -> KernelResult<(CompId, usize)> {
        let id = self.id_of(comp)?;
        let idx = self.components[id.index()]
            .port_index(port)
            .ok_or_else(|| KernelError::PortNotFound {
                component: comp.to_string(),
                port: port.to_string(),
            })?;
        Ok((id, idx))
    }

    fn disconnect_end(&mut self, end: (CompId, usize)) {
        if let Some(pos) = self.connections.iter().position(|c| c.touches(end)) {
            let conn = self.connections.remove(pos);
            for (id, port) in [conn.a, conn.b] {
                self.components[id.index()].ports[port].disconnect();
            }
        }
    }

    fn rebuild_plan(&mut self) {
        let roles: Vec<CqsType> = self.components.iter().map(Component::cqs_type).collect();
        let edges: Vec<(usize, usize)> = self
            .connections
            .iter()
            .filter_map(|c| {
                let ka = self.components[c.a.0.index()].ports[c.a.1].kind();
                match ka {
                    PortKind::Write => Some((c.a.0.index(), c.b.0.index())),
                    PortKind::Read => Some((c.b.0.index(), c.a.0.index())),
                    PortKind::Power => None,
                }
            })
            .collect();
        self.plan = ExecutionPlan::build(&roles, &edges);
        if !self.plan.cyclic.is_empty() {
            let names: Vec<&str> = self
                .plan
                .cyclic
                .iter()
                .map(|&i| self.components[i].name())
                .collect();
            self.env.messages.warn(
                self.name.as_str(),
                format!(
                    "algebraic signal loop through [{}]; broken at its first member",
                    names.join(", ")
                ),
            );
        }
        self.plan_dirty = false;
        debug!(system = %self.name, levels = self.plan.levels().count(), "execution plan rebuilt");
    }

    /// Initialize every child of this level, in plan order.
    fn init_level(
        &mut self,
        parent_path: Option<&str>,
        dt: Real,
        t0: Real,
        parent_scope: Option<&ParameterScope<'_>>,
    ) -> KernelResult<()> {
        for c in &self.components {
            c.check_can_initialize()?;
        }
        if self.plan_dirty || self.plan.len() != self.components.len() {
            self.rebuild_plan();
        }

        let messages = self.env.messages.clone();
        for c in &mut self.components {
            c.prepare(parent_path, dt, &messages);
        }
        for c in &self.components {
            c.check_required_ports()?;
        }

        let scope = ParameterScope::new(&self.system_params, parent_scope);
        for c in &mut self.components {
            c.resolve_parameters(Some(&scope))?;
        }
        self.load_start_values();

        for idx in self.plan.order() {
            self.components[idx].initialize(t0, &self.env, Some(&scope))?;
        }

        self.dt = dt;
        self.step = 0;
        self.initialized = true;
        Ok(())
    }

    fn abandon_initialize(&mut self) {
        for c in &mut self.components {
            c.finalize();
        }
        self.initialized = false;
        self.run = None;
        self.pool = None;
    }

    /// Seed every node of this level with start values.
    ///
    /// Wave/impedance slots come from the C side, the rest from the Q side
    /// (or the writer of a signal); either side's explicit value beats any default.
    fn load_start_values(&self) {
        for conn in &self.connections {
            let pa = &self.components[conn.a.0.index()].ports[conn.a.1];
            let pb = &self.components[conn.b.0.index()].ports[conn.b.1];
            seed_node(&conn.node, pa, Some(pb));
        }
        for c in &self.components {
            for p in &c.ports {
                if p.is_exported() {
                    seed_exported(p);
                } else if !p.is_connected() {
                    seed_node(p.node(), p, None);
                }
            }
            c.apply_input_defaults();
        }
    }

    fn run_state(&self) -> KernelResult<RunState> {
        match (self.initialized, self.run) {
            (true, Some(run)) => Ok(run),
            _ => Err(KernelError::Lifecycle {
                what: format!("'{}' must be initialized before simulating", self.name),
            }),
        }
    }

    fn advance(&mut self, run: RunState) {
        let t = run.start + self.step as Real * run.dt;
        self.run_step(self.step, t);
        self.step += 1;
        let t_end = self.time();
        self.progress.update(self.step, t_end);
        if self.step % run.log_every == 0 || self.step == run.total_steps {
            self.record(t_end);
        }
    }

    /// One step of every child: Signal phase, then C, then Q, level by level.
    fn run_step(&mut self, step: u64, time: Real) {
        let Self {
            components,
            plan,
            env,
            pool,
            timers,
            ..
        } = self;
        let env: &RunEnv = env;
        for (phase, timer) in plan.phases.iter().zip(timers.iter()) {
            let t = Timer::start("phase");
            for level in phase {
                let mut members = select_mut(components, level);
                match pool.as_ref() {
                    Some(pool) if members.len() > 1 => pool.install(|| {
                        members
                            .par_iter_mut()
                            .for_each(|c| c.step(step, time, env));
                    }),
                    _ => {
                        for c in members {
                            c.step(step, time, env);
                        }
                    }
                }
            }
            timer.record_timer(t);
        }
    }

    fn record(&mut self, time: Real) {
        if let (Some(rec), Some(generation)) = (&self.recorder, self.log.current_mut()) {
            rec.sample(generation, time);
            self.last_recorded = Some(self.step);
        }
    }

    fn log_ports(&self) -> Vec<(String, String, Arc<Node>)> {
        let mut out = Vec::new();
        for c in &self.components {
            for p in c.ports() {
                out.push((c.path().to_string(), p.name().to_string(), p.node().clone()));
            }
            if let Some(sys) = c.as_system() {
                out.extend(sys.log_ports());
            }
        }
        out
    }

    fn report(&self, run: RunState, wall_time_s: Real) -> RunReport {
        let status = match self.env.stop.reason() {
            Some(r) => RunStatus::Failed {
                component: r.component,
                message: r.message,
            },
            None if self.env.stop.is_stop_requested() && self.step < run.total_steps => {
                RunStatus::Aborted
            }
            None => RunStatus::Completed,
        };
        RunReport {
            status,
            steps_completed: self.step,
            total_steps: run.total_steps,
            final_time: self.time(),
            generation: self.log.latest().map(|g| g.number()),
            wall_time_s,
        }
    }
}

fn check_port_kinds(pa: &Port, pb: &Port, a: &str, b: &str) -> KernelResult<()> {
    use PortKind::*;
    match (pa.kind(), pb.kind()) {
        (Power, Power) => {
            if pa.role() == pb.role() {
                return Err(KernelError::IncompatiblePorts {
                    what: format!("{a} and {b} are both {}-type", pa.role()),
                });
            }
            Ok(())
        }
        (Write, Read) | (Read, Write) => Ok(()),
        (Write, Write) => Err(KernelError::IncompatiblePorts {
            what: format!("{a} and {b} are both outputs"),
        }),
        (Read, Read) => Err(KernelError::IncompatiblePorts {
            what: format!("{a} and {b} are both inputs"),
        }),
        _ => Err(KernelError::IncompatiblePorts {
            what: format!("{a} and {b} mix power and signal ports"),
        }),
    }
}

fn seed_node(node: &Node, a: &Port, b: Option<&Port>) {
    for (slot, desc) in node.node_type().variables().iter().enumerate() {
        let (first, second) = match b {
            Some(b) if b.owns_slot(slot) && !a.owns_slot(slot) => (b, Some(a)),
            _ => (a, b),
        };
        let v = first
            .start_value(slot)
            .or_else(|| second.and_then(|p| p.start_value(slot)))
            .or_else(|| first.default_start(slot))
            .or_else(|| second.and_then(|p| p.default_start(slot)))
            .unwrap_or(desc.default);
        node.set(slot, v);
    }
}

/// The outer level has seeded the node; an exported port adds its explicit values.
fn seed_exported(p: &Port) {
    for slot in 0..p.node_type().num_slots() {
        if let Some(v) = p.start_value(slot) {
            if !p.is_linked() || p.owns_slot(slot) {
                p.node().set(slot, v);
            }
        }
    }
}

/// Mutable references to `items[i]` for ascending `indices`.
fn select_mut<'a>(items: &'a mut [Component], indices: &[usize]) -> Vec<&'a mut Component> {
    let mut want = indices.iter().copied().peekable();
    let mut out = Vec::with_capacity(indices.len());
    for (i, item) in items.iter_mut().enumerate() {
        if want.peek() == Some(&i) {
            out.push(item);
            want.next();
        }
    }
    out
}

impl Model for ComponentSystem {
    fn cqs_type(&self) -> CqsType {
        ComponentSystem::cqs_type(self).unwrap_or(CqsType::Signal)
    }

    fn configure(&mut self, def: &mut Definition) {
        self.sealed = true;
        for e in &self.exports {
            let inner = &self.components[e.comp.index()].ports[e.port];
            let requirement = if inner.is_required() {
                Requirement::Required
            } else {
                Requirement::NotRequired
            };
            let mut port = Port::new(
                &e.name,
                inner.kind(),
                inner.node_type(),
                inner.role(),
                requirement,
                inner.description(),
            );
            port.start_default.clone_from(&inner.start_default);
            def.push_port(port);
        }
    }

    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()> {
        for (e, outer) in self.exports.iter().zip(ctx.ports) {
            self.components[e.comp.index()].ports[e.port]
                .attach_external(outer.node().clone(), outer.is_linked())?;
        }
        self.env = ctx.env.clone();
        let result = self.init_level(Some(ctx.path), ctx.timestep, ctx.time, ctx.scope);
        if result.is_err() {
            self.abandon_initialize();
        }
        result
    }

    fn simulate_one_timestep(&mut self, ctx: &StepContext<'_>) {
        self.run_step(self.step, ctx.time());
        self.step += 1;
    }

    fn finalize(&mut self) {
        ComponentSystem::finalize(self);
    }

    fn description(&self) -> &str {
        "Hierarchical component system"
    }

    fn as_system(&self) -> Option<&ComponentSystem> {
        Some(self)
    }

    fn as_system_mut(&mut self) -> Option<&mut ComponentSystem> {
        Some(self)
    }
}

impl std::fmt::Debug for ComponentSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSystem")
            .field("name", &self.name)
            .field("components", &self.components)
            .field("connections", &self.connections.len())
            .field("initialized", &self.initialized)
            .finish()
    }
}
