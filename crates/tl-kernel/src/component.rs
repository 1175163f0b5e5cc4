use crate::error::{KernelError, KernelResult};
use crate::message::MessageQueue;
use crate::model::{CqsType, Definition, InitContext, Model, RunEnv, StepContext};
use crate::parameter::{self, Parameter, ParameterKind, ParameterScope, ParameterValue};
use crate::port::{Port, PortKind};
use crate::system::ComponentSystem;
use serde::Serialize;
use tl_core::{Real, Tolerances, ensure_finite, nearly_equal};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    Unconfigured,
    Configured,
    Initialized,
    Running,
    Finalized,
}

/// How often a child steps relative to its parent's timestep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StepRate {
    Every,
    /// Finer: this many sub-steps per parent step.
    Substeps(u64),
    /// Coarser: one step every N parent steps.
    EveryNth(u64),
}

/// Kernel-side wrapper around one model instance.
pub struct Component {
    name: String,
    type_name: String,
    path: String,
    cqs: CqsType,
    model: Box<dyn Model>,
    pub(crate) ports: Vec<Port>,
    parameters: Vec<Parameter>,
    resolved: Vec<ParameterValue>,
    timestep_override: Option<Real>,
    state: LifecycleState,
    rate: StepRate,
    dt: Real,
    time: Real,
}

#[derive(Clone, Debug, Serialize)]
pub struct PortInfo {
    pub name: String,
    pub kind: PortKind,
    pub node_type: String,
    pub required: bool,
    pub description: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ComponentInfo {
    pub type_name: String,
    pub cqs: CqsType,
    pub description: String,
    pub ports: Vec<PortInfo>,
    pub parameters: Vec<Parameter>,
}

pub(crate) fn check_name(name: &str) -> KernelResult<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.contains(['/', '#', '.']) {
        Some("name may not contain '/', '#' or '.'")
    } else if name.chars().any(char::is_whitespace) {
        Some("name may not contain whitespace")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(KernelError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

impl Component {
    /// Wrap `model` and run its `configure`.
    pub fn new(name: &str, type_name: &str, mut model: Box<dyn Model>) -> KernelResult<Self> {
        check_name(name)?;
        let cqs = model.cqs_type();
        let mut def = Definition::new(cqs);
        model.configure(&mut def);
        let Definition {
            ports, parameters, ..
        } = def;

        for (i, p) in ports.iter().enumerate() {
            check_name(p.name())?;
            if ports[..i].iter().any(|q| q.name() == p.name()) {
                return Err(KernelError::DuplicateName {
                    what: "port",
                    name: format!("{name}.{}", p.name()),
                });
            }
            if cqs == CqsType::Signal && p.kind() == PortKind::Power {
                return Err(KernelError::InvalidConfig {
                    what: format!("signal component '{name}' declares power port '{}'", p.name()),
                });
            }
        }
        for (i, p) in parameters.iter().enumerate() {
            if parameters[..i].iter().any(|q| q.name == p.name) {
                return Err(KernelError::DuplicateName {
                    what: "parameter",
                    name: format!("{name}.{}", p.name),
                });
            }
        }

        Ok(Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            path: name.to_string(),
            cqs,
            model,
            ports,
            parameters,
            resolved: Vec::new(),
            timestep_override: None,
            state: LifecycleState::Configured,
            rate: StepRate::Every,
            dt: 0.0,
            time: 0.0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Slash-separated path from the root system, e.g. `"Sub/Inner"`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn cqs_type(&self) -> CqsType {
        self.cqs
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name() == name)
    }

    pub fn port_index(&self, name: &str) -> Option<usize> {
        self.ports.iter().position(|p| p.name() == name)
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Effective timestep of the current run.
    pub fn timestep(&self) -> Real {
        self.dt
    }

    /// Component-local time at the end of its last step.
    pub fn time(&self) -> Real {
        self.time
    }

    pub fn timestep_override(&self) -> Option<Real> {
        self.timestep_override
    }

    pub fn set_timestep_override(&mut self, dt: Option<Real>) -> KernelResult<()> {
        if let Some(dt) = dt {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(KernelError::InvalidConfig {
                    what: format!("timestep of '{}' must be positive, got {dt}", self.name),
                });
            }
        }
        self.timestep_override = dt;
        Ok(())
    }

    pub fn as_system(&self) -> Option<&ComponentSystem> {
        self.model.as_system()
    }

    pub fn as_system_mut(&mut self) -> Option<&mut ComponentSystem> {
        self.model.as_system_mut()
    }

    /// Set a parameter, a `"<port>#<Variable>"` start value, or a system parameter of a subsystem.
    pub fn set_parameter(&mut self, name: &str, value: &str) -> KernelResult<()> {
        let invalid = |reason: String| KernelError::InvalidParameterValue {
            component: self.name.clone(),
            parameter: name.to_string(),
            value: value.to_string(),
            reason,
        };

        if let Some((port_name, var)) = name.split_once('#') {
            let (port_idx, slot) = self.start_value_slot(port_name, var, name)?;
            let unit = self.ports[port_idx].node_type().variables()[slot].unit;
            parameter::validate(ParameterKind::Real, unit, value).map_err(invalid)?;
            self.ports[port_idx].start_text[slot] = Some(value.trim().to_string());
            return Ok(());
        }

        if let Some(idx) = self.parameters.iter().position(|p| p.name == name) {
            let p = &self.parameters[idx];
            parameter::validate(p.kind, p.unit, value).map_err(invalid)?;
            self.parameters[idx].value = value.trim().to_string();
            return Ok(());
        }

        let component = self.name.clone();
        match self.model.as_system_mut() {
            Some(sys) if sys.system_parameter(name).is_some() => {
                sys.set_system_parameter(name, value)
            }
            _ => Err(KernelError::ParameterNotFound {
                component,
                parameter: name.to_string(),
            }),
        }
    }

    /// Current textual value of a parameter or start value.
    pub fn parameter_value(&self, name: &str) -> KernelResult<String> {
        if let Some((port_name, var)) = name.split_once('#') {
            let (port_idx, slot) = self.start_value_slot(port_name, var, name)?;
            let port = &self.ports[port_idx];
            let text = match (&port.start_text[slot], port.default_start(slot)) {
                (Some(t), _) => t.clone(),
                (None, Some(v)) => v.to_string(),
                (None, None) => port.node_type().variables()[slot].default.to_string(),
            };
            return Ok(text);
        }
        if let Some(p) = self.parameters.iter().find(|p| p.name == name) {
            return Ok(p.value.clone());
        }
        match self.model.as_system() {
            Some(sys) => sys
                .system_parameter(name)
                .map(str::to_string)
                .ok_or_else(|| KernelError::ParameterNotFound {
                    component: self.name.clone(),
                    parameter: name.to_string(),
                }),
            None => Err(KernelError::ParameterNotFound {
                component: self.name.clone(),
                parameter: name.to_string(),
            }),
        }
    }

    pub fn describe(&self) -> ComponentInfo {
        ComponentInfo {
            type_name: self.type_name.clone(),
            cqs: self.cqs,
            description: self.model.description().to_string(),
            ports: self
                .ports
                .iter()
                .map(|p| PortInfo {
                    name: p.name().to_string(),
                    kind: p.kind(),
                    node_type: p.node_type().to_string(),
                    required: p.is_required(),
                    description: p.description().to_string(),
                })
                .collect(),
            parameters: self.parameters.clone(),
        }
    }

    fn start_value_slot(&self, port_name: &str, var: &str, full: &str) -> KernelResult<(usize, usize)> {
        let port_idx = self
            .port_index(port_name)
            .ok_or_else(|| KernelError::PortNotFound {
                component: self.name.clone(),
                port: port_name.to_string(),
            })?;
        let slot = self.ports[port_idx]
            .node_type()
            .variable_index(var)
            .map_err(|_| KernelError::ParameterNotFound {
                component: self.name.clone(),
                parameter: full.to_string(),
            })?;
        Ok((port_idx, slot))
    }

    pub(crate) fn check_can_initialize(&self) -> KernelResult<()> {
        match self.state {
            LifecycleState::Configured | LifecycleState::Finalized => Ok(()),
            s => Err(KernelError::Lifecycle {
                what: format!("'{}' is {s:?}; finalize before initializing again", self.path),
            }),
        }
    }

    /// Path, timestep and private nodes for a new run.
    pub(crate) fn prepare(&mut self, parent_path: Option<&str>, parent_dt: Real, messages: &MessageQueue) {
        self.path = match parent_path {
            Some(p) => format!("{p}/{}", self.name),
            None => self.name.clone(),
        };
        let own = self.timestep_override.unwrap_or(parent_dt);
        let (rate, dt) = step_rate(parent_dt, own);
        if !nearly_equal(dt, own, Tolerances::default()) {
            messages.warn(
                self.path.as_str(),
                format!("timestep {own} adjusted to {dt} to align with parent timestep {parent_dt}"),
            );
        }
        self.rate = rate;
        self.dt = dt;
        for p in &mut self.ports {
            p.reset_private();
            if self.model.as_system().is_some() {
                p.written_slots.clear();
            } else {
                p.compute_written_slots();
            }
        }
    }

    pub(crate) fn check_required_ports(&self) -> KernelResult<()> {
        match self
            .ports
            .iter()
            .find(|p| p.is_required() && !p.is_connected() && !p.is_exported())
        {
            Some(p) => Err(KernelError::MissingConnection {
                component: self.path.clone(),
                port: p.name().to_string(),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn resolve_parameters(&mut self, scope: Option<&ParameterScope<'_>>) -> KernelResult<()> {
        let mut resolved = Vec::with_capacity(self.parameters.len());
        for p in &self.parameters {
            let v = parameter::resolve(p.kind, p.unit, &p.value, scope).map_err(|reason| {
                KernelError::UnresolvedParameter {
                    component: self.path.clone(),
                    parameter: p.name.clone(),
                    value: p.value.clone(),
                    reason,
                }
            })?;
            resolved.push(v);
        }
        self.resolved = resolved;

        for port in &mut self.ports {
            for slot in 0..port.start_text.len() {
                let Some(text) = port.start_text[slot].as_deref() else {
                    port.start_resolved[slot] = None;
                    continue;
                };
                let var = &port.node_type().variables()[slot];
                let v = parameter::resolve(ParameterKind::Real, var.unit, text, scope).map_err(
                    |reason| KernelError::UnresolvedParameter {
                        component: self.path.clone(),
                        parameter: format!("{}#{}", port.name(), var.name),
                        value: text.to_string(),
                        reason,
                    },
                )?;
                port.start_resolved[slot] = Some(v.as_real());
            }
        }
        Ok(())
    }

    /// Seed the private nodes of unlinked input variables with their parameter value.
    pub(crate) fn apply_input_defaults(&self) {
        for (p, v) in self.parameters.iter().zip(&self.resolved) {
            if let Some(port) = p.bound_port.and_then(|i| self.ports.get(i)) {
                if !port.is_linked() {
                    port.node().set(0, v.as_real());
                }
            }
        }
    }

    pub(crate) fn initialize(
        &mut self,
        time: Real,
        env: &RunEnv,
        scope: Option<&ParameterScope<'_>>,
    ) -> KernelResult<()> {
        let ctx = InitContext {
            path: &self.path,
            ports: &self.ports,
            params: &self.resolved,
            time,
            timestep: self.dt,
            env,
            scope,
        };
        self.model.initialize(&ctx)?;
        self.time = time;
        self.state = LifecycleState::Initialized;
        debug!(component = %self.path, dt = self.dt, "initialized");
        Ok(())
    }

    pub(crate) fn step(&mut self, parent_step: u64, parent_time: Real, env: &RunEnv) {
        self.state = LifecycleState::Running;
        match self.rate {
            StepRate::Every => self.step_once(parent_time, env),
            StepRate::Substeps(n) => {
                for i in 0..n {
                    self.step_once(parent_time + i as Real * self.dt, env);
                }
            }
            StepRate::EveryNth(n) => {
                if parent_step % n == 0 {
                    self.step_once(parent_time, env);
                }
            }
        }
        if env.check_finite {
            self.check_finite(env);
        }
    }

    pub(crate) fn finalize(&mut self) {
        if matches!(
            self.state,
            LifecycleState::Initialized | LifecycleState::Running
        ) {
            self.model.finalize();
            self.state = LifecycleState::Finalized;
        }
    }

    fn step_once(&mut self, time: Real, env: &RunEnv) {
        let ctx = StepContext {
            path: &self.path,
            time,
            timestep: self.dt,
            env,
        };
        self.model.simulate_one_timestep(&ctx);
        self.time = time + self.dt;
    }

    fn check_finite(&self, env: &RunEnv) {
        for port in &self.ports {
            for &slot in &port.written_slots {
                let var = port.node_type().variables()[slot].name;
                if let Err(err) = ensure_finite(port.get(slot), var) {
                    let msg = format!("{err} on port {}", port.name());
                    env.messages.error(self.path.as_str(), msg.as_str());
                    env.stop.request_failure(&self.path, &msg);
                    return;
                }
            }
        }
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("path", &self.path)
            .field("type_name", &self.type_name)
            .field("cqs", &self.cqs)
            .field("state", &self.state)
            .finish()
    }
}

/// Step rate and effective timestep of a child wanting `own` under a parent at `parent_dt`.
pub(crate) fn step_rate(parent_dt: Real, own: Real) -> (StepRate, Real) {
    if own < parent_dt {
        let n = (parent_dt / own).round().max(1.0) as u64;
        if n > 1 {
            return (StepRate::Substeps(n), parent_dt / n as Real);
        }
    } else if own > parent_dt {
        let n = (own / parent_dt).round().max(1.0) as u64;
        if n > 1 {
            return (StepRate::EveryNth(n), parent_dt * n as Real);
        }
    }
    (StepRate::Every, parent_dt)
}
