//! The fixed component lifecycle and the contexts handed to it.
//!
//! A component type implements [`Model`]. The kernel calls `configure` once
//! to collect ports and parameters into a [`Definition`], `initialize` once
//! per run with an [`InitContext`], `simulate_one_timestep` once per step
//! with a [`StepContext`], and `finalize` when the run ends.

use crate::error::{KernelError, KernelResult};
use crate::handles::StopHandle;
use crate::message::MessageQueue;
use crate::parameter::{Parameter, ParameterKind, ParameterScope, ParameterValue};
use crate::port::{Port, PortKind, Requirement};
use crate::system::ComponentSystem;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tl_core::Real;
use tl_node::{Node, NodeType, NodeVar, NodeVariable, Signal};

/// Execution role in the bilateral TLM decomposition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CqsType {
    /// Publishes wave variable and characteristic impedance.
    C,
    /// Resolves effort and flow from the neighbours' wave variables.
    Q,
    /// Pure signal function.
    Signal,
}

impl fmt::Display for CqsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CqsType::C => "C",
            CqsType::Q => "Q",
            CqsType::Signal => "S",
        };
        f.write_str(s)
    }
}

pub trait Model: Send {
    fn cqs_type(&self) -> CqsType;

    /// Declare ports and parameters. Purely structural.
    fn configure(&mut self, def: &mut Definition);

    /// Latch parameters, resolve node handles and seed internal state.
    fn initialize(&mut self, ctx: &InitContext<'_>) -> KernelResult<()>;

    fn simulate_one_timestep(&mut self, ctx: &StepContext<'_>);

    fn finalize(&mut self) {}

    fn description(&self) -> &str {
        ""
    }

    fn as_system(&self) -> Option<&ComponentSystem> {
        None
    }

    fn as_system_mut(&mut self) -> Option<&mut ComponentSystem> {
        None
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PortHandle(pub(crate) usize);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParamHandle(pub(crate) usize);

/// Collects the ports and parameters a model declares in `configure`.
#[derive(Debug)]
pub struct Definition {
    cqs: CqsType,
    pub(crate) ports: Vec<Port>,
    pub(crate) parameters: Vec<Parameter>,
}

impl Definition {
    pub(crate) fn new(cqs: CqsType) -> Self {
        Self {
            cqs,
            ports: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn add_power_port(&mut self, name: &str, node_type: NodeType) -> PortHandle {
        self.push_port(Port::new(
            name,
            PortKind::Power,
            node_type,
            self.cqs,
            Requirement::Required,
            "",
        ))
    }

    pub fn add_optional_power_port(&mut self, name: &str, node_type: NodeType) -> PortHandle {
        self.push_port(Port::new(
            name,
            PortKind::Power,
            node_type,
            self.cqs,
            Requirement::NotRequired,
            "",
        ))
    }

    pub fn add_read_port(&mut self, name: &str, description: &str) -> PortHandle {
        self.push_port(Port::new(
            name,
            PortKind::Read,
            NodeType::Signal,
            CqsType::Signal,
            Requirement::NotRequired,
            description,
        ))
    }

    pub fn add_write_port(&mut self, name: &str, description: &str) -> PortHandle {
        self.push_port(Port::new(
            name,
            PortKind::Write,
            NodeType::Signal,
            CqsType::Signal,
            Requirement::NotRequired,
            description,
        ))
    }

    /// Signal input with a default used while the port is unconnected.
    ///
    /// The default is exposed as a parameter with the same name.
    pub fn add_input_variable(
        &mut self,
        name: &str,
        description: &str,
        unit: &'static str,
        default: Real,
    ) -> PortHandle {
        let port = self.add_read_port(name, description);
        let mut param = Parameter::new(
            name,
            description,
            unit,
            ParameterKind::Real,
            default.to_string(),
        );
        param.bound_port = Some(port.0);
        self.parameters.push(param);
        port
    }

    pub fn add_output_variable(&mut self, name: &str, description: &str) -> PortHandle {
        self.add_write_port(name, description)
    }

    pub fn add_parameter(
        &mut self,
        name: &str,
        description: &str,
        unit: &'static str,
        default: Real,
    ) -> ParamHandle {
        self.push_param(Parameter::new(
            name,
            description,
            unit,
            ParameterKind::Real,
            default.to_string(),
        ))
    }

    pub fn add_integer_parameter(&mut self, name: &str, description: &str, default: i64) -> ParamHandle {
        self.push_param(Parameter::new(
            name,
            description,
            "",
            ParameterKind::Integer,
            default.to_string(),
        ))
    }

    pub fn add_bool_parameter(&mut self, name: &str, description: &str, default: bool) -> ParamHandle {
        self.push_param(Parameter::new(
            name,
            description,
            "",
            ParameterKind::Bool,
            default.to_string(),
        ))
    }

    /// Start value used for `var` on `port` when no `"<port>#<Variable>"` parameter is set.
    pub fn set_default_start_value<V: NodeVariable>(&mut self, port: PortHandle, var: V, value: Real) {
        if let Some(p) = self.ports.get_mut(port.0) {
            if p.node_type() == V::NODE_TYPE {
                p.start_default[var.index()] = Some(value);
            }
        }
    }

    pub(crate) fn push_port(&mut self, port: Port) -> PortHandle {
        self.ports.push(port);
        PortHandle(self.ports.len() - 1)
    }

    fn push_param(&mut self, param: Parameter) -> ParamHandle {
        self.parameters.push(param);
        ParamHandle(self.parameters.len() - 1)
    }
}

/// Per-run environment shared by every component of a root system.
#[derive(Clone, Debug)]
pub(crate) struct RunEnv {
    pub stop: StopHandle,
    pub messages: MessageQueue,
    pub check_finite: bool,
    pub singular_streak_limit: usize,
}

impl Default for RunEnv {
    fn default() -> Self {
        Self {
            stop: StopHandle::new(),
            messages: MessageQueue::new(),
            check_finite: true,
            singular_streak_limit: 50,
        }
    }
}

/// Handles onto the TLM quartet of a power port's node.
#[derive(Clone, Debug, Default)]
pub struct PowerVars {
    pub effort: NodeVar,
    pub flow: NodeVar,
    pub wave: NodeVar,
    pub impedance: NodeVar,
}

pub struct InitContext<'a> {
    pub(crate) path: &'a str,
    pub(crate) ports: &'a [Port],
    pub(crate) params: &'a [ParameterValue],
    pub(crate) time: Real,
    pub(crate) timestep: Real,
    pub(crate) env: &'a RunEnv,
    pub(crate) scope: Option<&'a ParameterScope<'a>>,
}

impl InitContext<'_> {
    pub fn path(&self) -> &str {
        self.path
    }

    pub fn time(&self) -> Real {
        self.time
    }

    pub fn timestep(&self) -> Real {
        self.timestep
    }

    pub fn real(&self, h: ParamHandle) -> Real {
        self.params[h.0].as_real()
    }

    pub fn integer(&self, h: ParamHandle) -> i64 {
        self.params[h.0].as_integer()
    }

    pub fn boolean(&self, h: ParamHandle) -> bool {
        self.params[h.0].as_bool()
    }

    /// Whether the port is wired to another component (directly or through a system port).
    pub fn is_connected(&self, p: PortHandle) -> bool {
        self.ports[p.0].is_linked()
    }

    pub fn port_node(&self, p: PortHandle) -> Arc<Node> {
        self.ports[p.0].node().clone()
    }

    pub fn node_var<V: NodeVariable>(&self, p: PortHandle, var: V) -> KernelResult<NodeVar> {
        NodeVar::typed(self.port_node(p), var).map_err(KernelError::from)
    }

    pub fn signal(&self, p: PortHandle) -> KernelResult<NodeVar> {
        self.node_var(p, Signal::Value)
    }

    pub fn power_vars(&self, p: PortHandle) -> KernelResult<PowerVars> {
        let node = self.port_node(p);
        let slots = node.node_type().power_slots().ok_or_else(|| self.error(format!(
            "port '{}' is not a power port",
            self.ports[p.0].name()
        )))?;
        Ok(PowerVars {
            effort: NodeVar::new(node.clone(), slots.effort)?,
            flow: NodeVar::new(node.clone(), slots.flow)?,
            wave: NodeVar::new(node.clone(), slots.wave)?,
            impedance: NodeVar::new(node, slots.impedance)?,
        })
    }

    pub fn singular_streak_limit(&self) -> usize {
        self.env.singular_streak_limit
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.env.messages.warn(self.path, text);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.env.messages.info(self.path, text);
    }

    /// Initialization failure attributed to this component.
    pub fn error(&self, what: impl Into<String>) -> KernelError {
        KernelError::Initialization {
            component: self.path.to_string(),
            what: what.into(),
        }
    }
}

pub struct StepContext<'a> {
    pub(crate) path: &'a str,
    pub(crate) time: Real,
    pub(crate) timestep: Real,
    pub(crate) env: &'a RunEnv,
}

impl StepContext<'_> {
    pub fn path(&self) -> &str {
        self.path
    }

    /// Time at the beginning of this step.
    pub fn time(&self) -> Real {
        self.time
    }

    pub fn timestep(&self) -> Real {
        self.timestep
    }

    /// Ask the owning system to end the run at the next step boundary.
    pub fn stop_simulation(&self, message: impl Into<String>) {
        let message = message.into();
        self.env.messages.push(
            crate::message::Severity::Error,
            self.path,
            format!("stop requested: {message}"),
        );
        self.env.stop.request_failure(self.path, &message);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.env.stop.is_stop_requested()
    }

    pub fn singular_streak_limit(&self) -> usize {
        self.env.singular_streak_limit
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.env.messages.warn(self.path, text);
    }
}
