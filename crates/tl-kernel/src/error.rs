//! Error types for model construction and run control.

use thiserror::Error;
use tl_node::{NodeError, NodeType};
use tl_solver::SolverError;

pub type KernelResult<T> = Result<T, KernelError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("Unknown component type '{type_name}'")]
    UnknownComponentType { type_name: String },

    #[error("Duplicate {what} name '{name}'")]
    DuplicateName { what: &'static str, name: String },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Component '{name}' not found")]
    ComponentNotFound { name: String },

    #[error("Component '{component}' has no port '{port}'")]
    PortNotFound { component: String, port: String },

    #[error("Cannot connect {a} ({a_type}) to {b} ({b_type}): node types differ")]
    NodeTypeMismatch {
        a: String,
        a_type: NodeType,
        b: String,
        b_type: NodeType,
    },

    #[error("Port {component}.{port} is already connected")]
    PortAlreadyConnected { component: String, port: String },

    #[error("Port {component}.{port} is not connected")]
    PortNotConnected { component: String, port: String },

    #[error("Incompatible ports: {what}")]
    IncompatiblePorts { what: String },

    #[error("Component '{component}' has no parameter '{parameter}'")]
    ParameterNotFound { component: String, parameter: String },

    #[error("Invalid value '{value}' for {component}.{parameter}: {reason}")]
    InvalidParameterValue {
        component: String,
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("Cannot resolve {component}.{parameter} = '{value}': {reason}")]
    UnresolvedParameter {
        component: String,
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("Required port {component}.{port} is not connected")]
    MissingConnection { component: String, port: String },

    #[error("Lifecycle error: {what}")]
    Lifecycle { what: String },

    #[error("Invalid configuration: {what}")]
    InvalidConfig { what: String },

    #[error("Initialization of '{component}' failed: {what}")]
    Initialization { component: String, what: String },

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Solver(#[from] SolverError),
}
