//! tl-kernel: component lifecycle, hierarchical systems and run control.
//!
//! Build a [`ComponentSystem`] from components created through a
//! [`ComponentRegistry`], connect their ports, then `initialize` with a
//! [`SimConfig`] and `simulate`. Each step evaluates Signal components, then
//! C-type, then Q-type; within one phase, independent components may run on a
//! rayon worker pool.

pub mod component;
pub mod config;
pub mod error;
pub mod handles;
pub mod log_data;
pub mod message;
pub mod model;
pub mod parameter;
pub mod plan;
pub mod port;
pub mod registry;
pub mod report;
pub mod system;

pub use component::{Component, ComponentInfo, LifecycleState, PortInfo};
pub use config::SimConfig;
pub use error::{KernelError, KernelResult};
pub use handles::{Progress, ProgressHandle, StopHandle, StopReason};
pub use log_data::{Generation, LogData};
pub use message::{Message, MessageQueue, Severity};
pub use model::{
    CqsType, Definition, InitContext, Model, ParamHandle, PortHandle, PowerVars, StepContext,
};
pub use parameter::{Parameter, ParameterKind, ParameterValue};
pub use plan::ExecutionPlan;
pub use port::{Port, PortKind, Requirement};
pub use registry::{ComponentRegistry, Factory};
pub use report::{RunReport, RunStatus};
pub use system::ComponentSystem;
