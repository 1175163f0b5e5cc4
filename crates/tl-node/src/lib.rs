//! tl-node: typed shared data slots between two connected ports.
//!
//! A [`Node`] holds a fixed set of scalar variables determined by its
//! [`NodeType`]. Nodes are shared behind `Arc` by the two connected
//! components; each slot is written by exactly one side.

pub mod error;
pub mod node;
pub mod types;
pub mod variables;

pub use error::{NodeError, NodeResult};
pub use node::{AtomicReal, Node, NodeVar};
pub use types::{NodeType, PowerSlots, VariableDescription, VariableKind};
pub use variables::{Electric, Hydraulic, Mechanic, NodeVariable, Rotational, Signal};
