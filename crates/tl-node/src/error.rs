use crate::types::NodeType;
use thiserror::Error;

pub type NodeResult<T> = Result<T, NodeError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Unknown node type '{name}'")]
    UnknownNodeType { name: String },

    #[error("Node type {node_type} has no variable '{name}'")]
    UnknownVariable { node_type: NodeType, name: String },

    #[error("Slot {index} out of range for {node_type} ({len} slots)")]
    SlotOutOfRange {
        node_type: NodeType,
        index: usize,
        len: usize,
    },

    #[error("Variable belongs to {expected}, node is {actual}")]
    WrongNodeType {
        expected: NodeType,
        actual: NodeType,
    },
}
