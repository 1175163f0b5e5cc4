use crate::error::{KernelError, KernelResult};
use crate::model::CqsType;
use serde::Serialize;
use std::sync::Arc;
use tl_core::Real;
use tl_node::{Node, NodeType, VariableKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PortKind {
    /// Bilateral TLM port (C or Q role).
    Power,
    /// Signal input.
    Read,
    /// Signal output.
    Write,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Requirement {
    Required,
    NotRequired,
}

/// Named attachment point on a component.
///
/// An unconnected port reads and writes a private node so disconnected
/// reads are well-defined.
#[derive(Debug)]
pub struct Port {
    name: String,
    kind: PortKind,
    node_type: NodeType,
    role: CqsType,
    requirement: Requirement,
    description: String,
    node: Arc<Node>,
    connected: bool,
    pub(crate) exported: bool,
    /// Exported port whose system port is connected on the outside.
    pub(crate) linked_outside: bool,
    /// Start values as text, keyed by slot.
    pub(crate) start_text: Vec<Option<String>>,
    pub(crate) start_resolved: Vec<Option<Real>>,
    pub(crate) start_default: Vec<Option<Real>>,
    /// Slots this port's component writes, checked for finiteness after each step.
    pub(crate) written_slots: Vec<usize>,
}

impl Port {
    pub(crate) fn new(
        name: &str,
        kind: PortKind,
        node_type: NodeType,
        role: CqsType,
        requirement: Requirement,
        description: &str,
    ) -> Self {
        let n = node_type.num_slots();
        Self {
            name: name.to_string(),
            kind,
            node_type,
            role,
            requirement,
            description: description.to_string(),
            node: Node::shared(node_type),
            connected: false,
            exported: false,
            linked_outside: false,
            start_text: vec![None; n],
            start_resolved: vec![None; n],
            start_default: vec![None; n],
            written_slots: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Role of the component that owns this port (C or Q for power ports).
    pub fn role(&self) -> CqsType {
        self.role
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::Required
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }

    /// Connected directly, or exported through a system port that is connected.
    pub fn is_linked(&self) -> bool {
        self.connected || self.linked_outside
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn get(&self, slot: usize) -> Real {
        self.node.get(slot)
    }

    /// Attach to a shared node. Fails when the node's type differs from the declared one.
    pub fn connect(&mut self, node: Arc<Node>) -> KernelResult<()> {
        self.check_node_type(&node)?;
        self.node = node;
        self.connected = true;
        Ok(())
    }

    /// Detach and fall back to a fresh private node.
    pub fn disconnect(&mut self) {
        self.node = Node::shared(self.node_type);
        self.connected = false;
    }

    /// Point an exported inner port at the node its system port holds.
    pub(crate) fn attach_external(&mut self, node: Arc<Node>, linked: bool) -> KernelResult<()> {
        self.check_node_type(&node)?;
        self.node = node;
        self.linked_outside = linked;
        Ok(())
    }

    /// Fresh private node for a run, when nothing else owns this port's node.
    pub(crate) fn reset_private(&mut self) {
        if !self.connected && !self.exported {
            self.node = Node::shared(self.node_type);
        }
    }

    pub(crate) fn start_value(&self, slot: usize) -> Option<Real> {
        self.start_resolved.get(slot).copied().flatten()
    }

    pub(crate) fn default_start(&self, slot: usize) -> Option<Real> {
        self.start_default.get(slot).copied().flatten()
    }

    /// Whether this port's side writes `slot` under the C/Q writer partition.
    pub(crate) fn owns_slot(&self, slot: usize) -> bool {
        match self.kind {
            PortKind::Read => false,
            PortKind::Write => true,
            PortKind::Power => {
                let tlm = self
                    .node_type
                    .description(slot)
                    .is_ok_and(|d| d.kind == VariableKind::Tlm);
                match self.role {
                    CqsType::C => tlm,
                    CqsType::Q => !tlm,
                    CqsType::Signal => false,
                }
            }
        }
    }

    pub(crate) fn compute_written_slots(&mut self) {
        self.written_slots = (0..self.node_type.num_slots())
            .filter(|s| self.owns_slot(*s))
            .collect();
    }

    fn check_node_type(&self, node: &Node) -> KernelResult<()> {
        if node.node_type() != self.node_type {
            return Err(KernelError::Node(tl_node::NodeError::WrongNodeType {
                expected: self.node_type,
                actual: node.node_type(),
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_node::Hydraulic;
    use tl_node::NodeVariable;

    fn power(role: CqsType) -> Port {
        Port::new(
            "P1",
            PortKind::Power,
            NodeType::Hydraulic,
            role,
            Requirement::Required,
            "",
        )
    }

    #[test]
    fn connect_rejects_other_node_type() {
        let mut p = power(CqsType::Q);
        assert!(p.connect(Node::shared(NodeType::Electric)).is_err());
        assert!(!p.is_connected());
        p.connect(Node::shared(NodeType::Hydraulic)).unwrap();
        assert!(p.is_connected());
    }

    #[test]
    fn disconnect_restores_private_node() {
        let mut p = power(CqsType::Q);
        let shared = Node::shared(NodeType::Hydraulic);
        p.connect(shared.clone()).unwrap();
        p.disconnect();
        assert!(!Arc::ptr_eq(p.node(), &shared));
        assert!(!p.is_connected());
    }

    #[test]
    fn writer_partition_follows_role() {
        let mut c = power(CqsType::C);
        let mut q = power(CqsType::Q);
        c.compute_written_slots();
        q.compute_written_slots();
        assert_eq!(
            c.written_slots,
            vec![
                Hydraulic::WaveVariable.index(),
                Hydraulic::CharImpedance.index()
            ]
        );
        assert!(q.written_slots.contains(&Hydraulic::Pressure.index()));
        assert!(!q.written_slots.contains(&Hydraulic::WaveVariable.index()));
    }
}
