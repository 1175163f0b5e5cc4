use crate::error::{NodeError, NodeResult};
use crate::types::NodeType;
use crate::variables::NodeVariable;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tl_core::Real;

/// `f64` cell that can be shared across worker threads.
///
/// Relaxed ordering suffices: the scheduler's phase barrier orders writes
/// before the opposite side reads them.
#[derive(Debug, Default)]
pub struct AtomicReal(AtomicU64);

impl AtomicReal {
    pub fn new(v: Real) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> Real {
        Real::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, v: Real) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct Node {
    node_type: NodeType,
    slots: Box<[AtomicReal]>,
}

impl Node {
    pub fn new(node_type: NodeType) -> Self {
        let slots = node_type
            .variables()
            .iter()
            .map(|v| AtomicReal::new(v.default))
            .collect();
        Self { node_type, slots }
    }

    pub fn shared(node_type: NodeType) -> Arc<Self> {
        Arc::new(Self::new(node_type))
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Read a slot. `idx` must come from this node type's declared slots.
    #[inline]
    pub fn get(&self, idx: usize) -> Real {
        self.slots[idx].load()
    }

    #[inline]
    pub fn set(&self, idx: usize, value: Real) {
        self.slots[idx].store(value);
    }

    pub fn try_get(&self, idx: usize) -> NodeResult<Real> {
        self.check_slot(idx)?;
        Ok(self.get(idx))
    }

    pub fn try_set(&self, idx: usize, value: Real) -> NodeResult<()> {
        self.check_slot(idx)?;
        self.set(idx, value);
        Ok(())
    }

    #[inline]
    pub fn read<V: NodeVariable>(&self, var: V) -> Real {
        debug_assert_eq!(V::NODE_TYPE, self.node_type);
        self.get(var.index())
    }

    #[inline]
    pub fn write<V: NodeVariable>(&self, var: V, value: Real) {
        debug_assert_eq!(V::NODE_TYPE, self.node_type);
        self.set(var.index(), value);
    }

    pub fn variable_index(&self, name: &str) -> NodeResult<usize> {
        self.node_type.variable_index(name)
    }

    pub fn snapshot(&self) -> Vec<Real> {
        self.slots.iter().map(AtomicReal::load).collect()
    }

    /// Copy every slot of `other` into this node.
    pub fn copy_from(&self, other: &Node) -> NodeResult<()> {
        if other.node_type != self.node_type {
            return Err(NodeError::WrongNodeType {
                expected: self.node_type,
                actual: other.node_type,
            });
        }
        for (dst, src) in self.slots.iter().zip(other.slots.iter()) {
            dst.store(src.load());
        }
        Ok(())
    }

    fn check_slot(&self, idx: usize) -> NodeResult<()> {
        if idx < self.slots.len() {
            Ok(())
        } else {
            Err(NodeError::SlotOutOfRange {
                node_type: self.node_type,
                index: idx,
                len: self.slots.len(),
            })
        }
    }
}

/// A resolved handle to one slot of a shared node, validated once at initialize.
#[derive(Clone, Debug)]
pub struct NodeVar {
    node: Arc<Node>,
    slot: usize,
}

impl Default for NodeVar {
    /// Handle onto a private signal node, replaced at initialize.
    fn default() -> Self {
        Self {
            node: Node::shared(NodeType::Signal),
            slot: 0,
        }
    }
}

impl NodeVar {
    pub fn new(node: Arc<Node>, slot: usize) -> NodeResult<Self> {
        node.check_slot(slot)?;
        Ok(Self { node, slot })
    }

    pub fn typed<V: NodeVariable>(node: Arc<Node>, var: V) -> NodeResult<Self> {
        if node.node_type() != V::NODE_TYPE {
            return Err(NodeError::WrongNodeType {
                expected: V::NODE_TYPE,
                actual: node.node_type(),
            });
        }
        Self::new(node, var.index())
    }

    #[inline]
    pub fn get(&self) -> Real {
        self.node.get(self.slot)
    }

    #[inline]
    pub fn set(&self, value: Real) {
        self.node.set(self.slot, value);
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }
}
