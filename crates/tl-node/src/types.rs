use crate::error::{NodeError, NodeResult};
use std::fmt;
use std::str::FromStr;
use tl_core::Real;

/// Semantic role of one node slot.
///
/// `Tlm` slots (wave variable, characteristic impedance) are written by the
/// C-type side; every other kind is written by the Q-type side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VariableKind {
    Intensity,
    Flow,
    Tlm,
    Default,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VariableDescription {
    pub name: &'static str,
    pub short: &'static str,
    pub unit: &'static str,
    pub kind: VariableKind,
    /// Value a fresh node slot holds before any start value is applied.
    pub default: Real,
}

const fn var(
    name: &'static str,
    short: &'static str,
    unit: &'static str,
    kind: VariableKind,
    default: Real,
) -> VariableDescription {
    VariableDescription {
        name,
        short,
        unit,
        kind,
        default,
    }
}

use VariableKind::{Default as Other, Flow, Intensity, Tlm};

const HYDRAULIC: [VariableDescription; 6] = [
    var("Pressure", "p", "Pa", Intensity, 1e5),
    var("Flow", "q", "m^3/s", Flow, 0.0),
    var("Temperature", "T", "K", Other, 293.0),
    var("WaveVariable", "c", "Pa", Tlm, 1e5),
    var("CharImpedance", "Zc", "Pa s/m^3", Tlm, 0.0),
    var("HeatFlow", "Qdot", "W", Other, 0.0),
];

const ROTATIONAL: [VariableDescription; 6] = [
    var("Torque", "T", "Nm", Intensity, 0.0),
    var("Angle", "a", "rad", Other, 0.0),
    var("AngularVelocity", "w", "rad/s", Flow, 0.0),
    var("WaveVariable", "c", "Nm", Tlm, 0.0),
    var("CharImpedance", "Zc", "Nms/rad", Tlm, 0.0),
    var("EquivalentInertia", "J", "kgm^2", Other, 1.0),
];

const MECHANIC: [VariableDescription; 6] = [
    var("Velocity", "v", "m/s", Flow, 0.0),
    var("Force", "f", "N", Intensity, 0.0),
    var("Position", "x", "m", Other, 0.0),
    var("WaveVariable", "c", "N", Tlm, 0.0),
    var("CharImpedance", "Zc", "Ns/m", Tlm, 0.0),
    var("EquivalentMass", "me", "kg", Other, 1.0),
];

const ELECTRIC: [VariableDescription; 4] = [
    var("Voltage", "U", "V", Intensity, 0.0),
    var("Current", "I", "A", Flow, 0.0),
    var("WaveVariable", "c", "V", Tlm, 0.0),
    var("CharImpedance", "Zc", "V/A", Tlm, 0.0),
];

const SIGNAL: [VariableDescription; 1] = [var("Value", "y", "", Other, 0.0)];

/// Slot indices of the TLM quartet of a power node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PowerSlots {
    pub effort: usize,
    pub flow: usize,
    pub wave: usize,
    pub impedance: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeType {
    Hydraulic,
    MechanicRotational,
    Mechanic,
    Electric,
    Signal,
}

impl NodeType {
    pub const ALL: [NodeType; 5] = [
        NodeType::Hydraulic,
        NodeType::MechanicRotational,
        NodeType::Mechanic,
        NodeType::Electric,
        NodeType::Signal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NodeType::Hydraulic => "NodeHydraulic",
            NodeType::MechanicRotational => "NodeMechanicRotational",
            NodeType::Mechanic => "NodeMechanic",
            NodeType::Electric => "NodeElectric",
            NodeType::Signal => "NodeSignal",
        }
    }

    pub fn variables(self) -> &'static [VariableDescription] {
        match self {
            NodeType::Hydraulic => &HYDRAULIC,
            NodeType::MechanicRotational => &ROTATIONAL,
            NodeType::Mechanic => &MECHANIC,
            NodeType::Electric => &ELECTRIC,
            NodeType::Signal => &SIGNAL,
        }
    }

    pub fn num_slots(self) -> usize {
        self.variables().len()
    }

    pub fn is_signal(self) -> bool {
        self == NodeType::Signal
    }

    /// Look up a slot by full or short variable name.
    pub fn variable_index(self, name: &str) -> NodeResult<usize> {
        let vars = self.variables();
        vars.iter()
            .position(|v| v.name == name)
            .or_else(|| vars.iter().position(|v| v.short == name))
            .ok_or_else(|| NodeError::UnknownVariable {
                node_type: self,
                name: name.to_string(),
            })
    }

    pub fn description(self, index: usize) -> NodeResult<&'static VariableDescription> {
        let vars = self.variables();
        vars.get(index).ok_or(NodeError::SlotOutOfRange {
            node_type: self,
            index,
            len: vars.len(),
        })
    }

    /// Effort/flow/wave/impedance slots; `None` for signal nodes.
    pub fn power_slots(self) -> Option<PowerSlots> {
        let vars = self.variables();
        let find = |kind: VariableKind, short: Option<&str>| {
            vars.iter()
                .position(|v| v.kind == kind && short.is_none_or(|s| v.short == s))
        };
        Some(PowerSlots {
            effort: find(VariableKind::Intensity, None)?,
            flow: find(VariableKind::Flow, None)?,
            wave: find(VariableKind::Tlm, Some("c"))?,
            impedance: find(VariableKind::Tlm, Some("Zc"))?,
        })
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeType {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| NodeError::UnknownNodeType {
                name: s.to_string(),
            })
    }
}
