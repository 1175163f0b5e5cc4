//! Compile-time checked slot names, one enum per node type.

use crate::types::NodeType;

pub trait NodeVariable: Copy {
    const NODE_TYPE: NodeType;

    fn index(self) -> usize;
}

macro_rules! node_variables {
    ($name:ident, $node_type:expr, { $($var:ident = $idx:expr),+ $(,)? }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($var = $idx),+
        }

        impl NodeVariable for $name {
            const NODE_TYPE: NodeType = $node_type;

            fn index(self) -> usize {
                self as usize
            }
        }
    };
}

node_variables!(Hydraulic, NodeType::Hydraulic, {
    Pressure = 0,
    Flow = 1,
    Temperature = 2,
    WaveVariable = 3,
    CharImpedance = 4,
    HeatFlow = 5,
});

node_variables!(Rotational, NodeType::MechanicRotational, {
    Torque = 0,
    Angle = 1,
    AngularVelocity = 2,
    WaveVariable = 3,
    CharImpedance = 4,
    EquivalentInertia = 5,
});

node_variables!(Mechanic, NodeType::Mechanic, {
    Velocity = 0,
    Force = 1,
    Position = 2,
    WaveVariable = 3,
    CharImpedance = 4,
    EquivalentMass = 5,
});

node_variables!(Electric, NodeType::Electric, {
    Voltage = 0,
    Current = 1,
    WaveVariable = 2,
    CharImpedance = 3,
});

node_variables!(Signal, NodeType::Signal, { Value = 0 });
