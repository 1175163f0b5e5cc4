//! tl-components: the default component library.
//!
//! Hydraulic, rotational mechanic, electric and signal models implementing
//! [`tl_kernel::Model`]. C-type models publish wave variables and
//! characteristic impedances; Q-type models resolve effort and flow, some of
//! them with a few Newton iterations per step.
//!
//! # Example
//!
//! ```no_run
//! use tl_components::register_default_library;
//! use tl_kernel::{ComponentRegistry, ComponentSystem, SimConfig};
//!
//! let mut registry = ComponentRegistry::new();
//! register_default_library(&mut registry).unwrap();
//!
//! let mut sys = ComponentSystem::new("root");
//! sys.add_component(&registry, "HydraulicPressureSourceC", "supply").unwrap();
//! sys.add_component(&registry, "HydraulicTurbulentOrificeQ", "orifice").unwrap();
//! sys.add_component(&registry, "HydraulicPressureSourceC", "tank").unwrap();
//! sys.connect("supply", "P1", "orifice", "P1").unwrap();
//! sys.connect("orifice", "P2", "tank", "P1").unwrap();
//! sys.set_parameter("supply", "p", "100 bar").unwrap();
//!
//! sys.initialize(0.0, 1e-3, 0.1, &SimConfig::default()).unwrap();
//! let report = sys.simulate().unwrap();
//! println!("{} after {} steps", report.status, report.steps_completed);
//! ```

mod common;
pub mod electric;
pub mod hydraulic;
pub mod orifice;
pub mod rotational;
pub mod signal;
pub mod valve;

pub use electric::{CapacitorC, ResistorQ, VoltageSourceC};
pub use hydraulic::{FlowSourceQ, PressureSourceC, VolumeC};
pub use orifice::{LaminarOrificeQ, TurbulentOrificeQ};
pub use rotational::{AngularVelocitySourceQ, RotInertiaQ, RotShaftC, TorqueSourceC};
pub use signal::{
    Constant, FirstOrderFilter, Gain, SoftStep, StopSimulation, Summation, TimeDelay,
};
pub use valve::PressureControlValveQ;

use tl_kernel::{ComponentRegistry, KernelResult, Model};

/// Register every component type of this library under its type name.
pub fn register_default_library(registry: &mut ComponentRegistry) -> KernelResult<()> {
    fn boxed<M: Model + Default + 'static>() -> Box<dyn Model> {
        Box::new(M::default())
    }

    registry.register("HydraulicPressureSourceC", boxed::<PressureSourceC>)?;
    registry.register("HydraulicFlowSourceQ", boxed::<FlowSourceQ>)?;
    registry.register("HydraulicVolumeC", boxed::<VolumeC>)?;
    registry.register("HydraulicTurbulentOrificeQ", boxed::<TurbulentOrificeQ>)?;
    registry.register("HydraulicLaminarOrificeQ", boxed::<LaminarOrificeQ>)?;
    registry.register("HydraulicPressureControlValveQ", boxed::<PressureControlValveQ>)?;

    registry.register("MechanicTorqueSourceC", boxed::<TorqueSourceC>)?;
    registry.register("MechanicRotShaftC", boxed::<RotShaftC>)?;
    registry.register("MechanicAngularVelocitySourceQ", boxed::<AngularVelocitySourceQ>)?;
    registry.register("MechanicRotInertiaQ", boxed::<RotInertiaQ>)?;

    registry.register("ElectricVoltageSourceC", boxed::<VoltageSourceC>)?;
    registry.register("ElectricCapacitorC", boxed::<CapacitorC>)?;
    registry.register("ElectricResistorQ", boxed::<ResistorQ>)?;

    registry.register("SignalConstant", boxed::<Constant>)?;
    registry.register("SignalSoftStep", boxed::<SoftStep>)?;
    registry.register("SignalGain", boxed::<Gain>)?;
    registry.register("SignalAdd", || Box::new(Summation::add()))?;
    registry.register("SignalSubtract", || Box::new(Summation::subtract()))?;
    registry.register("SignalFirstOrderFilter", boxed::<FirstOrderFilter>)?;
    registry.register("SignalTimeDelay", boxed::<TimeDelay>)?;
    registry.register("SignalStopSimulation", boxed::<StopSimulation>)?;
    Ok(())
}

/// A registry holding the default library.
pub fn default_registry() -> KernelResult<ComponentRegistry> {
    let mut registry = ComponentRegistry::new();
    register_default_library(&mut registry)?;
    Ok(registry)
}
