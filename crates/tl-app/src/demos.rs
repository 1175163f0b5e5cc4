//! Ready-made models over the default library.

use tl_core::Real;

use crate::error::{AppError, AppResult};
use crate::query::Column;
use crate::simulation::Simulation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demo {
    Orifice,
    VolumeLeak,
    ReliefValve,
    Shaft,
    RcCircuit,
    SignalChain,
}

impl Demo {
    pub const ALL: [Demo; 6] = [
        Demo::Orifice,
        Demo::VolumeLeak,
        Demo::ReliefValve,
        Demo::Shaft,
        Demo::RcCircuit,
        Demo::SignalChain,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Demo::Orifice => "orifice",
            Demo::VolumeLeak => "volume-leak",
            Demo::ReliefValve => "relief-valve",
            Demo::Shaft => "shaft",
            Demo::RcCircuit => "rc-circuit",
            Demo::SignalChain => "signal-chain",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Demo::Orifice => "Turbulent orifice between a 100 bar supply and a 1 bar tank",
            Demo::VolumeLeak => "Flow source charging a volume drained by a laminar leak",
            Demo::ReliefValve => "Ramped pump flow into a line guarded by a 10 bar relief valve",
            Demo::Shaft => "Speed source driving a damped inertia through a torsional shaft",
            Demo::RcCircuit => "10 V source charging a 1 mF capacitor through 1 kOhm",
            Demo::SignalChain => "Soft step through a low-pass filter into a stop trigger",
        }
    }

    /// Time step and stop time the demo is tuned for.
    pub fn timing(self) -> (Real, Real) {
        match self {
            Demo::Orifice => (1e-3, 0.1),
            Demo::VolumeLeak => (1e-4, 1.0),
            Demo::ReliefValve => (1e-4, 0.5),
            Demo::Shaft => (1e-4, 2.0),
            Demo::RcCircuit => (1e-3, 5.0),
            Demo::SignalChain => (1e-3, 1.0),
        }
    }

    /// Series worth looking at, as `component.port.variable`.
    pub fn columns(self) -> Vec<Column> {
        let columns: &[(&str, &str, &str)] = match self {
            Demo::Orifice => &[("orifice", "P2", "Flow"), ("orifice", "P1", "Pressure")],
            Demo::VolumeLeak => &[("pump", "P1", "Pressure"), ("leak", "P2", "Flow")],
            Demo::ReliefValve => &[
                ("pump", "P1", "Flow"),
                ("relief", "P1", "Pressure"),
                ("relief", "P2", "Flow"),
                ("relief", "xv", "Value"),
            ],
            Demo::Shaft => &[
                ("rotor", "Pmr2", "AngularVelocity"),
                ("drive", "Pmr1", "Torque"),
            ],
            Demo::RcCircuit => &[("cap", "Pel1", "Voltage"), ("r", "Pel2", "Current")],
            Demo::SignalChain => &[
                ("step", "out", "Value"),
                ("filter", "out", "Value"),
                ("delay", "out", "Value"),
            ],
        };
        columns
            .iter()
            .map(|&(component, port, variable)| Column {
                component: component.to_string(),
                port: port.to_string(),
                variable: variable.to_string(),
            })
            .collect()
    }

    /// Populate an empty simulation with this demo's model.
    pub fn build(self, sim: &mut Simulation) -> AppResult<()> {
        match self {
            Demo::Orifice => {
                sim.add_component("HydraulicPressureSourceC", "supply")?;
                sim.add_component("HydraulicTurbulentOrificeQ", "orifice")?;
                sim.add_component("HydraulicPressureSourceC", "tank")?;
                sim.connect("supply", "P1", "orifice", "P1")?;
                sim.connect("orifice", "P2", "tank", "P1")?;
                sim.set_parameter("supply", "p", "100 bar")?;
                sim.set_parameter("tank", "p", "1 bar")?;
            }
            Demo::VolumeLeak => {
                sim.add_component("HydraulicFlowSourceQ", "pump")?;
                sim.add_component("HydraulicVolumeC", "volume")?;
                sim.add_component("HydraulicLaminarOrificeQ", "leak")?;
                sim.add_component("HydraulicPressureSourceC", "tank")?;
                sim.connect("pump", "P1", "volume", "P1")?;
                sim.connect("volume", "P2", "leak", "P1")?;
                sim.connect("leak", "P2", "tank", "P1")?;
                sim.set_parameter("pump", "q", 1e-4)?;
            }
            Demo::ReliefValve => {
                sim.add_component("SignalSoftStep", "ramp")?;
                sim.add_component("HydraulicFlowSourceQ", "pump")?;
                sim.add_component("HydraulicVolumeC", "line")?;
                sim.add_component("HydraulicPressureControlValveQ", "relief")?;
                sim.add_component("HydraulicPressureSourceC", "tank")?;
                sim.connect("ramp", "out", "pump", "q")?;
                sim.connect("pump", "P1", "line", "P1")?;
                sim.connect("line", "P2", "relief", "P1")?;
                sim.connect("relief", "P2", "tank", "P1")?;
                sim.set_parameter("ramp", "StartTime", 0.05)?;
                sim.set_parameter("ramp", "StopTime", 0.15)?;
                sim.set_parameter("ramp", "Amplitude", 1e-4)?;
                sim.set_parameter("relief", "pref", "10 bar")?;
            }
            Demo::Shaft => {
                sim.add_component("MechanicAngularVelocitySourceQ", "drive")?;
                sim.add_component("MechanicRotShaftC", "shaft")?;
                sim.add_component("MechanicRotInertiaQ", "rotor")?;
                sim.add_component("MechanicTorqueSourceC", "load")?;
                sim.connect("drive", "Pmr1", "shaft", "Pmr1")?;
                sim.connect("shaft", "Pmr2", "rotor", "Pmr1")?;
                sim.connect("rotor", "Pmr2", "load", "Pmr1")?;
                sim.set_parameter("drive", "w", 10.0)?;
                sim.set_parameter("rotor", "J", 0.1)?;
                sim.set_parameter("rotor", "B", 1.0)?;
            }
            Demo::RcCircuit => {
                sim.add_component("ElectricVoltageSourceC", "source")?;
                sim.add_component("ElectricResistorQ", "r")?;
                sim.add_component("ElectricCapacitorC", "cap")?;
                sim.connect("source", "Pel1", "r", "Pel1")?;
                sim.connect("r", "Pel2", "cap", "Pel1")?;
                sim.set_parameter("source", "U", 10.0)?;
                sim.set_parameter("r", "R", 1000.0)?;
                sim.set_parameter("cap", "C", "1e-3")?;
            }
            Demo::SignalChain => {
                sim.add_component("SignalSoftStep", "step")?;
                sim.add_component("SignalFirstOrderFilter", "filter")?;
                sim.add_component("SignalTimeDelay", "delay")?;
                sim.add_component("SignalGain", "gain")?;
                sim.add_component("SignalStopSimulation", "stop")?;
                sim.connect("step", "out", "filter", "in")?;
                sim.connect("filter", "out", "delay", "in")?;
                sim.connect("delay", "out", "gain", "in")?;
                sim.connect("gain", "out", "stop", "in")?;
                sim.set_parameter("step", "StartTime", 0.1)?;
                sim.set_parameter("step", "StopTime", 0.3)?;
                sim.set_parameter("step", "Amplitude", 2.0)?;
                sim.set_parameter("filter", "wc", 20.0)?;
                sim.set_parameter("delay", "deltat", "50 ms")?;
                sim.set_parameter("gain", "k", 0.3)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Demo {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        Demo::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| AppError::UnknownDemo {
                name: s.to_string(),
                available: Demo::ALL.map(Demo::name).join(", "),
            })
    }
}

/// A fresh simulation over the default library holding `demo`.
pub fn build_demo(demo: Demo) -> AppResult<Simulation> {
    let mut sim = Simulation::new(demo.name())?;
    demo.build(&mut sim)?;
    Ok(sim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for demo in Demo::ALL {
            assert_eq!(demo.name().parse::<Demo>().unwrap(), demo);
        }
    }

    #[test]
    fn unknown_name_lists_the_choices() {
        let err = "pump".parse::<Demo>().unwrap_err();
        assert!(err.to_string().contains("relief-valve"), "{err}");
    }
}
