//! Integration tests for the simulation facade.

use std::thread;
use std::time::{Duration, Instant};

use tl_app::{AppError, Demo, RunStatus, Severity, SimConfig, Simulation, build_demo};
use tl_kernel::KernelError;

fn run_demo(demo: Demo, config: &SimConfig) -> Simulation {
    let mut sim = build_demo(demo).unwrap();
    let (dt, stop) = demo.timing();
    sim.initialize(0.0, dt, stop, config).unwrap();
    let report = sim.simulate().unwrap();
    match demo {
        Demo::SignalChain => assert!(
            matches!(&report.status, RunStatus::Failed { component, .. } if component == "stop"),
            "{report:?}"
        ),
        _ => assert!(report.is_completed(), "{}: {report:?}", demo.name()),
    }
    sim
}

fn last(sim: &Simulation, component: &str, port: &str, variable: &str) -> f64 {
    *sim.series(component, port, variable).unwrap().last().unwrap()
}

#[test]
fn every_demo_runs_to_its_expected_end() {
    for demo in Demo::ALL {
        let sim = run_demo(demo, &SimConfig::default());
        let n = sim.time(None).unwrap().len();
        for column in demo.columns() {
            let s = sim
                .series(&column.component, &column.port, &column.variable)
                .unwrap();
            assert_eq!(s.len(), n, "{column}");
            assert!(s.iter().all(|v| v.is_finite()), "{column}");
        }
    }
}

#[test]
fn demo_results_match_their_physics() {
    let rc = run_demo(Demo::RcCircuit, &SimConfig::default());
    let u = last(&rc, "cap", "Pel1", "Voltage");
    assert!((u - 10.0 * (1.0 - (-5.0_f64).exp())).abs() < 1e-2, "u = {u}");

    let relief = run_demo(Demo::ReliefValve, &SimConfig::default());
    let p = last(&relief, "relief", "P1", "Pressure");
    assert!((p - 10e5).abs() < 0.05 * 10e5, "p = {p}");

    let shaft = run_demo(Demo::Shaft, &SimConfig::default());
    let w = last(&shaft, "rotor", "Pmr2", "AngularVelocity");
    assert!((w - 10.0).abs() < 0.05, "w = {w}");
}

#[test]
fn repeated_runs_are_identical_generations() {
    let mut sim = build_demo(Demo::ReliefValve).unwrap();
    let (dt, stop) = Demo::ReliefValve.timing();
    for _ in 0..2 {
        sim.initialize(0.0, dt, stop, &SimConfig::default()).unwrap();
        assert!(sim.simulate().unwrap().is_completed());
        sim.finalize().unwrap();
    }
    assert_eq!(sim.generations().unwrap(), [0, 1]);
    let first = sim.series_in(Some(0), "relief", "P1", "Pressure").unwrap();
    let second = sim.series_in(Some(1), "relief", "P1", "Pressure").unwrap();
    assert_eq!(first, second);
}

#[test]
fn multicore_run_reproduces_the_sequential_one() {
    for demo in [Demo::ReliefValve, Demo::Shaft] {
        let seq = run_demo(demo, &SimConfig::default());
        let par = run_demo(demo, &SimConfig::multicore(2));
        for column in demo.columns() {
            let a = seq.series(&column.component, &column.port, &column.variable).unwrap();
            let b = par.series(&column.component, &column.port, &column.variable).unwrap();
            assert_eq!(a, b, "{column}");
        }
    }
}

#[test]
fn background_run_can_be_aborted() {
    let mut sim = build_demo(Demo::VolumeLeak).unwrap();
    let config = SimConfig {
        log_every: 10_000,
        ..SimConfig::default()
    };
    sim.initialize(0.0, 1e-4, 1e4, &config).unwrap();
    let handle = sim.simulate_in_background().unwrap();

    assert!(matches!(sim.add_component("HydraulicVolumeC", "extra"), Err(AppError::Busy)));
    let deadline = Instant::now() + Duration::from_secs(10);
    while handle.progress().step == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(!handle.is_finished());
    handle.abort();
    let report = handle.wait().unwrap();

    assert_eq!(report.status, RunStatus::Aborted);
    assert!(report.steps_completed > 0);
    assert!(report.steps_completed < report.total_steps);
    let t = sim.time(None).unwrap();
    assert_eq!(t.last().copied(), Some(report.final_time));
    sim.finalize().unwrap();
}

#[test]
fn background_run_needs_initialize() {
    let mut sim = build_demo(Demo::Orifice).unwrap();
    let err = sim.simulate_in_background().err().unwrap();
    assert!(matches!(err, AppError::Kernel(KernelError::Lifecycle { .. })), "{err}");
}

#[test]
fn background_run_completes_like_a_blocking_one() {
    let mut sim = build_demo(Demo::Orifice).unwrap();
    let (dt, stop) = Demo::Orifice.timing();
    sim.initialize(0.0, dt, stop, &SimConfig::default()).unwrap();
    let report = sim.simulate_in_background().unwrap().wait().unwrap();
    assert!(report.is_completed());
    assert_eq!(report.steps_completed, report.total_steps);
    assert_eq!(sim.progress().step, report.total_steps);
}

#[test]
fn stop_request_reaches_subscribers() {
    let mut sim = build_demo(Demo::SignalChain).unwrap();
    let rx = sim.subscribe();
    let (dt, stop) = Demo::SignalChain.timing();
    sim.initialize(0.0, dt, stop, &SimConfig::default()).unwrap();
    sim.simulate().unwrap();

    let received: Vec<_> = rx.try_iter().collect();
    assert!(
        received
            .iter()
            .any(|m| m.severity == Severity::Error && m.tag == "stop"),
        "{received:?}"
    );
    let drained = sim.messages();
    assert!(drained.iter().any(|m| m.tag == "stop"));
    assert!(sim.messages().is_empty());
}

#[test]
fn parameters_accept_text_and_numbers() {
    let mut sim = build_demo(Demo::Shaft).unwrap();
    sim.set_parameter("rotor", "J", 0.25).unwrap();
    assert_eq!(sim.parameter("rotor", "J").unwrap().parse::<f64>().unwrap(), 0.25);

    sim.apply_assignments(["drive.w = 1500 rpm", "rotor.B=2"]).unwrap();
    assert_eq!(sim.parameter("rotor", "B").unwrap(), "2");

    let err = sim.apply_assignments(["rotorB=2"]).unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)), "{err}");
    let err = sim.set_parameter("rotor", "J", "2 bar").unwrap_err();
    assert!(matches!(err, AppError::Kernel(_)), "{err}");
}

#[test]
fn system_parameters_drive_component_values() {
    let mut sim = build_demo(Demo::RcCircuit).unwrap();
    sim.set_system_parameter("Rload", 500.0).unwrap();
    sim.set_parameter("r", "R", "Rload").unwrap();
    sim.initialize(0.0, 1e-3, 0.01, &SimConfig::default()).unwrap();
    sim.simulate().unwrap();
    // First step current through 500 Ohm plus the capacitor impedance.
    let i = sim.series("r", "Pel2", "Current").unwrap()[1];
    let expected = 10.0 / (500.0 + 1e-3 / (2.0 * 1e-3));
    assert!((i - expected).abs() < 1e-12, "i = {i}");
}

#[test]
fn subsystem_behaves_like_its_contents() {
    let mut sim = Simulation::new("root").unwrap();
    let restriction = sim
        .build_subsystem("restriction", |sys, reg| {
            sys.add_component(reg, "HydraulicTurbulentOrificeQ", "orifice")?;
            sys.export_port("P1", "orifice", "P1")?;
            sys.export_port("P2", "orifice", "P2")?;
            Ok(())
        })
        .unwrap();
    sim.add_subsystem("restriction", restriction).unwrap();
    sim.add_component("HydraulicPressureSourceC", "supply").unwrap();
    sim.add_component("HydraulicPressureSourceC", "tank").unwrap();
    sim.connect("supply", "P1", "restriction", "P1").unwrap();
    sim.connect("restriction", "P2", "tank", "P1").unwrap();
    sim.set_parameter("supply", "p", "100 bar").unwrap();
    sim.set_parameter("tank", "p", "1 bar").unwrap();
    sim.initialize(0.0, 1e-3, 0.01, &SimConfig::default()).unwrap();
    assert!(sim.simulate().unwrap().is_completed());

    let plain = run_demo(Demo::Orifice, &SimConfig::default());
    let nested = last(&sim, "restriction/orifice", "P2", "Flow");
    let flat = last(&plain, "orifice", "P2", "Flow");
    assert!((nested - flat).abs() < 1e-12 * flat, "{nested} vs {flat}");
}

#[test]
fn queries_before_any_run_report_missing_data() {
    let sim = build_demo(Demo::Orifice).unwrap();
    assert!(matches!(sim.time(None), Err(AppError::NoData { generation: None })));
    assert!(sim.generations().unwrap().is_empty());
}

#[test]
fn system_access_reaches_the_underlying_model() {
    let mut sim = build_demo(Demo::Orifice).unwrap();
    let (count, linked) = sim
        .with_system(|sys| {
            (
                sys.connection_count(),
                sys.are_connected("supply", "P1", "orifice", "P1"),
            )
        })
        .unwrap();
    assert_eq!(count, 2);
    assert!(linked);

    sim.with_system(|sys| sys.set_parameter("tank", "p", "2 bar"))
        .unwrap()
        .unwrap();
    assert_eq!(sim.parameter("tank", "p").unwrap(), "2 bar");
}
