mod common;

use tl_kernel::{ComponentSystem, CqsType, KernelError, LifecycleState, SimConfig};

fn two_sources_and_restrictor() -> ComponentSystem {
    let reg = common::registry();
    let mut sys = ComponentSystem::new("root");
    sys.add_component(&reg, "Source", "high").unwrap();
    sys.add_component(&reg, "Source", "low").unwrap();
    sys.add_component(&reg, "Restrictor", "r").unwrap();
    sys
}

#[test]
fn node_type_mismatch_creates_no_node() {
    let reg = common::registry();
    let mut sys = ComponentSystem::new("root");
    sys.add_component(&reg, "Source", "src").unwrap();
    sys.add_component(&reg, "Gain", "g").unwrap();

    let err = sys.connect("src", "P1", "g", "in").unwrap_err();
    assert!(matches!(err, KernelError::NodeTypeMismatch { .. }), "{err}");
    assert_eq!(sys.connection_count(), 0);
    assert!(!sys.component("src").unwrap().port("P1").unwrap().is_connected());
    assert!(!sys.component("g").unwrap().port("in").unwrap().is_connected());
}

#[test]
fn c_to_c_and_double_connections_are_rejected() {
    let mut sys = two_sources_and_restrictor();
    let err = sys.connect("high", "P1", "low", "P1").unwrap_err();
    assert!(matches!(err, KernelError::IncompatiblePorts { .. }));

    sys.connect("high", "P1", "r", "P1").unwrap();
    let err = sys.connect("low", "P1", "r", "P1").unwrap_err();
    assert!(matches!(err, KernelError::PortAlreadyConnected { .. }));
    assert_eq!(sys.connection_count(), 1);
    assert!(sys.are_connected("r", "P1", "high", "P1"));
}

#[test]
fn signal_ports_connect_output_to_input_only() {
    let reg = common::registry();
    let mut sys = ComponentSystem::new("root");
    sys.add_component(&reg, "Gain", "a").unwrap();
    sys.add_component(&reg, "Gain", "b").unwrap();
    assert!(sys.connect("a", "out", "b", "out").is_err());
    assert!(sys.connect("a", "in", "b", "in").is_err());
    sys.connect("a", "out", "b", "in").unwrap();
}

#[test]
fn construction_errors_name_the_culprit() {
    let reg = common::registry();
    let mut sys = ComponentSystem::new("root");
    let err = sys.add_component(&reg, "Pump", "p").unwrap_err();
    assert_eq!(format!("{err}"), "Unknown component type 'Pump'");

    sys.add_component(&reg, "Source", "s").unwrap();
    let err = sys.add_component(&reg, "Source", "s").unwrap_err();
    assert!(matches!(err, KernelError::DuplicateName { .. }));

    let err = sys.connect("s", "P9", "s", "P1").unwrap_err();
    assert!(format!("{err}").contains("P9"));
}

#[test]
fn missing_required_connection_blocks_initialize() {
    let mut sys = two_sources_and_restrictor();
    sys.connect("high", "P1", "r", "P1").unwrap();
    let err = sys
        .initialize(0.0, 1e-3, 0.01, &SimConfig::default())
        .unwrap_err();
    match err {
        KernelError::MissingConnection { component, port } => {
            assert_eq!(component, "low");
            assert_eq!(port, "P1");
        }
        other => panic!("unexpected {other}"),
    }
    assert!(!sys.is_initialized());
    // Nothing was left half-initialized.
    for c in sys.components() {
        assert_ne!(c.state(), LifecycleState::Initialized);
    }
}

#[test]
fn parameter_values_are_validated_on_set() {
    let mut sys = two_sources_and_restrictor();
    sys.set_parameter("high", "p", "10 bar").unwrap();
    assert_eq!(sys.parameter("high", "p").unwrap(), "10 bar");

    let err = sys.set_parameter("high", "p", "10 mm").unwrap_err();
    assert!(matches!(err, KernelError::InvalidParameterValue { .. }));
    let err = sys.set_parameter("high", "q", "1").unwrap_err();
    assert!(matches!(err, KernelError::ParameterNotFound { .. }));

    sys.set_parameter("r", "P1#Pressure", "2e5").unwrap();
    assert_eq!(sys.parameter("r", "P1#Pressure").unwrap(), "2e5");
    assert!(sys.set_parameter("r", "P1#Torque", "1").is_err());
}

#[test]
fn unresolved_parameter_names_component_and_parameter() {
    let mut sys = two_sources_and_restrictor();
    sys.connect("high", "P1", "r", "P1").unwrap();
    sys.connect("low", "P1", "r", "P2").unwrap();
    sys.set_parameter("high", "p", "p_supply").unwrap();

    let err = sys
        .initialize(0.0, 1e-3, 0.01, &SimConfig::default())
        .unwrap_err();
    match err {
        KernelError::UnresolvedParameter {
            component,
            parameter,
            ..
        } => {
            assert_eq!(component, "high");
            assert_eq!(parameter, "p");
        }
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn subsystem_role_comes_from_exported_ports() {
    let reg = common::registry();
    let mut sub = ComponentSystem::new("sub");
    sub.add_component(&reg, "Source", "a").unwrap();
    sub.add_component(&reg, "Restrictor", "r").unwrap();
    sub.export_port("PA", "a", "P1").unwrap();
    assert_eq!(sub.cqs_type().unwrap(), CqsType::C);

    sub.export_port("PR", "r", "P1").unwrap();
    let err = sub.cqs_type().unwrap_err();
    assert!(matches!(err, KernelError::InvalidConfig { .. }));

    let mut root = ComponentSystem::new("root");
    assert!(root.add_subsystem("Sub", sub).is_err());
}

#[test]
fn exports_are_fixed_once_nested() {
    let reg = common::registry();
    let mut sub = ComponentSystem::new("sub");
    sub.add_component(&reg, "Source", "a").unwrap();
    sub.add_component(&reg, "Source", "b").unwrap();
    sub.export_port("P1", "a", "P1").unwrap();
    assert!(sub.export_port("P1", "b", "P1").is_err());

    let mut root = ComponentSystem::new("root");
    root.add_subsystem("Sub", sub).unwrap();
    let nested = root.subsystem_mut("Sub").unwrap();
    let err = nested.export_port("P2", "b", "P1").unwrap_err();
    assert!(matches!(err, KernelError::Lifecycle { .. }));

    let port = root.component("Sub").unwrap().port("P1").unwrap();
    assert_eq!(port.role(), CqsType::C);
}

#[test]
fn disconnect_and_remove_keep_the_arena_consistent() {
    let mut sys = two_sources_and_restrictor();
    sys.connect("high", "P1", "r", "P1").unwrap();
    sys.connect("low", "P1", "r", "P2").unwrap();

    sys.disconnect("r", "P1").unwrap();
    assert_eq!(sys.connection_count(), 1);
    assert!(!sys.component("high").unwrap().port("P1").unwrap().is_connected());
    assert!(sys.disconnect("r", "P1").is_err());

    sys.remove_component("high").unwrap();
    assert!(sys.component("high").is_none());
    assert_eq!(sys.component_id("r").unwrap().index(), 1);
    assert!(sys.are_connected("low", "P1", "r", "P2"));
}

#[test]
fn registry_describes_types() {
    let reg = common::registry();
    let info = reg.describe("Restrictor").unwrap();
    assert_eq!(info.cqs, CqsType::Q);
    let ports: Vec<&str> = info.ports.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(ports, ["P1", "P2"]);
    assert_eq!(info.parameters[0].name, "R");
    let mut reg = reg;
    assert!(reg.register("Source", || Box::new(common::Gain::default())).is_err());
}
