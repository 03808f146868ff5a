//! End-to-end graph scenarios.
//!
//! - **Scenario A**: `G -> P -> Acc` resolves, runs and exposes `Acc.output`
//! - **Scenario B**: feeding `Acc.output` back into `G` is a cycle
//! - **Scenario C**: marking a missing port is rejected
//! - **Scenario D**: a second edge into a bound input is rejected

mod common;

use common::{add, assert_uniform, registry, scenario_a, scene, RESOLUTION};
use lantern_graph::{
    ConstructionError, ExecutionError, GraphState, PortRef, Properties, StructuralError,
};

#[test]
fn test_scenario_a_resolves_and_runs() {
    common::init_logging();
    let mut graph = scenario_a();
    assert_eq!(graph.execution_order().unwrap(), ["G", "P", "Acc"]);

    let scene = scene();
    let outputs = graph.execute(&scene).unwrap();
    assert_eq!(outputs.len(), 1);
    let (port, output) = outputs.get_index(0).unwrap();
    assert_eq!(*port, PortRef::new("Acc", "output"));
    assert_eq!(output.extent(), RESOLUTION);
    // Unbound in-place vbuffer starts at zero, G adds 1, P adds viewW.
    assert_uniform(output, 1.25);
}

#[test]
fn test_scenario_a_outputs_survive_until_mutation() {
    let mut graph = scenario_a();
    let scene = scene();
    graph.execute(&scene).unwrap();
    assert!(graph.outputs().is_some_and(|outputs| outputs.get("Acc.output").is_some()));

    graph.mark_output("P.color").unwrap();
    assert!(graph.outputs().is_none());

    let outputs = graph.execute(&scene).unwrap();
    assert_eq!(outputs.len(), 2);
    assert_uniform(outputs.get("P.color").unwrap(), 1.25);
}

#[test]
fn test_scenario_b_cycle() {
    let mut graph = scenario_a();
    graph.add_edge("Acc.output", "G.vbuffer").unwrap();

    let expected = StructuralError::CyclicDependency {
        cycle: vec!["G".into(), "P".into(), "Acc".into(), "G".into()],
    };
    assert_eq!(graph.execution_order(), Err(expected.clone()));
    assert_eq!(graph.state(), GraphState::Unresolved);

    let err = graph.execute(&scene()).unwrap_err();
    assert_eq!(err, ExecutionError::GraphInvalid(expected));
    assert!(graph.outputs().is_none());
}

#[test]
fn test_scenario_b_recovers_after_removing_back_edge() {
    let mut graph = scenario_a();
    graph.add_edge("Acc.output", "G.vbuffer").unwrap();
    assert!(graph.execute(&scene()).is_err());

    graph.remove_edge("Acc.output", "G.vbuffer").unwrap();
    assert_eq!(graph.execution_order().unwrap(), ["G", "P", "Acc"]);
    assert!(graph.execute(&scene()).is_ok());
}

#[test]
fn test_scenario_c_unknown_port() {
    let mut graph = scenario_a();
    let before = graph.marked_outputs().to_vec();

    let err = graph.mark_output("Acc.nonexistent").unwrap_err();
    assert_eq!(
        err,
        ConstructionError::UnknownPort {
            port: PortRef::new("Acc", "nonexistent")
        }
    );
    assert_eq!(graph.marked_outputs(), before.as_slice());
}

#[test]
fn test_scenario_d_port_already_bound() {
    let mut graph = scenario_a();
    add(&mut graph, "Constant", "Other");

    let err = graph.add_edge("Other.out", "Acc.input").unwrap_err();
    assert_eq!(
        err,
        ConstructionError::PortAlreadyBound {
            port: PortRef::new("Acc", "input"),
            bound_to: PortRef::new("P", "color"),
        }
    );
    let edge = graph.incoming_edge(&PortRef::new("Acc", "input")).unwrap();
    assert_eq!(*edge.src(), PortRef::new("P", "color"));
}

#[test]
fn test_unsatisfied_input_names_port() {
    let mut graph = common::graph("Unbound");
    graph
        .create_pass(registry(), "TestShade", "P", &Properties::new())
        .unwrap();
    assert_eq!(
        graph.execution_order(),
        Err(StructuralError::UnsatisfiedInput {
            port: PortRef::new("P", "vbuffer")
        })
    );
}

#[test]
fn test_in_place_port_copies_upstream() {
    let mut graph = scenario_a();
    add(&mut graph, "Constant", "Seed");
    graph.add_edge("Seed.out", "G.vbuffer").unwrap();
    graph.mark_output("G.vbuffer").unwrap();

    let scene = scene();
    let outputs = graph.execute(&scene).unwrap();
    // Seed fills 1.0, G adds 1.0.
    assert_uniform(outputs.get("G.vbuffer").unwrap(), 2.0);
    assert_uniform(outputs.get("Acc.output").unwrap(), 2.25);
}
