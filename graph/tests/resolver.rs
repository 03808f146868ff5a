//! Resolver properties over generated graphs.
//!
//! Graphs are generated from a fixed seed so every run checks the same
//! shapes. Each pass is a `Blend` (two inputs) or a `Constant` source.

mod common;

use std::collections::HashMap;

use common::{add, graph};
use lantern_graph::{RenderGraph, StructuralError};
use rstest::rstest;

/// Minimal linear congruential generator for reproducible shapes.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next() % bound as u64) as usize
    }
}

/// A DAG of `count` passes. Passes are inserted in a shuffled order so the
/// insertion order alone is not a valid schedule.
fn random_dag(seed: u64, count: usize) -> RenderGraph {
    let mut rng = Lcg(seed);
    let mut insertion: Vec<usize> = (0..count).collect();
    for i in (1..count).rev() {
        insertion.swap(i, rng.below(i + 1));
    }

    let mut graph = graph("Random");
    for &rank in &insertion {
        let type_name = if rank < 2 { "Constant" } else { "Blend" };
        add(&mut graph, type_name, &format!("N{rank}"));
    }
    // Each blend reads two lower-ranked passes.
    for rank in 2..count {
        let a = rng.below(rank);
        let b = rng.below(rank);
        graph.add_edge(&format!("N{a}.out"), &format!("N{rank}.a")).unwrap();
        graph.add_edge(&format!("N{b}.out"), &format!("N{rank}.b")).unwrap();
    }
    graph.mark_output(&format!("N{}.out", count - 1)).unwrap();
    graph
}

fn assert_topological(graph: &mut RenderGraph) -> Vec<String> {
    let order = graph.execution_order().unwrap();
    assert_eq!(order.len(), graph.pass_count());
    let position: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();
    for edge in graph.edges() {
        assert!(
            position[edge.src().pass.as_str()] < position[edge.dst().pass.as_str()],
            "{} scheduled after {}",
            edge.src(),
            edge.dst()
        );
    }
    order
}

#[rstest]
#[case(1, 4)]
#[case(2, 8)]
#[case(3, 16)]
#[case(4, 32)]
#[case(5, 64)]
fn test_dag_resolves_to_topological_order(#[case] seed: u64, #[case] count: usize) {
    let mut graph = random_dag(seed, count);
    assert_topological(&mut graph);
}

#[rstest]
#[case(11, 8)]
#[case(12, 24)]
fn test_resolution_is_stable(#[case] seed: u64, #[case] count: usize) {
    let mut graph = random_dag(seed, count);
    let first = assert_topological(&mut graph);
    graph.invalidate();
    let second = assert_topological(&mut graph);
    assert_eq!(first, second);

    let mut rebuilt = random_dag(seed, count);
    assert_eq!(assert_topological(&mut rebuilt), first);
}

#[rstest]
#[case(21, 6)]
#[case(22, 12)]
#[case(23, 20)]
fn test_back_edge_is_a_cycle(#[case] seed: u64, #[case] count: usize) {
    let mut graph = random_dag(seed, count);
    let order = assert_topological(&mut graph);

    // Rewire a blend on the path to the sink to read from the sink.
    let sink = order.last().unwrap().clone();
    let victim = graph
        .edges()
        .iter()
        .find(|edge| edge.dst().pass == sink)
        .map(|edge| edge.src().pass.clone())
        .unwrap();
    let victim_input = graph
        .edges()
        .iter()
        .find(|edge| edge.dst().pass == victim)
        .map(|edge| (edge.src().to_string(), edge.dst().to_string()));

    let Some((src, dst)) = victim_input else {
        // The sink reads only sources; nothing to rewire.
        return;
    };
    graph.remove_edge(&src, &dst).unwrap();
    graph.add_edge(&format!("{sink}.out"), &dst).unwrap();

    match graph.execution_order() {
        Err(StructuralError::CyclicDependency { cycle }) => {
            assert!(cycle.len() >= 3);
            assert_eq!(cycle.first(), cycle.last());
            assert!(cycle.contains(&sink));
            assert!(cycle.contains(&victim));
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn test_cycle_never_yields_partial_order() {
    let mut graph = graph("Loop");
    add(&mut graph, "Blend", "A");
    add(&mut graph, "Blend", "B");
    add(&mut graph, "Constant", "C");
    graph.add_edge("C.out", "A.a").unwrap();
    graph.add_edge("C.out", "B.a").unwrap();
    graph.add_edge("A.out", "B.b").unwrap();
    graph.add_edge("B.out", "A.b").unwrap();

    assert!(graph.compile().is_err());
    assert!(graph.execution_order().is_err());
    assert!(graph.resource_plan().is_none());
}

#[test]
fn test_diamond() {
    //     S
    //    / \
    //   L   R
    //    \ /
    //     J
    let mut graph = graph("Diamond");
    add(&mut graph, "Blend", "J");
    add(&mut graph, "Offset", "R");
    add(&mut graph, "Offset", "L");
    add(&mut graph, "Constant", "S");
    graph.add_edge("S.out", "L.in").unwrap();
    graph.add_edge("S.out", "R.in").unwrap();
    graph.add_edge("L.out", "J.a").unwrap();
    graph.add_edge("R.out", "J.b").unwrap();

    // R was inserted before L, so it wins the tie.
    assert_eq!(graph.execution_order().unwrap(), ["S", "R", "L", "J"]);
}
