//! Render graph resolution.
//!
//! Turns the pass and edge lists of a [`RenderGraph`](crate::RenderGraph)
//! into a [`CompiledGraph`]: a pass order plus, for every pass, the upstream
//! ports its inputs read from.
//!
//! Resolution performs, in this order:
//!
//! 1. **Topological Sort** - Kahn's algorithm over the pass dependency graph.
//!    Ready passes are taken lowest insertion index first, so the order is
//!    deterministic and stable across repeated resolutions
//! 2. **Cycle Detection** - Passes left unscheduled form at least one loop;
//!    one loop is reported by name
//! 3. **Input Check** - Every required input must have an incoming edge
//!
//! ```ignore
//! let compiled = compile(graph.nodes(), graph.edges())?;
//! for handle in compiled.pass_order() {
//!     // run the pass
//! }
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use crate::error::StructuralError;
use crate::graph::{Edge, PassHandle, PassNode};
use crate::pass::PortRef;

/// An input port together with the output that feeds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    /// Input port name on the consuming pass.
    pub port: String,
    /// Output feeding the port.
    pub source: PortRef,
    pub source_handle: PassHandle,
}

/// A resolved render graph ready for execution.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompiledGraph {
    pass_order: Vec<PassHandle>,
    /// Position of each pass in `pass_order`, indexed by handle.
    steps: Vec<usize>,
    /// Bound inputs per pass in port declaration order, indexed by handle.
    inputs: Vec<Vec<ResolvedInput>>,
    /// Distinct upstream passes, indexed by handle.
    dependencies: Vec<Vec<PassHandle>>,
}

impl CompiledGraph {
    /// Pass execution order.
    pub fn pass_order(&self) -> &[PassHandle] {
        &self.pass_order
    }

    pub fn pass_count(&self) -> usize {
        self.pass_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pass_order.is_empty()
    }

    /// Position of a pass in the execution order.
    pub fn step_of(&self, handle: PassHandle) -> Option<usize> {
        self.steps.get(handle.index()).copied()
    }

    /// Bound inputs of a pass.
    pub fn inputs(&self, handle: PassHandle) -> &[ResolvedInput] {
        self.inputs.get(handle.index()).map_or(&[], Vec::as_slice)
    }

    /// Passes that must run before `handle`.
    pub fn dependencies(&self, handle: PassHandle) -> &[PassHandle] {
        self.dependencies.get(handle.index()).map_or(&[], Vec::as_slice)
    }
}

/// Resolve a graph into an execution plan.
///
/// Fails with [`StructuralError::CyclicDependency`] if passes depend on each
/// other in a loop and with [`StructuralError::UnsatisfiedInput`] if a
/// required input is unbound. Cycles are reported first.
pub(crate) fn compile(passes: &[PassNode], edges: &[Edge]) -> Result<CompiledGraph, StructuralError> {
    let n = passes.len();
    let index_of: HashMap<&str, usize> = passes
        .iter()
        .enumerate()
        .map(|(index, node)| (node.name.as_str(), index))
        .collect();

    let mut predecessors = vec![BTreeSet::new(); n];
    let mut successors = vec![BTreeSet::new(); n];
    let mut inputs: Vec<Vec<ResolvedInput>> = vec![Vec::new(); n];

    for edge in edges {
        let (Some(&src), Some(&dst)) = (
            index_of.get(edge.src.pass.as_str()),
            index_of.get(edge.dst.pass.as_str()),
        ) else {
            continue;
        };
        predecessors[dst].insert(src);
        successors[src].insert(dst);
        inputs[dst].push(ResolvedInput {
            port: edge.dst.port.clone(),
            source: edge.src.clone(),
            source_handle: PassHandle::new(src as u32),
        });
    }

    // Kahn's algorithm, lowest insertion index first among ready passes.
    let mut in_degree: Vec<usize> = predecessors.iter().map(BTreeSet::len).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&index| in_degree[index] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(n);

    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);
        for &next in &successors[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() != n {
        let cycle = find_cycle(passes, &predecessors, &in_degree);
        log::debug!("Resolver: cycle {}", cycle.join(" -> "));
        return Err(StructuralError::CyclicDependency { cycle });
    }

    for (index, node) in passes.iter().enumerate() {
        for port in node.instance.ports() {
            if port.is_required_input() && !inputs[index].iter().any(|input| input.port == port.name) {
                return Err(StructuralError::UnsatisfiedInput {
                    port: PortRef::new(node.name.as_str(), port.name.as_str()),
                });
            }
        }
    }

    for (index, node) in passes.iter().enumerate() {
        let declared = |port: &str| {
            node.instance
                .ports()
                .iter()
                .position(|p| p.name == port)
                .unwrap_or(usize::MAX)
        };
        inputs[index].sort_by_key(|input| declared(&input.port));
    }

    let mut steps = vec![0; n];
    for (step, &index) in order.iter().enumerate() {
        steps[index] = step;
    }

    let compiled = CompiledGraph {
        pass_order: order.into_iter().map(|index| PassHandle::new(index as u32)).collect(),
        steps,
        inputs,
        dependencies: predecessors
            .into_iter()
            .map(|set| set.into_iter().map(|index| PassHandle::new(index as u32)).collect())
            .collect(),
    };
    log::debug!(
        "Resolver: {} passes, {} edges resolved",
        compiled.pass_count(),
        edges.len()
    );
    Ok(compiled)
}

/// Extract one loop from the passes Kahn's algorithm could not schedule.
///
/// Every unscheduled pass has an unscheduled predecessor, so walking
/// predecessors from any of them must revisit a pass. The walk starts at the
/// lowest unscheduled index and always takes the lowest predecessor; the
/// result is rotated to start at the loop's lowest index.
fn find_cycle(passes: &[PassNode], predecessors: &[BTreeSet<usize>], in_degree: &[usize]) -> Vec<String> {
    let remaining = |index: usize| in_degree[index] > 0;
    let Some(start) = (0..passes.len()).find(|&index| remaining(index)) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut position: HashMap<usize, usize> = HashMap::from([(start, 0)]);
    let mut current = start;
    let loop_start = loop {
        let Some(&previous) = predecessors[current].iter().find(|&&p| remaining(p)) else {
            return Vec::new();
        };
        if let Some(&at) = position.get(&previous) {
            break at;
        }
        position.insert(previous, path.len());
        path.push(previous);
        current = previous;
    };

    // Predecessor walk runs against edge direction.
    let mut cycle: Vec<usize> = path[loop_start..].iter().rev().copied().collect();
    if let Some(lowest) = cycle.iter().enumerate().min_by_key(|&(_, index)| *index).map(|(at, _)| at) {
        cycle.rotate_left(lowest);
    }
    let first = cycle[0];
    cycle.push(first);
    cycle.into_iter().map(|index| passes[index].name.clone()).collect()
}
