//! Wave computation (spec §4.8 step 4).
//!
//! Grounded almost directly on the teacher's `ecs/scheduler.rs`
//! `generate_phase_plan`: repeatedly batch every node whose dependencies
//! are already satisfied, splitting out anything that would conflict with
//! a peer already claimed into this batch, and looping until every node
//! has been placed. The teacher batches on component read/write sets;
//! here the conflict check is over resource claims (spec §4.1 `RW×*`).

use std::collections::{HashMap, HashSet};

use super::dependency::DependencyGraph;
use super::Graph;
use crate::error::{GraphError, GraphResult};
use crate::node::slot::{ArrayMode, Mutability};

/// One resource claim a node makes: either producing a resource at one of
/// its own outputs, or consuming one via a connected input. Identified by
/// the producing `(node, slot)` pair so two nodes sharing an edge's
/// resource are recognized as touching the same thing.
#[derive(Clone, PartialEq, Eq, Hash)]
struct ResourceId(String, usize);

/// The waves produced by [`compute`]: `waves[k]` may only depend on nodes
/// in `waves[0..k]` (spec invariant §3.2.4).
#[derive(Clone, Debug, Default)]
pub struct WaveTable {
    pub waves: Vec<Vec<String>>,
}

/// Partition `graph`'s nodes into waves respecting both dependency order
/// and resource-mutability conflicts.
pub fn compute(graph: &Graph, deps: &DependencyGraph) -> GraphResult<WaveTable> {
    let claims = build_claims(graph);
    let mut placed: HashSet<String> = HashSet::new();
    let mut remaining: Vec<String> = graph.node_names().map(str::to_string).collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let mut ready: Vec<String> = remaining
            .iter()
            .filter(|name| deps.predecessors(name).iter().all(|p| placed.contains(p)))
            .cloned()
            .collect();

        if ready.is_empty() {
            return Err(GraphError::InvalidGraph(format!(
                "no node became ready; remaining nodes form an unresolvable cycle or dangling dependency: {remaining:?}"
            )));
        }

        // Tie-break: insertion order, then instance name lexicographic.
        ready.sort_by(|a, b| graph.insertion_index(a).cmp(&graph.insertion_index(b)).then_with(|| a.cmp(b)));

        let mut wave = Vec::new();
        let mut wave_claims: Vec<(ResourceId, Mutability)> = Vec::new();

        for name in &ready {
            let node_claims = claims.get(name).cloned().unwrap_or_default();
            let conflicts = node_claims.iter().any(|(id, mutability)| {
                wave_claims.iter().any(|(placed_id, placed_mutability)| {
                    placed_id == id && mutability.conflicts_with(*placed_mutability)
                })
            });
            if conflicts {
                continue; // demoted to a later wave by breadth-first retry
            }
            wave_claims.extend(node_claims);
            wave.push(name.clone());
        }

        if wave.is_empty() {
            // every ready node conflicted with another ready node; take the
            // first by tie-break order alone to guarantee forward progress.
            wave.push(ready[0].clone());
        }

        for name in &wave {
            placed.insert(name.clone());
            remaining.retain(|n| n != name);
        }
        waves.push(wave);
    }

    Ok(WaveTable { waves })
}

fn build_claims(graph: &Graph) -> HashMap<String, Vec<(ResourceId, Mutability)>> {
    let mut claims: HashMap<String, Vec<(ResourceId, Mutability)>> = HashMap::new();

    for name in graph.node_names() {
        let Some(node) = graph.node(name) else { continue };
        for (index, schema) in node.node_type.output_schema.iter().enumerate() {
            if schema.array_mode != ArrayMode::Variadic {
                claims.entry(name.to_string()).or_default().push((ResourceId(name.to_string(), index), Mutability::Wo));
            }
        }
    }

    for edge in graph.edges() {
        let Some(sink_node) = graph.node(&edge.sink.node) else { continue };
        let Some(schema) = sink_node.node_type.input_schema.get(edge.sink.slot) else { continue };
        claims
            .entry(edge.sink.node.clone())
            .or_default()
            .push((ResourceId(edge.source.node.clone(), edge.source.slot), schema.mutability));
    }

    claims
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::connection::{Connection, SlotRef};
    use crate::gpu::{DeviceCapabilities, WorkloadMetrics};
    use crate::node::slot::{Mutability, SlotRole, SlotScope, SlotSchema};
    use crate::node::{NodeBehavior, NodeContext, NodeInstance, NodeType};
    use crate::node::slot::SlotValue;
    use crate::node::FrameContext;
    use crate::gpu::RawHandle;

    struct NoopBehavior;
    impl NodeBehavior for NoopBehavior {
        fn setup(&mut self, _ctx: &mut NodeContext<'_>, _params: &crate::node::ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> { Ok(()) }
        fn compile(&mut self, _ctx: &mut NodeContext<'_>, _params: &crate::node::ParamBag, _inputs: &[SlotValue], _outputs: &mut [SlotValue]) -> GraphResult<()> { Ok(()) }
        fn execute(&mut self, _ctx: &FrameContext<'_>, _cb: RawHandle, _inputs: &[SlotValue]) -> GraphResult<()> { Ok(()) }
        fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) -> GraphResult<()> { Ok(()) }
    }

    fn producer_type() -> Arc<NodeType> {
        Arc::new(NodeType {
            name: "producer",
            input_schema: vec![],
            output_schema: vec![SlotSchema::required(0, "out", "Buffer")],
            required_capabilities: DeviceCapabilities::empty(),
            workload: WorkloadMetrics::default(),
            factory: || Box::new(NoopBehavior),
        })
    }

    fn consumer_type(mutability: Mutability) -> Arc<NodeType> {
        Arc::new(NodeType {
            name: "consumer",
            input_schema: vec![SlotSchema {
                index: 0,
                name: "in".into(),
                type_tag: "Buffer",
                nullable: false,
                role: SlotRole::Dependency,
                mutability,
                scope: SlotScope::Graph,
                array_mode: crate::node::slot::ArrayMode::Single,
            }],
            output_schema: vec![],
            required_capabilities: DeviceCapabilities::empty(),
            workload: WorkloadMetrics::default(),
            factory: || Box::new(NoopBehavior),
        })
    }

    #[test]
    fn independent_nodes_share_a_wave() {
        let mut graph = Graph::new();
        graph.add_node("a", producer_type()).unwrap();
        graph.add_node("b", producer_type()).unwrap();

        let deps = DependencyGraph { deps: [("a".to_string(), vec![]), ("b".to_string(), vec![])].into() };
        let table = compute(&graph, &deps).unwrap();
        assert_eq!(table.waves.len(), 1);
        assert_eq!(table.waves[0].len(), 2);
    }

    #[test]
    fn two_rw_consumers_of_same_resource_split_waves() {
        let mut graph = Graph::new();
        graph.add_node("producer", producer_type()).unwrap();
        graph.add_node("rw1", consumer_type(Mutability::Rw)).unwrap();
        graph.add_node("rw2", consumer_type(Mutability::Rw)).unwrap();
        graph.connect(Connection::new(SlotRef::new("producer", 0), SlotRef::new("rw1", 0))).unwrap();
        graph.connect(Connection::new(SlotRef::new("producer", 0), SlotRef::new("rw2", 0))).unwrap();

        let deps = DependencyGraph {
            deps: [
                ("producer".to_string(), vec![]),
                ("rw1".to_string(), vec!["producer".to_string()]),
                ("rw2".to_string(), vec!["producer".to_string()]),
            ]
            .into(),
        };
        let table = compute(&graph, &deps).unwrap();
        // producer in wave 0; rw1/rw2 conflict so can't share a wave.
        assert!(table.waves.len() >= 3);
    }
}
