//! Graph compiler phase 1: Validate (spec §4.8 step 1).

use super::Graph;
use crate::error::{GraphError, GraphResult};
use crate::node::slot::SlotScope;

/// Check that every required input is connected, every connection's
/// endpoint types match, and no node-scoped output escapes as a
/// connection source.
pub fn run(graph: &Graph) -> GraphResult<()> {
    check_connection_types(graph)?;
    check_scope_escapes(graph)?;
    check_required_inputs_connected(graph)?;
    Ok(())
}

fn check_connection_types(graph: &Graph) -> GraphResult<()> {
    for edge in graph.edges() {
        let source_node = graph
            .node(&edge.source.node)
            .ok_or_else(|| GraphError::InvalidGraph(format!("connection references unknown node {}", edge.source.node)))?;
        let sink_node = graph
            .node(&edge.sink.node)
            .ok_or_else(|| GraphError::InvalidGraph(format!("connection references unknown node {}", edge.sink.node)))?;

        let source_schema = source_node.node_type.output_schema.get(edge.source.slot).ok_or_else(|| {
            GraphError::InvalidGraph(format!("{} has no output slot {}", edge.source.node, edge.source.slot))
        })?;
        let sink_schema = sink_node.node_type.input_schema.get(edge.sink.slot).ok_or_else(|| {
            GraphError::InvalidGraph(format!("{} has no input slot {}", edge.sink.node, edge.sink.slot))
        })?;

        if source_schema.type_tag != sink_schema.type_tag {
            return Err(GraphError::InvalidGraph(format!(
                "type mismatch on edge {}.{} -> {}.{}: {} vs {}",
                edge.source.node, edge.source.slot, edge.sink.node, edge.sink.slot, source_schema.type_tag, sink_schema.type_tag
            )));
        }
    }
    Ok(())
}

fn check_scope_escapes(graph: &Graph) -> GraphResult<()> {
    use crate::node::slot::SlotRole;

    for edge in graph.edges() {
        if edge.source.node == edge.sink.node {
            continue;
        }
        let Some(source_node) = graph.node(&edge.source.node) else { continue };
        let Some(schema) = source_node.node_type.output_schema.get(edge.source.slot) else { continue };
        // A `Dependency`-role output is, by definition, meant to establish
        // a downstream edge; `scope` there only feeds `allocate::run`'s
        // frame-in-flight multiplier. Only a `Data`-role output can
        // meaningfully be node-local, since nothing else ever forces it
        // to cross a node boundary.
        if schema.role == SlotRole::Data && schema.scope == SlotScope::Node {
            return Err(GraphError::InvalidGraph(format!(
                "{}.{} is node-scoped and cannot be connected to another node",
                edge.source.node, schema.name
            )));
        }
    }
    Ok(())
}

fn check_required_inputs_connected(graph: &Graph) -> GraphResult<()> {
    for name in graph.node_names() {
        let Some(node) = graph.node(name) else { continue };
        for (index, schema) in node.node_type.input_schema.iter().enumerate() {
            if schema.nullable {
                continue;
            }
            let connected = graph.edges().iter().any(|e| e.sink.node == name && e.sink.slot == index);
            let deferred_target = graph.has_deferred_target(name, index);
            if !connected && !deferred_target {
                return Err(GraphError::MissingDependency { node: name.to_string(), slot: schema.name.clone() });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::connection::{Connection, SlotRef};
    use crate::error::GraphResult as R;
    use crate::gpu::{DeviceCapabilities, RawHandle, WorkloadMetrics};
    use crate::node::slot::{ArrayMode, Mutability, SlotRole, SlotSchema, SlotValue};
    use crate::node::{FrameContext, NodeBehavior, NodeContext, NodeType};

    struct NoopBehavior;
    impl NodeBehavior for NoopBehavior {
        fn setup(&mut self, _ctx: &mut NodeContext<'_>, _params: &crate::node::ParamBag, _outputs: &mut [SlotValue]) -> R<()> { Ok(()) }
        fn compile(&mut self, _ctx: &mut NodeContext<'_>, _params: &crate::node::ParamBag, _inputs: &[SlotValue], _outputs: &mut [SlotValue]) -> R<()> { Ok(()) }
        fn execute(&mut self, _ctx: &FrameContext<'_>, _cb: RawHandle, _inputs: &[SlotValue]) -> R<()> { Ok(()) }
        fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) -> R<()> { Ok(()) }
    }

    fn type_with_required_input() -> Arc<NodeType> {
        Arc::new(NodeType {
            name: "needs_input",
            input_schema: vec![SlotSchema {
                index: 0,
                name: "in".into(),
                type_tag: "Buffer",
                nullable: false,
                role: SlotRole::Dependency,
                mutability: Mutability::Ro,
                scope: crate::node::slot::SlotScope::Graph,
                array_mode: ArrayMode::Single,
            }],
            output_schema: vec![],
            required_capabilities: DeviceCapabilities::empty(),
            workload: WorkloadMetrics::default(),
            factory: || Box::new(NoopBehavior),
        })
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

    #[test]
    fn unconnected_required_input_fails_validation() {
        let mut graph = Graph::new();
        graph.add_node("sink", type_with_required_input()).unwrap();
        assert!(run(&graph).is_err());
    }

    #[test]
    fn connected_required_input_passes() {
        let mut graph = Graph::new();
        graph.add_node("source", producer_type()).unwrap();
        graph.add_node("sink", type_with_required_input()).unwrap();
        graph.connect(Connection::new(SlotRef::new("source", 0), SlotRef::new("sink", 0))).unwrap();
        assert!(run(&graph).is_ok());
    }

    fn node_local_data_producer_type() -> Arc<NodeType> {
        Arc::new(NodeType {
            name: "producer",
            input_schema: vec![],
            output_schema: vec![SlotSchema {
                index: 0,
                name: "out".into(),
                type_tag: "Buffer",
                nullable: false,
                role: SlotRole::Data,
                mutability: Mutability::Ro,
                scope: SlotScope::Node,
                array_mode: crate::node::slot::ArrayMode::Single,
            }],
            required_capabilities: DeviceCapabilities::empty(),
            workload: WorkloadMetrics::default(),
            factory: || Box::new(NoopBehavior),
        })
    }

    #[test]
    fn node_scoped_data_output_cannot_cross_to_another_node() {
        let mut graph = Graph::new();
        graph.add_node("source", node_local_data_producer_type()).unwrap();
        graph.add_node("sink", type_with_required_input()).unwrap();
        graph.connect(Connection::new(SlotRef::new("source", 0), SlotRef::new("sink", 0))).unwrap();
        assert!(run(&graph).is_err());
    }
}
