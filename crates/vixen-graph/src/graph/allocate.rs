//! Graph compiler phase 5: allocate resources, respecting budgets (spec
//! §4.8 step 5).
//!
//! Concrete GPU handle creation happens inside each node's own `Compile`
//! (through the caches and allocator passed via [`crate::node::NodeContext`]);
//! this phase's job is the pre-flight accounting pass: reserve every
//! node's estimated workload against the budget manager *before* any node
//! runs `Compile`, so a graph that can never fit aborts with
//! `<BudgetExceeded>` up front rather than partway through compile with
//! some nodes already holding GPU resources.

use super::Graph;
use crate::error::GraphResult;
use crate::memory::{BudgetManager, MemoryClass};

/// Reserve each node's estimated memory footprint against `budget`,
/// scaling frame-lifetime nodes by `frames_in_flight` copies (spec
/// invariant §3.2.5).
pub fn run(graph: &Graph, budget: &BudgetManager, frames_in_flight: u64) -> GraphResult<()> {
    for name in graph.node_names() {
        let Some(node) = graph.node(name) else { continue };
        let bytes = node.node_type.workload.memory_bytes;
        if bytes == 0 {
            continue;
        }
        let copies = if node.node_type.output_schema.iter().any(|s| s.scope == crate::node::slot::SlotScope::Graph) {
            frames_in_flight.max(1)
        } else {
            1
        };
        budget.reserve(MemoryClass::DeviceLocal, bytes * copies)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::GraphError;
    use crate::gpu::{DeviceCapabilities, RawHandle, WorkloadMetrics};
    use crate::memory::budget::ClassLimits;
    use crate::node::slot::{SlotSchema, SlotValue};
    use crate::node::{FrameContext, NodeBehavior, NodeContext, NodeType};

    struct NoopBehavior;
    impl NodeBehavior for NoopBehavior {
        fn setup(&mut self, _ctx: &mut NodeContext<'_>, _params: &crate::node::ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> { Ok(()) }
        fn compile(&mut self, _ctx: &mut NodeContext<'_>, _params: &crate::node::ParamBag, _inputs: &[SlotValue], _outputs: &mut [SlotValue]) -> GraphResult<()> { Ok(()) }
        fn execute(&mut self, _ctx: &FrameContext<'_>, _cb: RawHandle, _inputs: &[SlotValue]) -> GraphResult<()> { Ok(()) }
        fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) -> GraphResult<()> { Ok(()) }
    }

    fn heavy_type(bytes: u64) -> Arc<NodeType> {
        Arc::new(NodeType {
            name: "heavy",
            input_schema: vec![],
            output_schema: vec![SlotSchema::required(0, "out", "Image")],
            required_capabilities: DeviceCapabilities::empty(),
            workload: WorkloadMetrics { memory_bytes: bytes, ..WorkloadMetrics::default() },
            factory: || Box::new(NoopBehavior),
        })
    }

    #[test]
    fn within_budget_reservation_succeeds() {
        let mut graph = Graph::new();
        graph.add_node("a", heavy_type(1024)).unwrap();
        let budget = BudgetManager::new();
        assert!(run(&graph, &budget, 2).is_ok());
    }

    #[test]
    fn over_hard_limit_aborts_with_budget_exceeded() {
        let mut graph = Graph::new();
        graph.add_node("a", heavy_type(1024)).unwrap();
        let mut budget = BudgetManager::new();
        budget.set_limits(MemoryClass::DeviceLocal, ClassLimits { soft_limit_bytes: 10, hard_limit_bytes: 100 });
        let err = run(&graph, &budget, 2).unwrap_err();
        assert!(matches!(err, GraphError::BudgetExceeded { .. }));
    }
}
