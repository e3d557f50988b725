//! Graph compiler phase 6: generate pipelines and build execution order
//! (spec §4.8 step 6).
//!
//! Drives `Compile` on every node in wave order, propagating each edge's
//! source output into its sink's input immediately beforehand — safe
//! because wave order already guarantees the source compiled first.

use crossbeam::channel::Sender;

use super::waves::WaveTable;
use super::Graph;
use crate::cache::CacheRegistry;
use crate::error::GraphResult;
use crate::event::EventBus;
use crate::gpu::GpuDevice;
use crate::memory::Allocator;
use crate::node::{NodeContext, NodeState};
use crate::resource::ResourceVariant;
use crate::shared::{FrameClock, LifetimeScope, ScopeKind};

/// Compile every node in wave order, returning the flattened execution
/// order (spec §3.1 "Graph" — "per-node execution order after compile").
#[allow(clippy::too_many_arguments)]
pub fn run(
    graph: &mut Graph,
    device: &dyn GpuDevice,
    caches: &CacheRegistry,
    allocator: &dyn Allocator,
    events: &EventBus,
    clock: &FrameClock,
    reclaim: &Sender<(u64, ResourceVariant)>,
    waves: &WaveTable,
) -> GraphResult<Vec<String>> {
    let mut order = Vec::new();

    for wave in &waves.waves {
        for name in wave {
            graph.propagate_inputs_for(name)?;

            let mut scope = LifetimeScope::new(ScopeKind::Compile);
            let node = graph.node_mut(name).expect("wave contains only graph node names");
            let mut ctx = NodeContext {
                device,
                caches,
                allocator,
                events,
                scope: &mut scope,
                clock: clock.clone(),
                reclaim: reclaim.clone(),
            };

            match node.state {
                NodeState::Ready | NodeState::Dirty => node.compile(&mut ctx)?,
                NodeState::Valid => {}
                other => {
                    return Err(crate::error::GraphError::InvalidState(format!(
                        "{name}: unexpected state entering compile: {other:?}"
                    )));
                }
            }

            order.push(name.clone());
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::connection::{Connection, SlotRef};
    use crate::gpu::device::fake::FakeGpuDevice;
    use crate::gpu::{DeviceCapabilities, RawHandle, WorkloadMetrics};
    use crate::memory::DirectAllocator;
    use crate::node::slot::{SlotSchema, SlotValue};
    use crate::node::{FrameContext, NodeBehavior, NodeType};
    use crate::resource::{Lifetime, ResourceMeta, ResourceVariant, Shape};

    struct ProducerBehavior;
    impl NodeBehavior for ProducerBehavior {
        fn setup(&mut self, _ctx: &mut NodeContext<'_>, _params: &crate::node::ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> { Ok(()) }
        fn compile(&mut self, ctx: &mut NodeContext<'_>, _params: &crate::node::ParamBag, _inputs: &[SlotValue], outputs: &mut [SlotValue]) -> GraphResult<()> {
            let variant = ResourceVariant::Device(ResourceMeta::new(Lifetime::Persistent, Shape::Handle, RawHandle::NULL));
            outputs[0] = SlotValue::Single(crate::shared::SharedResource::new(variant, ctx.clock.clone(), ctx.reclaim.clone()));
            Ok(())
        }
        fn execute(&mut self, _ctx: &FrameContext<'_>, _cb: RawHandle, _inputs: &[SlotValue]) -> GraphResult<()> { Ok(()) }
        fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) -> GraphResult<()> { Ok(()) }
    }

    struct ConsumerBehavior;
    impl NodeBehavior for ConsumerBehavior {
        fn setup(&mut self, _ctx: &mut NodeContext<'_>, _params: &crate::node::ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> { Ok(()) }
        fn compile(&mut self, _ctx: &mut NodeContext<'_>, _params: &crate::node::ParamBag, inputs: &[SlotValue], _outputs: &mut [SlotValue]) -> GraphResult<()> {
            assert!(!inputs[0].is_empty(), "producer's output should already be propagated");
            Ok(())
        }
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
            factory: || Box::new(ProducerBehavior),
        })
    }

    fn consumer_type() -> Arc<NodeType> {
        Arc::new(NodeType {
            name: "consumer",
            input_schema: vec![SlotSchema::required(0, "in", "Buffer")],
            output_schema: vec![],
            required_capabilities: DeviceCapabilities::empty(),
            workload: WorkloadMetrics::default(),
            factory: || Box::new(ConsumerBehavior),
        })
    }

    #[test]
    fn compile_propagates_producer_output_into_consumer_input() {
        let mut graph = Graph::new();
        graph.add_node("producer", producer_type()).unwrap();
        graph.add_node("consumer", consumer_type()).unwrap();
        graph.connect(Connection::new(SlotRef::new("producer", 0), SlotRef::new("consumer", 0))).unwrap();

        let device = FakeGpuDevice::new();
        let caches = CacheRegistry::new(1_000_000);
        let allocator = DirectAllocator;
        let events = EventBus::new();
        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = Arc::new(std::sync::atomic::AtomicU64::new(0));

        super::super::setup::run(&mut graph, &device, &caches, &allocator, &events, &clock, &tx).unwrap();
        let deps = super::super::dependency::analyze(&graph).unwrap();
        let waves = super::super::waves::compute(&graph, &deps).unwrap();

        let order = run(&mut graph, &device, &caches, &allocator, &events, &clock, &tx, &waves).unwrap();
        assert_eq!(order, vec!["producer".to_string(), "consumer".to_string()]);
    }
}
