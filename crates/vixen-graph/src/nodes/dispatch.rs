//! Compute dispatch node (spec §4.11 "Compute dispatch node").
//!
//! Generic by design: this one node type covers every compute workload in
//! the graph, including the ray-march pass. What distinguishes a ray-march
//! invocation from any other compute dispatch is the graph wiring around
//! it (which pipeline, which descriptor sets, which push constants), not a
//! dedicated node class (spec §4.11 closing note).

use std::sync::Arc;

use crate::error::{GraphError, GraphResult};
use crate::gpu::{DeviceCapabilities, RawHandle, WorkloadMetrics};
use crate::node::slot::{ArrayMode, SlotSchema, SlotScope, SlotValue};
use crate::node::{FrameContext, NodeBehavior, NodeContext, NodeType, ParamBag, ParamValue};
use crate::resource::ResourceVariant;

/// Declare the compute-dispatch node type. Input 0 is the pipeline; input 1
/// is the variadic list of descriptor sets bound at set indices `0..N` in
/// list order. No outputs — this node is a DAG sink.
#[must_use]
pub fn node_type() -> Arc<NodeType> {
    Arc::new(NodeType {
        name: "compute_dispatch",
        input_schema: vec![
            SlotSchema::required(0, "pipeline", "Pipeline"),
            SlotSchema {
                index: 1,
                name: "descriptor_sets".into(),
                type_tag: "DescriptorSet",
                nullable: false,
                role: crate::node::slot::SlotRole::Dependency,
                mutability: crate::node::slot::Mutability::Ro,
                scope: SlotScope::Node,
                array_mode: ArrayMode::Variadic,
            },
        ],
        output_schema: vec![],
        required_capabilities: DeviceCapabilities::COMPUTE,
        workload: WorkloadMetrics::default(),
        factory: || Box::new(DispatchBehavior::default()),
    })
}

#[derive(Default)]
struct DispatchBehavior {
    groups: (u32, u32, u32),
    pipeline_handle: RawHandle,
    descriptor_handles: Vec<RawHandle>,
    /// Raw push-constant bytes, written by [`Self::set_push_constants`]
    /// rather than a `ParamValue` — there is no byte-blob param variant,
    /// and push constants are exactly as CPU-transient as a descriptor
    /// set's uniform shadow (see `descriptor_set.rs`).
    push_constants: Vec<u8>,
}

impl DispatchBehavior {
    /// Overwrite the push-constant bytes recorded at the next `Execute`.
    pub fn set_push_constants(&mut self, bytes: &[u8]) {
        self.push_constants.clear();
        self.push_constants.extend_from_slice(bytes);
    }
}

impl NodeBehavior for DispatchBehavior {
    fn setup(&mut self, _ctx: &mut NodeContext<'_>, params: &ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> {
        self.read_groups(params);
        Ok(())
    }

    fn compile(
        &mut self,
        _ctx: &mut NodeContext<'_>,
        params: &ParamBag,
        inputs: &[SlotValue],
        _outputs: &mut [SlotValue],
    ) -> GraphResult<()> {
        self.read_groups(params);

        self.pipeline_handle = inputs[0]
            .as_single()
            .and_then(|r| r.with_resource(ResourceVariant::meta))
            .map_or(RawHandle::NULL, |m| m.handle);
        if self.pipeline_handle.is_null() {
            return Err(GraphError::MissingDependency { node: "compute_dispatch".into(), slot: "pipeline".into() });
        }

        self.descriptor_handles = match &inputs[1] {
            SlotValue::Variadic(sets) => sets
                .iter()
                .map(|(_, r)| r.with_resource(ResourceVariant::meta).map_or(RawHandle::NULL, |m| m.handle))
                .collect(),
            _ => {
                return Err(GraphError::MissingDependency {
                    node: "compute_dispatch".into(),
                    slot: "descriptor_sets".into(),
                })
            }
        };
        Ok(())
    }

    fn execute(&mut self, ctx: &FrameContext<'_>, command_buffer: RawHandle, _inputs: &[SlotValue]) -> GraphResult<()> {
        ctx.device.record_compute_dispatch(
            command_buffer,
            self.pipeline_handle,
            &self.descriptor_handles,
            &self.push_constants,
            self.groups,
        )?;
        Ok(())
    }

    fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) -> GraphResult<()> {
        Ok(())
    }
}

impl DispatchBehavior {
    fn read_groups(&mut self, params: &ParamBag) {
        let x = as_u32(params.get_or("group_x", ParamValue::UInt(1))).max(1);
        let y = as_u32(params.get_or("group_y", ParamValue::UInt(1))).max(1);
        let z = as_u32(params.get_or("group_z", ParamValue::UInt(1))).max(1);
        self.groups = (x, y, z);
    }
}

fn as_u32(value: ParamValue) -> u32 {
    match value {
        ParamValue::UInt(v) => v as u32,
        ParamValue::Int(v) => v.max(0) as u32,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheRegistry;
    use crate::event::EventBus;
    use crate::gpu::device::fake::FakeGpuDevice;
    use crate::memory::DirectAllocator;
    use crate::resource::{Lifetime, ResourceMeta, Shape};
    use crate::shared::{FrameClock, LifetimeScope, ScopeKind, SharedResource};

    fn node_ctx<'a>(
        device: &'a FakeGpuDevice,
        caches: &'a CacheRegistry,
        allocator: &'a DirectAllocator,
        events: &'a EventBus,
        scope: &'a mut LifetimeScope,
    ) -> NodeContext<'a> {
        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = Arc::new(std::sync::atomic::AtomicU64::new(0));
        NodeContext { device, caches, allocator, events, scope, clock, reclaim: tx }
    }

    fn pipeline_input() -> SlotValue {
        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let meta = ResourceMeta::new(Lifetime::Persistent, Shape::Handle, RawHandle(5));
        SlotValue::Single(SharedResource::new(ResourceVariant::Pipeline(meta), clock, tx))
    }

    fn descriptor_sets_input(n: usize) -> SlotValue {
        let mut sets = Vec::new();
        for i in 0..n {
            let (tx, _rx) = crossbeam::channel::unbounded();
            let clock: FrameClock = Arc::new(std::sync::atomic::AtomicU64::new(0));
            let meta = ResourceMeta::new(Lifetime::Frame, Shape::Handle, RawHandle(10 + i as u64));
            sets.push((format!("set{i}"), SharedResource::new(ResourceVariant::DescriptorSet(meta), clock, tx)));
        }
        SlotValue::Variadic(sets)
    }

    #[test]
    fn compile_resolves_pipeline_and_descriptor_handles() {
        let device = FakeGpuDevice::new();
        let caches = CacheRegistry::new(1_000_000);
        let allocator = DirectAllocator;
        let events = EventBus::new();
        let mut scope = LifetimeScope::new(ScopeKind::Compile);
        let mut c = node_ctx(&device, &caches, &allocator, &events, &mut scope);

        let mut behavior = DispatchBehavior::default();
        let inputs = vec![pipeline_input(), descriptor_sets_input(2)];
        behavior.compile(&mut c, &ParamBag::new(), &inputs, &mut []).unwrap();

        assert!(!behavior.pipeline_handle.is_null());
        assert_eq!(behavior.descriptor_handles.len(), 2);
    }

    #[test]
    fn execute_records_one_dispatch_with_configured_groups() {
        let device = FakeGpuDevice::new();
        let events = EventBus::new();
        let frame_ctx = FrameContext {
            frame_index: 0,
            frames_in_flight: 2,
            command_pool: RawHandle(1),
            timestamp_pool: None,
            events: &events,
            device: &device,
        };

        let mut behavior = DispatchBehavior { groups: (8, 8, 1), pipeline_handle: RawHandle(5), ..Default::default() };
        behavior.set_push_constants(&[1, 2, 3, 4]);
        behavior.execute(&frame_ctx, RawHandle(42), &[]).unwrap();

        assert_eq!(*device.call_counts.lock().unwrap().get("record_compute_dispatch").unwrap(), 1);
    }
}
