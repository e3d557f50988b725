//! Device node (spec §4.11 "Device node").
//!
//! The physical device is actually selected and the logical device created
//! by [`crate::gpu::device::AshVulkanDevice::new`], before the graph this
//! node lives in is ever compiled — every other node already reaches the
//! chosen device through [`crate::node::NodeContext::device`] and its
//! [`crate::gpu::device::GpuDevice::physical_device_info`]. This node's
//! only job is to give that fact a place in the DAG: its single output
//! slot exists so downstream nodes can declare a dependency edge on "the
//! device is ready" without duplicating `PhysicalDeviceInfo` into a slot
//! value.

use std::sync::Arc;

use crate::error::GraphResult;
use crate::gpu::{DeviceCapabilities, RawHandle, WorkloadMetrics};
use crate::node::slot::{SlotSchema, SlotValue};
use crate::node::{FrameContext, NodeBehavior, NodeContext, NodeType, ParamBag};
use crate::resource::{Lifetime, ResourceMeta, ResourceVariant, Shape};

/// Sentinel handle for the device node's output. The real `ash::Device` is
/// already live by the time `Compile` runs; this value only has to be
/// stable and non-null so downstream dependency edges resolve.
const DEVICE_HANDLE: RawHandle = RawHandle(1);

/// Declare the device node type. One instance per graph, typically the
/// sole node with no input slots.
#[must_use]
pub fn node_type(required_capabilities: DeviceCapabilities) -> Arc<NodeType> {
    Arc::new(NodeType {
        name: "device",
        input_schema: vec![],
        output_schema: vec![SlotSchema::required(0, "device", "Device")],
        required_capabilities,
        workload: WorkloadMetrics::default(),
        factory: || Box::new(DeviceBehavior::default()),
    })
}

#[derive(Default)]
struct DeviceBehavior;

impl NodeBehavior for DeviceBehavior {
    fn setup(&mut self, _ctx: &mut NodeContext<'_>, _params: &ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> {
        Ok(())
    }

    fn compile(
        &mut self,
        ctx: &mut NodeContext<'_>,
        _params: &ParamBag,
        _inputs: &[SlotValue],
        outputs: &mut [SlotValue],
    ) -> GraphResult<()> {
        // Touching `physical_device_info` here, rather than only at
        // construction, means a fake device swapped in for tests still
        // exercises the same call path a real backend does.
        let _info = ctx.device.physical_device_info();
        let variant = ResourceVariant::Device(ResourceMeta::new(Lifetime::Persistent, Shape::Handle, DEVICE_HANDLE));
        outputs[0] = SlotValue::Single(crate::nodes::wrap(ctx, variant));
        Ok(())
    }

    fn execute(&mut self, _ctx: &FrameContext<'_>, _command_buffer: RawHandle, _inputs: &[SlotValue]) -> GraphResult<()> {
        Ok(())
    }

    fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) -> GraphResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheRegistry;
    use crate::event::EventBus;
    use crate::gpu::device::fake::FakeGpuDevice;
    use crate::memory::DirectAllocator;
    use crate::shared::{FrameClock, LifetimeScope, ScopeKind};

    #[test]
    fn compile_populates_device_output_with_nonnull_handle() {
        let device = FakeGpuDevice::new();
        let caches = CacheRegistry::new(1_000_000);
        let allocator = DirectAllocator;
        let events = EventBus::new();
        let mut scope = LifetimeScope::new(ScopeKind::Compile);
        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let mut ctx = NodeContext {
            device: &device,
            caches: &caches,
            allocator: &allocator,
            events: &events,
            scope: &mut scope,
            clock,
            reclaim: tx,
        };

        let mut behavior = DeviceBehavior::default();
        let mut outputs = vec![SlotValue::Empty];
        behavior.compile(&mut ctx, &ParamBag::new(), &[], &mut outputs).unwrap();

        let resource = outputs[0].as_single().expect("device node must populate its single output");
        let is_device_and_nonnull = resource
            .with_resource(|variant| matches!(variant, ResourceVariant::Device(meta) if !meta.handle.is_null()))
            .unwrap_or(false);
        assert!(is_device_and_nonnull);
    }
}
