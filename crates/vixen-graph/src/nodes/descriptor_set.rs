//! Descriptor set node (spec §4.11 "Descriptor set node").
//!
//! Builds the layout + pool + per-frame uniform buffers + sets that every
//! pipeline node downstream binds against. The uniform buffer's content is
//! pushed in by CPU code calling [`DescriptorSetBehavior::update_uniform_buffer`]
//! (spec's `UpdateUniformBuffer(ptr, size)`) rather than through a slot,
//! since it is a per-frame CPU write, not a graph dependency.

use std::sync::Arc;

use crate::error::GraphResult;
use crate::gpu::{DeviceCapabilities, RawHandle, WorkloadMetrics};
use crate::node::slot::{SlotSchema, SlotValue};
use crate::node::{FrameContext, NodeBehavior, NodeContext, NodeType, ParamBag, ParamValue};
use crate::resource::descriptor::{BufferDescriptor, BufferUsage};
use crate::resource::{Lifetime, ResourceMeta, ResourceVariant, Shape};

/// Declare the descriptor-set node type. Input 0 is the reflected shader
/// bundle; input 1 is an optional combined-image-sampler texture (nullable
/// — most compute-only bundles have no texture binding).
#[must_use]
pub fn node_type() -> Arc<NodeType> {
    Arc::new(NodeType {
        name: "descriptor_set",
        input_schema: vec![
            SlotSchema::required(0, "bundle", "ShaderDataBundle"),
            SlotSchema {
                index: 1,
                name: "texture".into(),
                type_tag: "ImageView",
                nullable: true,
                role: crate::node::slot::SlotRole::Data,
                mutability: crate::node::slot::Mutability::Ro,
                scope: crate::node::slot::SlotScope::Node,
                array_mode: crate::node::slot::ArrayMode::Single,
            },
        ],
        output_schema: vec![
            SlotSchema::required(0, "layout", "DescriptorSetLayout"),
            SlotSchema::required(1, "set", "DescriptorSet"),
        ],
        required_capabilities: DeviceCapabilities::empty(),
        workload: WorkloadMetrics::default(),
        factory: || Box::new(DescriptorSetBehavior::default()),
    })
}

#[derive(Default)]
struct DescriptorSetBehavior {
    frames_in_flight: u32,
    layout_handle: RawHandle,
    pool_handle: RawHandle,
    set_handles: Vec<RawHandle>,
    uniform_buffers: Vec<RawHandle>,
    /// Host-side shadow of each frame's mapped uniform buffer, written by
    /// [`Self::update_uniform_buffer`] and (in a real backend) flushed to
    /// the mapped pointer at `Execute`.
    uniform_shadow: Vec<Vec<u8>>,
}

impl DescriptorSetBehavior {
    /// Copy `data` into frame slot `frame_index % frames_in_flight`'s
    /// uniform buffer shadow (spec's `UpdateUniformBuffer(ptr, size)`).
    pub fn update_uniform_buffer(&mut self, frame_index: u64, data: &[u8]) {
        if self.uniform_shadow.is_empty() {
            return;
        }
        let slot = (frame_index as usize) % self.uniform_shadow.len();
        self.uniform_shadow[slot].clear();
        self.uniform_shadow[slot].extend_from_slice(data);
    }
}

impl NodeBehavior for DescriptorSetBehavior {
    fn setup(&mut self, _ctx: &mut NodeContext<'_>, params: &ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> {
        self.frames_in_flight = as_u32(params.get_or("frames_in_flight", ParamValue::UInt(2))).max(1);
        Ok(())
    }

    fn compile(
        &mut self,
        ctx: &mut NodeContext<'_>,
        params: &ParamBag,
        inputs: &[SlotValue],
        outputs: &mut [SlotValue],
    ) -> GraphResult<()> {
        self.frames_in_flight = as_u32(params.get_or("frames_in_flight", ParamValue::UInt(u64::from(self.frames_in_flight.max(1))))).max(1);

        let bundle = inputs[0]
            .as_single()
            .and_then(|r| r.with_resource(|v| match v {
                ResourceVariant::ShaderDataBundle(bundle, _) => Some(bundle.clone()),
                _ => None,
            }))
            .flatten()
            .ok_or_else(|| crate::error::GraphError::MissingDependency {
                node: "descriptor_set".into(),
                slot: "bundle".into(),
            })?;

        let layout_key = crate::cache::pipeline::descriptor_set_layout_key(&bundle);
        let device = ctx.device;
        let bundle_for_build = bundle.clone();
        let layout_resource = ctx.caches.descriptor_set_layout.get_or_create(
            layout_key,
            1,
            ctx.clock.clone(),
            ctx.reclaim.clone(),
            || {
                let handle = device.create_descriptor_set_layout(&bundle_for_build)?;
                Ok(ResourceVariant::DescriptorSetLayout(ResourceMeta::new(Lifetime::Persistent, Shape::Handle, handle)))
            },
        )?;
        self.layout_handle = layout_resource
            .with_resource(ResourceVariant::meta)
            .map_or(RawHandle::NULL, |m| m.handle);

        if self.pool_handle.is_null() {
            self.pool_handle = ctx.device.create_descriptor_pool(self.frames_in_flight)?;
        }

        let layouts = vec![self.layout_handle; self.frames_in_flight as usize];
        self.set_handles = ctx.device.allocate_descriptor_sets(self.pool_handle, &layouts)?;

        self.uniform_buffers.clear();
        self.uniform_shadow.clear();
        let uniform_size = bundle.struct_definitions.iter().map(|s| u64::from(s.size)).max().unwrap_or(256);
        for _ in 0..self.frames_in_flight {
            let desc = BufferDescriptor { size_bytes: uniform_size, usage: BufferUsage::UNIFORM };
            let (_pooled, _class) = ctx.allocator.allocate_buffer(&desc)?;
            let handle = ctx.device.create_buffer(&desc)?;
            self.uniform_buffers.push(handle);
            self.uniform_shadow.push(vec![0u8; uniform_size as usize]);
        }

        outputs[0] = SlotValue::Single(layout_resource);
        let set_variant = ResourceVariant::DescriptorSet(ResourceMeta::new(
            Lifetime::Frame,
            Shape::Handle,
            self.set_handles.first().copied().unwrap_or(RawHandle::NULL),
        ));
        outputs[1] = SlotValue::Single(crate::nodes::wrap(ctx, set_variant));
        Ok(())
    }

    fn execute(&mut self, _ctx: &FrameContext<'_>, _command_buffer: RawHandle, _inputs: &[SlotValue]) -> GraphResult<()> {
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut NodeContext<'_>) -> GraphResult<()> {
        for buffer in self.uniform_buffers.drain(..) {
            ctx.device.destroy_buffer(buffer);
        }
        if !self.pool_handle.is_null() {
            ctx.device.destroy_descriptor_pool(self.pool_handle);
            self.pool_handle = RawHandle::NULL;
        }
        self.set_handles.clear();
        Ok(())
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
    use crate::resource::descriptor::RuntimeStructDescriptor;
    use crate::resource::ShaderDataBundle;
    use crate::shared::{FrameClock, LifetimeScope, ScopeKind, SharedResource};

    fn ctx<'a>(
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

    fn bundle_input() -> SlotValue {
        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let bundle = ShaderDataBundle {
            program_name: "ray_march".into(),
            struct_definitions: vec![RuntimeStructDescriptor { name: "Camera".into(), size: 128, fields: vec![] }],
            descriptor_interface_hash: 7,
            ..Default::default()
        };
        let meta = ResourceMeta::new(Lifetime::Persistent, Shape::Handle, RawHandle(1));
        let variant = ResourceVariant::ShaderDataBundle(bundle, meta);
        SlotValue::Single(SharedResource::new(variant, clock, tx))
    }

    #[test]
    fn compile_allocates_one_uniform_buffer_per_frame_in_flight() {
        let device = FakeGpuDevice::new();
        let caches = CacheRegistry::new(1_000_000);
        let allocator = DirectAllocator;
        let events = EventBus::new();
        let mut scope = LifetimeScope::new(ScopeKind::Compile);
        let mut c = ctx(&device, &caches, &allocator, &events, &mut scope);

        let mut params = ParamBag::new();
        params.set("frames_in_flight", ParamValue::UInt(3));

        let mut behavior = DescriptorSetBehavior::default();
        let mut outputs = vec![SlotValue::Empty, SlotValue::Empty];
        let inputs = vec![bundle_input(), SlotValue::Empty];
        behavior.compile(&mut c, &params, &inputs, &mut outputs).unwrap();

        assert_eq!(behavior.uniform_buffers.len(), 3);
        assert_eq!(*device.call_counts.lock().unwrap().get("create_buffer").unwrap(), 3);
    }

    #[test]
    fn update_uniform_buffer_writes_into_the_correct_frame_slot() {
        let mut behavior = DescriptorSetBehavior { frames_in_flight: 2, ..Default::default() };
        behavior.uniform_shadow = vec![vec![0; 4], vec![0; 4]];
        behavior.update_uniform_buffer(1, &[1, 2, 3, 4]);
        assert_eq!(behavior.uniform_shadow[1], vec![1, 2, 3, 4]);
        assert_eq!(behavior.uniform_shadow[0], vec![0, 0, 0, 0]);
    }
}
