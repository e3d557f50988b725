//! Swapchain node (spec §4.11 "Swapchain node").
//!
//! Exposes the created swapchain handle as a normal dependency-ordering
//! output, and the per-image view list as a variadic output slot so a
//! downstream struct-unpacker input can bind `views[i]` the same way it
//! would bind any other variadic producer (spec §4.6). Extent, format, and
//! image count are read back through [`SwapchainBehavior::extent`] /
//! [`SwapchainBehavior::format`] / [`SwapchainBehavior::image_count`] —
//! plain CPU-side data a render-pass/framebuffer node configured against
//! the same surface params can read directly rather than round-tripping
//! through a slot.

use std::sync::Arc;

use crate::error::GraphResult;
use crate::event::Topic;
use crate::gpu::{DeviceCapabilities, RawHandle, WorkloadMetrics};
use crate::node::slot::{ArrayMode, SlotSchema, SlotScope, SlotValue};
use crate::node::{FrameContext, NodeBehavior, NodeContext, NodeType, ParamBag, ParamValue};
use crate::resource::descriptor::{Format, ImageDescriptor, ImageUsage};
use crate::resource::{Lifetime, ResourceMeta, ResourceVariant, Shape};

/// Declare the swapchain node type. Input 0 is the presentation surface;
/// output 0 is the swapchain handle, output 1 the variadic image-view list.
#[must_use]
pub fn node_type() -> Arc<NodeType> {
    Arc::new(NodeType {
        name: "swapchain",
        input_schema: vec![SlotSchema::required(0, "surface", "Surface")],
        output_schema: vec![
            SlotSchema::required(0, "swapchain", "Swapchain"),
            SlotSchema {
                index: 1,
                name: "views".into(),
                type_tag: "ImageView",
                nullable: false,
                role: crate::node::slot::SlotRole::Dependency,
                mutability: crate::node::slot::Mutability::Ro,
                scope: SlotScope::Graph,
                array_mode: ArrayMode::Variadic,
            },
        ],
        required_capabilities: DeviceCapabilities::empty(),
        workload: WorkloadMetrics::default(),
        factory: || Box::new(SwapchainBehavior::default()),
    })
}

#[derive(Default)]
struct SwapchainBehavior {
    width: u32,
    height: u32,
    format: Format,
    image_count: u32,
    handle: RawHandle,
    view_handles: Vec<RawHandle>,
}

impl SwapchainBehavior {
    /// Configured swapchain extent, `(width, height)`.
    #[must_use]
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Configured swapchain pixel format.
    #[must_use]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Number of swapchain images (and views) created.
    #[must_use]
    pub fn image_count(&self) -> u32 {
        self.image_count
    }
}

impl NodeBehavior for SwapchainBehavior {
    fn setup(&mut self, _ctx: &mut NodeContext<'_>, params: &ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> {
        self.read_params(params);
        Ok(())
    }

    fn compile(
        &mut self,
        ctx: &mut NodeContext<'_>,
        params: &ParamBag,
        inputs: &[SlotValue],
        outputs: &mut [SlotValue],
    ) -> GraphResult<()> {
        self.read_params(params);

        let rebuilding = !self.handle.is_null();

        let surface = inputs[0]
            .as_single()
            .and_then(|r| r.with_resource(ResourceVariant::meta))
            .map_or(RawHandle::NULL, |m| m.handle);

        self.handle = ctx.device.create_swapchain(surface, self.image_count)?;

        let image_desc = ImageDescriptor {
            width: self.width.max(1),
            height: self.height.max(1),
            depth: 1,
            format: self.format,
            usage: ImageUsage::COLOR_ATTACHMENT,
        };
        self.view_handles.clear();
        let mut views = Vec::with_capacity(self.image_count as usize);
        for i in 0..self.image_count {
            let view = ctx.device.create_image_view(self.handle, &image_desc)?;
            self.view_handles.push(view);
            let variant = ResourceVariant::ImageView(ResourceMeta::new(Lifetime::Frame, Shape::Image, view));
            views.push((format!("view{i}"), crate::nodes::wrap(ctx, variant)));
        }

        let swapchain_variant = ResourceVariant::Swapchain(ResourceMeta::new(Lifetime::Persistent, Shape::Handle, self.handle));
        outputs[0] = SlotValue::Single(crate::nodes::wrap(ctx, swapchain_variant));
        outputs[1] = SlotValue::Variadic(views);

        if rebuilding {
            ctx.events.publish(Topic::SwapchainResized);
        }
        Ok(())
    }

    fn execute(&mut self, _ctx: &FrameContext<'_>, _command_buffer: RawHandle, _inputs: &[SlotValue]) -> GraphResult<()> {
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut NodeContext<'_>) -> GraphResult<()> {
        for view in self.view_handles.drain(..) {
            ctx.device.destroy_image_view(view);
        }
        if !self.handle.is_null() {
            ctx.device.destroy_swapchain(self.handle);
            self.handle = RawHandle::NULL;
        }
        Ok(())
    }
}

impl SwapchainBehavior {
    fn read_params(&mut self, params: &ParamBag) {
        self.width = as_u32(params.get_or("width", ParamValue::UInt(1920)));
        self.height = as_u32(params.get_or("height", ParamValue::UInt(1080)));
        self.image_count = as_u32(params.get_or("image_count", ParamValue::UInt(3)));
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
    use crate::shared::{FrameClock, LifetimeScope, ScopeKind};

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

    #[test]
    fn compile_produces_one_view_per_configured_image_count() {
        let device = FakeGpuDevice::new();
        let caches = CacheRegistry::new(1_000_000);
        let allocator = DirectAllocator;
        let events = EventBus::new();
        let mut scope = LifetimeScope::new(ScopeKind::Compile);
        let mut c = ctx(&device, &caches, &allocator, &events, &mut scope);

        let mut params = ParamBag::new();
        params.set("image_count", ParamValue::UInt(2));

        let mut behavior = SwapchainBehavior::default();
        let mut outputs = vec![SlotValue::Empty, SlotValue::Empty];
        behavior.compile(&mut c, &params, &[SlotValue::Empty], &mut outputs).unwrap();

        assert_eq!(behavior.image_count(), 2);
        match &outputs[1] {
            SlotValue::Variadic(views) => assert_eq!(views.len(), 2),
            _ => panic!("expected variadic views output"),
        }
    }

    #[test]
    fn recompile_publishes_swapchain_resized() {
        let device = FakeGpuDevice::new();
        let caches = CacheRegistry::new(1_000_000);
        let allocator = DirectAllocator;
        let events = EventBus::new();
        let mut scope = LifetimeScope::new(ScopeKind::Compile);
        let mut c = ctx(&device, &caches, &allocator, &events, &mut scope);

        let mut behavior = SwapchainBehavior::default();
        let mut outputs = vec![SlotValue::Empty, SlotValue::Empty];
        let params = ParamBag::new();
        behavior.compile(&mut c, &params, &[SlotValue::Empty], &mut outputs).unwrap();
        assert_eq!(events.pending_len(), 0);
        behavior.compile(&mut c, &params, &[SlotValue::Empty], &mut outputs).unwrap();
        assert_eq!(events.pending_len(), 1);
    }
}
