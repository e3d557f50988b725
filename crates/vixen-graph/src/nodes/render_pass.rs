//! Render-pass and framebuffer nodes (spec §4.11 closing bullet).
//!
//! Both derive trivially from their attachment inputs: a render-pass node
//! only needs the attachments' formats, a framebuffer node only needs their
//! view handles plus the render pass they were built against. Split into
//! two node types, one source of data for each, since a framebuffer must
//! be rebuilt whenever the swapchain resizes but the render pass (schema
//! only, no concrete image) does not.

use std::sync::Arc;

use crate::error::{GraphError, GraphResult};
use crate::gpu::{DeviceCapabilities, RawHandle, WorkloadMetrics};
use crate::node::slot::{ArrayMode, SlotSchema, SlotScope, SlotValue};
use crate::node::{FrameContext, NodeBehavior, NodeContext, NodeType, ParamBag};
use crate::resource::descriptor::Format;
use crate::resource::{Lifetime, ResourceMeta, ResourceVariant, Shape};

fn color_attachments_slot() -> SlotSchema {
    SlotSchema {
        index: 0,
        name: "color_attachments".into(),
        type_tag: "ImageView",
        nullable: false,
        role: crate::node::slot::SlotRole::Data,
        mutability: crate::node::slot::Mutability::Ro,
        scope: SlotScope::Node,
        array_mode: ArrayMode::Variadic,
    }
}

fn depth_attachment_slot(index: usize) -> SlotSchema {
    SlotSchema {
        index,
        name: "depth_attachment".into(),
        type_tag: "ImageView",
        nullable: true,
        role: crate::node::slot::SlotRole::Data,
        mutability: crate::node::slot::Mutability::Ro,
        scope: SlotScope::Node,
        array_mode: ArrayMode::Single,
    }
}

/// Declare the render-pass node type: color (+ optional depth) attachments
/// in, a render-pass schema handle out.
#[must_use]
pub fn render_pass_node_type() -> Arc<NodeType> {
    Arc::new(NodeType {
        name: "render_pass",
        input_schema: vec![color_attachments_slot(), depth_attachment_slot(1)],
        output_schema: vec![SlotSchema::required(0, "render_pass", "RenderPass")],
        required_capabilities: DeviceCapabilities::GRAPHICS,
        workload: WorkloadMetrics::default(),
        factory: || Box::new(RenderPassBehavior::default()),
    })
}

/// Declare the framebuffer node type: the render pass + the same
/// attachments, a framebuffer handle out.
#[must_use]
pub fn framebuffer_node_type() -> Arc<NodeType> {
    Arc::new(NodeType {
        name: "framebuffer",
        input_schema: vec![
            SlotSchema::required(0, "render_pass", "RenderPass"),
            {
                let mut s = color_attachments_slot();
                s.index = 1;
                s
            },
            depth_attachment_slot(2),
        ],
        output_schema: vec![SlotSchema::required(0, "framebuffer", "Framebuffer")],
        required_capabilities: DeviceCapabilities::GRAPHICS,
        workload: WorkloadMetrics::default(),
        factory: || Box::new(FramebufferBehavior::default()),
    })
}

#[derive(Default)]
struct RenderPassBehavior {
    handle: RawHandle,
}

impl NodeBehavior for RenderPassBehavior {
    fn setup(&mut self, _ctx: &mut NodeContext<'_>, _params: &ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> {
        Ok(())
    }

    fn compile(
        &mut self,
        ctx: &mut NodeContext<'_>,
        _params: &ParamBag,
        inputs: &[SlotValue],
        outputs: &mut [SlotValue],
    ) -> GraphResult<()> {
        let color_formats = attachment_formats(&inputs[0])?;
        let depth_format = inputs.get(1).and_then(attachment_format);

        self.handle = ctx.device.create_render_pass(&color_formats, depth_format)?;
        let variant = ResourceVariant::RenderPass(ResourceMeta::new(Lifetime::Persistent, Shape::Handle, self.handle));
        outputs[0] = SlotValue::Single(crate::nodes::wrap(ctx, variant));
        Ok(())
    }

    fn execute(&mut self, _ctx: &FrameContext<'_>, _command_buffer: RawHandle, _inputs: &[SlotValue]) -> GraphResult<()> {
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut NodeContext<'_>) -> GraphResult<()> {
        if !self.handle.is_null() {
            ctx.device.destroy_render_pass(self.handle);
            self.handle = RawHandle::NULL;
        }
        Ok(())
    }
}

#[derive(Default)]
struct FramebufferBehavior {
    handle: RawHandle,
}

impl NodeBehavior for FramebufferBehavior {
    fn setup(&mut self, _ctx: &mut NodeContext<'_>, _params: &ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> {
        Ok(())
    }

    fn compile(
        &mut self,
        ctx: &mut NodeContext<'_>,
        _params: &ParamBag,
        inputs: &[SlotValue],
        outputs: &mut [SlotValue],
    ) -> GraphResult<()> {
        let render_pass = inputs[0]
            .as_single()
            .and_then(|r| r.with_resource(ResourceVariant::meta))
            .map_or(RawHandle::NULL, |m| m.handle);

        let mut attachments = attachment_handles(&inputs[1])?;
        if let Some(depth) = inputs.get(2).and_then(attachment_handle) {
            attachments.push(depth);
        }

        let (width, height) = attachment_extent(&inputs[1]);

        if !self.handle.is_null() {
            ctx.device.destroy_framebuffer(self.handle);
        }
        self.handle = ctx.device.create_framebuffer(render_pass, &attachments, width, height)?;

        let variant = ResourceVariant::Framebuffer(ResourceMeta::new(Lifetime::Frame, Shape::Handle, self.handle));
        outputs[0] = SlotValue::Single(crate::nodes::wrap(ctx, variant));
        Ok(())
    }

    fn execute(&mut self, _ctx: &FrameContext<'_>, _command_buffer: RawHandle, _inputs: &[SlotValue]) -> GraphResult<()> {
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut NodeContext<'_>) -> GraphResult<()> {
        if !self.handle.is_null() {
            ctx.device.destroy_framebuffer(self.handle);
            self.handle = RawHandle::NULL;
        }
        Ok(())
    }
}

/// `ResourceVariant::ImageView` only carries a [`crate::resource::ResourceMeta`]
/// (lifetime/shape/handle), not the format of the image it views, so there
/// is currently nothing to read a real format from here; this falls back
/// to [`Format::default`] for every attachment until `ImageView` carries
/// one (known gap, same plumbing the framebuffer node's hardcoded extent
/// in [`attachment_extent`] is waiting on).
fn attachment_formats(value: &SlotValue) -> GraphResult<Vec<Format>> {
    match value {
        SlotValue::Variadic(views) if !views.is_empty() => Ok(views
            .iter()
            .map(|(_, r)| r.with_resource(|_| Format::default()).unwrap_or_default())
            .collect()),
        _ => Err(GraphError::MissingDependency { node: "render_pass".into(), slot: "color_attachments".into() }),
    }
}

/// See [`attachment_formats`]: same known gap, single-attachment case.
fn attachment_format(value: &SlotValue) -> Option<Format> {
    value.as_single().map(|_| Format::default())
}

fn attachment_handles(value: &SlotValue) -> GraphResult<Vec<RawHandle>> {
    match value {
        SlotValue::Variadic(views) if !views.is_empty() => Ok(views
            .iter()
            .map(|(_, r)| r.with_resource(ResourceVariant::meta).map_or(RawHandle::NULL, |m| m.handle))
            .collect()),
        _ => Err(GraphError::MissingDependency { node: "framebuffer".into(), slot: "color_attachments".into() }),
    }
}

fn attachment_handle(value: &SlotValue) -> Option<RawHandle> {
    value.as_single().and_then(|r| r.with_resource(ResourceVariant::meta)).map(|m| m.handle)
}

/// Attachments carry no explicit extent in this graph (spec §4.11 treats
/// the swapchain as the sole source of truth for extent); a framebuffer
/// node reuses whatever extent its swapchain ancestor established. Until
/// that plumbing exists this falls back to a fixed default, matching the
/// swapchain node's own default extent.
fn attachment_extent(_value: &SlotValue) -> (u32, u32) {
    (1920, 1080)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheRegistry;
    use crate::event::EventBus;
    use crate::gpu::device::fake::FakeGpuDevice;
    use crate::memory::DirectAllocator;
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

    fn views_input(n: usize) -> SlotValue {
        let mut views = Vec::new();
        for i in 0..n {
            let (tx, _rx) = crossbeam::channel::unbounded();
            let clock: FrameClock = Arc::new(std::sync::atomic::AtomicU64::new(0));
            let meta = ResourceMeta::new(Lifetime::Frame, Shape::Image, RawHandle(20 + i as u64));
            views.push((format!("view{i}"), SharedResource::new(ResourceVariant::ImageView(meta), clock, tx)));
        }
        SlotValue::Variadic(views)
    }

    #[test]
    fn render_pass_compiles_from_color_attachments() {
        let device = FakeGpuDevice::new();
        let caches = CacheRegistry::new(1_000_000);
        let allocator = DirectAllocator;
        let events = EventBus::new();
        let mut scope = LifetimeScope::new(ScopeKind::Compile);
        let mut c = ctx(&device, &caches, &allocator, &events, &mut scope);

        let mut behavior = RenderPassBehavior::default();
        let mut outputs = vec![SlotValue::Empty];
        let inputs = vec![views_input(1), SlotValue::Empty];
        behavior.compile(&mut c, &ParamBag::new(), &inputs, &mut outputs).unwrap();

        assert!(!behavior.handle.is_null());
        assert_eq!(*device.call_counts.lock().unwrap().get("create_render_pass").unwrap(), 1);
    }

    #[test]
    fn framebuffer_compiles_against_render_pass_and_attachments() {
        let device = FakeGpuDevice::new();
        let caches = CacheRegistry::new(1_000_000);
        let allocator = DirectAllocator;
        let events = EventBus::new();
        let mut scope = LifetimeScope::new(ScopeKind::Compile);
        let mut c = ctx(&device, &caches, &allocator, &events, &mut scope);

        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let render_pass_meta = ResourceMeta::new(Lifetime::Persistent, Shape::Handle, RawHandle(3));
        let render_pass_input =
            SlotValue::Single(SharedResource::new(ResourceVariant::RenderPass(render_pass_meta), clock, tx));

        let mut behavior = FramebufferBehavior::default();
        let mut outputs = vec![SlotValue::Empty];
        let inputs = vec![render_pass_input, views_input(2), SlotValue::Empty];
        behavior.compile(&mut c, &ParamBag::new(), &inputs, &mut outputs).unwrap();

        assert!(!behavior.handle.is_null());
        assert_eq!(*device.call_counts.lock().unwrap().get("create_framebuffer").unwrap(), 1);
    }
}
