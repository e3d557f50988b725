//! Pipeline nodes (spec §4.11 "Pipeline nodes").
//!
//! One behavior, two [`NodeType`] factories: [`compute_node_type`] has no
//! render-pass input, [`graphics_node_type`] takes an optional one. Both
//! delegate pipeline-layout and pipeline construction to
//! [`crate::cache::CacheRegistry`] so two nodes that reduce to the same
//! shader bundle + layout + render pass share one underlying pipeline
//! object (spec §4.4, §4.6).

use std::sync::Arc;

use crate::error::{GraphError, GraphResult};
use crate::gpu::{DeviceCapabilities, RawHandle, WorkloadMetrics};
use crate::node::slot::{SlotSchema, SlotValue};
use crate::node::{FrameContext, NodeBehavior, NodeContext, NodeType, ParamBag, ParamValue};
use crate::resource::{ResourceVariant, ShaderDataBundle};

/// Which pipeline bind point this node's instance targets. Fixed per node
/// type, not a param: a node declared as `compute` never becomes `graphics`
/// mid-graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Compute,
    Graphics,
}

/// Declare the compute-pipeline node type: shader bundle + layout in, one
/// pipeline out, no render pass.
#[must_use]
pub fn compute_node_type() -> Arc<NodeType> {
    Arc::new(NodeType {
        name: "compute_pipeline",
        input_schema: vec![
            SlotSchema::required(0, "bundle", "ShaderDataBundle"),
            SlotSchema::required(1, "descriptor_set_layout", "DescriptorSetLayout"),
        ],
        output_schema: vec![SlotSchema::required(0, "pipeline", "Pipeline")],
        required_capabilities: DeviceCapabilities::COMPUTE,
        workload: WorkloadMetrics::default(),
        factory: || Box::new(PipelineBehavior::new(Kind::Compute)),
    })
}

/// Declare the graphics-pipeline node type: shader bundle + layout in, an
/// optional render pass in, one pipeline out.
#[must_use]
pub fn graphics_node_type() -> Arc<NodeType> {
    Arc::new(NodeType {
        name: "graphics_pipeline",
        input_schema: vec![
            SlotSchema::required(0, "bundle", "ShaderDataBundle"),
            SlotSchema::required(1, "descriptor_set_layout", "DescriptorSetLayout"),
            SlotSchema {
                index: 2,
                name: "render_pass".into(),
                type_tag: "RenderPass",
                nullable: true,
                role: crate::node::slot::SlotRole::Dependency,
                mutability: crate::node::slot::Mutability::Ro,
                scope: crate::node::slot::SlotScope::Node,
                array_mode: crate::node::slot::ArrayMode::Single,
            },
        ],
        output_schema: vec![SlotSchema::required(0, "pipeline", "Pipeline")],
        required_capabilities: DeviceCapabilities::GRAPHICS,
        workload: WorkloadMetrics::default(),
        factory: || Box::new(PipelineBehavior::new(Kind::Graphics)),
    })
}

struct PipelineBehavior {
    kind: Kind,
    entry_point: String,
    handle: RawHandle,
}

impl PipelineBehavior {
    fn new(kind: Kind) -> Self {
        Self { kind, entry_point: "main".into(), handle: RawHandle::NULL }
    }
}

impl NodeBehavior for PipelineBehavior {
    fn setup(&mut self, _ctx: &mut NodeContext<'_>, params: &ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> {
        if let Some(ParamValue::Str(entry)) = params.get("entry_point") {
            self.entry_point = entry.clone();
        }
        Ok(())
    }

    fn compile(
        &mut self,
        ctx: &mut NodeContext<'_>,
        params: &ParamBag,
        inputs: &[SlotValue],
        outputs: &mut [SlotValue],
    ) -> GraphResult<()> {
        if let Some(ParamValue::Str(entry)) = params.get("entry_point") {
            self.entry_point = entry.clone();
        }

        let bundle = bundle_of(&inputs[0])?;
        let descriptor_set_layout = handle_of(&inputs[1]);

        let push_constant_bytes: u32 = bundle.push_constant_ranges.iter().map(|r| r.offset + r.size).max().unwrap_or(0);
        let layout_key = crate::cache::pipeline::pipeline_layout_key(&[descriptor_set_layout], push_constant_bytes);
        let device_for_layout = ctx.device;
        let layout_resource = ctx.caches.pipeline_layout.get_or_create(
            layout_key,
            1,
            ctx.clock.clone(),
            ctx.reclaim.clone(),
            || {
                let handle = device_for_layout.create_pipeline_layout(&[descriptor_set_layout], push_constant_bytes)?;
                Ok(ResourceVariant::PipelineLayout(crate::resource::ResourceMeta::new(
                    crate::resource::Lifetime::Persistent,
                    crate::resource::Shape::Handle,
                    handle,
                )))
            },
        )?;
        let layout_handle = layout_resource.with_resource(ResourceVariant::meta).map_or(RawHandle::NULL, |m| m.handle);

        let shader_module = ctx.device.create_shader_module(&spirv_stub(&bundle))?;

        let render_pass = if inputs.len() > 2 { inputs[2].as_single().map(|_| handle_of(&inputs[2])) } else { None };

        let pipeline_resource = match self.kind {
            Kind::Compute => {
                let key = crate::cache::pipeline::compute_pipeline_key(shader_module, &self.entry_point, layout_handle);
                let device = ctx.device;
                let entry = self.entry_point.clone();
                ctx.caches.compute_pipeline.get_or_create(key, 1, ctx.clock.clone(), ctx.reclaim.clone(), || {
                    let handle = device.create_compute_pipeline(shader_module, &entry, layout_handle)?;
                    Ok(ResourceVariant::Pipeline(crate::resource::ResourceMeta::new(
                        crate::resource::Lifetime::Persistent,
                        crate::resource::Shape::Handle,
                        handle,
                    )))
                })?
            }
            Kind::Graphics => {
                let key = crate::cache::pipeline::graphics_pipeline_key(&bundle, layout_handle, render_pass);
                let device = ctx.device;
                let bundle_for_build = bundle.clone();
                ctx.caches.graphics_pipeline.get_or_create(key, 1, ctx.clock.clone(), ctx.reclaim.clone(), || {
                    let handle = device.create_graphics_pipeline(&bundle_for_build, layout_handle, render_pass)?;
                    Ok(ResourceVariant::Pipeline(crate::resource::ResourceMeta::new(
                        crate::resource::Lifetime::Persistent,
                        crate::resource::Shape::Handle,
                        handle,
                    )))
                })?
            }
        };

        ctx.device.destroy_shader_module(shader_module);
        self.handle = pipeline_resource.with_resource(ResourceVariant::meta).map_or(RawHandle::NULL, |m| m.handle);
        outputs[0] = SlotValue::Single(pipeline_resource);
        Ok(())
    }

    fn execute(&mut self, _ctx: &FrameContext<'_>, _command_buffer: RawHandle, _inputs: &[SlotValue]) -> GraphResult<()> {
        Ok(())
    }

    fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) -> GraphResult<()> {
        // Ownership of the pipeline handle lives with the cache entry, not
        // this node instance; releasing the `SharedResource` this node
        // held is the scope/cache's job, not this node's.
        Ok(())
    }
}

fn bundle_of(value: &SlotValue) -> GraphResult<ShaderDataBundle> {
    value
        .as_single()
        .and_then(|r| r.with_resource(|v| match v {
            ResourceVariant::ShaderDataBundle(bundle, _) => Some(bundle.clone()),
            _ => None,
        }))
        .flatten()
        .ok_or_else(|| GraphError::MissingDependency { node: "pipeline".into(), slot: "bundle".into() })
}

fn handle_of(value: &SlotValue) -> RawHandle {
    value.as_single().and_then(|r| r.with_resource(ResourceVariant::meta)).map_or(RawHandle::NULL, |m| m.handle)
}

/// Placeholder SPIR-V: the shader toolchain is out of scope (spec §1);
/// this graph only ever receives an already-reflected [`ShaderDataBundle`],
/// never raw SPIR-V words, so the module body is a single no-op word
/// stream keyed by the bundle's interface hash.
fn spirv_stub(bundle: &ShaderDataBundle) -> Vec<u32> {
    vec![bundle.descriptor_interface_hash as u32, (bundle.descriptor_interface_hash >> 32) as u32]
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

    fn bundle_input(hash: u64) -> SlotValue {
        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let bundle = ShaderDataBundle { program_name: "ray_march".into(), descriptor_interface_hash: hash, ..Default::default() };
        let meta = ResourceMeta::new(Lifetime::Persistent, Shape::Handle, RawHandle(1));
        SlotValue::Single(SharedResource::new(ResourceVariant::ShaderDataBundle(bundle, meta), clock, tx))
    }

    fn layout_input() -> SlotValue {
        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let meta = ResourceMeta::new(Lifetime::Persistent, Shape::Handle, RawHandle(2));
        SlotValue::Single(SharedResource::new(ResourceVariant::DescriptorSetLayout(meta), clock, tx))
    }

    #[test]
    fn compute_pipeline_compiles_to_a_pipeline_resource() {
        let device = FakeGpuDevice::new();
        let caches = CacheRegistry::new(1_000_000);
        let allocator = DirectAllocator;
        let events = EventBus::new();
        let mut scope = LifetimeScope::new(ScopeKind::Compile);
        let mut c = ctx(&device, &caches, &allocator, &events, &mut scope);

        let mut behavior = PipelineBehavior::new(Kind::Compute);
        let mut outputs = vec![SlotValue::Empty];
        let inputs = vec![bundle_input(1), layout_input()];
        behavior.compile(&mut c, &ParamBag::new(), &inputs, &mut outputs).unwrap();

        assert!(!behavior.handle.is_null());
        assert!(outputs[0].as_single().is_some());
    }

    #[test]
    fn repeated_compile_with_same_key_reuses_cached_pipeline() {
        let device = FakeGpuDevice::new();
        let caches = CacheRegistry::new(1_000_000);
        let allocator = DirectAllocator;
        let events = EventBus::new();
        let mut scope = LifetimeScope::new(ScopeKind::Compile);
        let mut c = ctx(&device, &caches, &allocator, &events, &mut scope);

        let mut a = PipelineBehavior::new(Kind::Compute);
        let mut b = PipelineBehavior::new(Kind::Compute);
        let mut outputs_a = vec![SlotValue::Empty];
        let mut outputs_b = vec![SlotValue::Empty];
        let inputs = vec![bundle_input(9), layout_input()];

        a.compile(&mut c, &ParamBag::new(), &inputs, &mut outputs_a).unwrap();
        b.compile(&mut c, &ParamBag::new(), &inputs, &mut outputs_b).unwrap();

        assert_eq!(*device.call_counts.lock().unwrap().get("create_compute_pipeline").unwrap(), 1);
    }
}
