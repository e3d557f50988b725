//! Resource taxonomy & variant (spec §3.1, §4.1).
//!
//! Grounded on the closed-`enum`-of-concrete-kinds style the teacher uses
//! throughout its Vulkan module (`render/vulkan/mod.rs`'s enumerated
//! re-export list) and on `core/config.rs`'s `.validate()` convention:
//! return `Result<(), GraphError>` rather than panic.

pub mod descriptor;

use crate::error::{GraphError, GraphResult};
use crate::gpu::RawHandle;
use descriptor::{BufferDescriptor, ImageDescriptor, RuntimeStructDescriptor, ShaderStageFlags};

/// How long a resource's binding in a slot is expected to live (spec §3.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Lives for the whole graph, across every frame and every recompile.
    Persistent,
    /// Lives only within one graph-compile's allocation pass; candidate
    /// for aliasing with other transients whose lifetime does not overlap.
    Transient,
    /// Exists in `MAX_FRAMES_IN_FLIGHT` copies, one live per in-flight frame.
    Frame,
    /// Bound to a [`crate::shared::scope::LifetimeScope`] narrower than the graph.
    Scope,
}

/// The coarse shape of a resource's backing memory (spec §3.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Linear buffer memory.
    Buffer,
    /// Opaque-tiled image memory.
    Image,
    /// A non-memory-backed API handle (pipeline, layout, pool, ...).
    Handle,
}

/// Metadata every resource variant carries alongside its descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceMeta {
    /// Expected lifetime class.
    pub lifetime: Lifetime,
    /// Memory shape.
    pub shape: Shape,
    /// The backend handle this variant owns (or, for [`ResourceVariant::PassThrough`],
    /// borrows). `RawHandle::NULL` before the owning node's `Compile` has run.
    pub handle: RawHandle,
}

impl ResourceMeta {
    /// Build metadata for a freshly created handle.
    #[must_use]
    pub fn new(lifetime: Lifetime, shape: Shape, handle: RawHandle) -> Self {
        Self { lifetime, shape, handle }
    }
}

/// Closed tagged union over every GPU/host resource kind the graph can
/// hold in a slot (spec §3.1). Extending this set is a deliberate,
/// auditable change: it also requires extending [`ResourceVariant::validate`]
/// and the allocator dispatch table in [`crate::memory`].
#[derive(Clone, Debug)]
pub enum ResourceVariant {
    /// Device-memory linear buffer.
    Image(ImageDescriptor, ResourceMeta),
    /// Device image (aliases [`ResourceVariant::StorageImage`] use for
    /// non-sampled storage-only access).
    Buffer(BufferDescriptor, ResourceMeta),
    /// View over an existing image.
    ImageView(ResourceMeta),
    /// Sampler state.
    Sampler(ResourceMeta),
    /// Command pool for one queue family.
    CommandPool(ResourceMeta),
    /// Compute or graphics pipeline.
    Pipeline(ResourceMeta),
    /// Pipeline layout (set layouts + push-constant ranges).
    PipelineLayout(ResourceMeta),
    /// Descriptor set allocated from a pool.
    DescriptorSet(ResourceMeta),
    /// Descriptor set layout, reflected from a shader bundle.
    DescriptorSetLayout(ResourceMeta),
    /// Render pass.
    RenderPass(ResourceMeta),
    /// Framebuffer bound to a render pass + attachments.
    Framebuffer(ResourceMeta),
    /// Acceleration structure (BLAS/TLAS pair plus instance buffer).
    AccelerationStructure(ResourceMeta),
    /// Compiled SPIR-V shader module.
    ShaderModule(ResourceMeta),
    /// Reflected shader interface bundle (spec §6 "shader data bundle").
    ShaderDataBundle(ShaderDataBundle, ResourceMeta),
    /// Presentation surface.
    Surface(ResourceMeta),
    /// Swapchain and its image views.
    Swapchain(ResourceMeta),
    /// Logical device handle.
    Device(ResourceMeta),
    /// Storage image (compute read/write target).
    StorageImage(ImageDescriptor, ResourceMeta),
    /// 3D texture (sparse-voxel volumes).
    Texture3D(ImageDescriptor, ResourceMeta),
    /// Buffer whose layout is described by a [`RuntimeStructDescriptor`].
    RuntimeStructBuffer(BufferDescriptor, RuntimeStructDescriptor, ResourceMeta),
    /// Non-owning reference to another node's resource. Per spec §9 design
    /// note 3, this variant is **borrow-only**: it never claims ownership
    /// and its `Cleanup` must not decrement any refcount.
    PassThrough(ResourceMeta),
}

impl ResourceVariant {
    /// Metadata common to every variant.
    #[must_use]
    pub fn meta(&self) -> ResourceMeta {
        match self {
            Self::Image(_, m)
            | Self::Buffer(_, m)
            | Self::ImageView(m)
            | Self::Sampler(m)
            | Self::CommandPool(m)
            | Self::Pipeline(m)
            | Self::PipelineLayout(m)
            | Self::DescriptorSet(m)
            | Self::DescriptorSetLayout(m)
            | Self::RenderPass(m)
            | Self::Framebuffer(m)
            | Self::AccelerationStructure(m)
            | Self::ShaderModule(m)
            | Self::ShaderDataBundle(_, m)
            | Self::Surface(m)
            | Self::Swapchain(m)
            | Self::Device(m)
            | Self::StorageImage(_, m)
            | Self::Texture3D(_, m)
            | Self::RuntimeStructBuffer(_, _, m)
            | Self::PassThrough(m) => *m,
        }
    }

    /// Short, stable name for logs and error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Image(..) => "Image",
            Self::Buffer(..) => "Buffer",
            Self::ImageView(_) => "ImageView",
            Self::Sampler(_) => "Sampler",
            Self::CommandPool(_) => "CommandPool",
            Self::Pipeline(_) => "Pipeline",
            Self::PipelineLayout(_) => "PipelineLayout",
            Self::DescriptorSet(_) => "DescriptorSet",
            Self::DescriptorSetLayout(_) => "DescriptorSetLayout",
            Self::RenderPass(_) => "RenderPass",
            Self::Framebuffer(_) => "Framebuffer",
            Self::AccelerationStructure(_) => "AccelerationStructure",
            Self::ShaderModule(_) => "ShaderModule",
            Self::ShaderDataBundle(..) => "ShaderDataBundle",
            Self::Surface(_) => "Surface",
            Self::Swapchain(_) => "Swapchain",
            Self::Device(_) => "Device",
            Self::StorageImage(..) => "StorageImage",
            Self::Texture3D(..) => "Texture3D",
            Self::RuntimeStructBuffer(..) => "RuntimeStructBuffer",
            Self::PassThrough(_) => "PassThrough",
        }
    }

    /// Structural validation per kind (spec §4.1 `validate()`).
    pub fn validate(&self) -> GraphResult<()> {
        match self {
            Self::Image(desc, _) | Self::StorageImage(desc, _) | Self::Texture3D(desc, _) => desc.validate(),
            Self::Buffer(desc, _) => desc.validate(),
            Self::RuntimeStructBuffer(desc, _, _) => desc.validate(),
            Self::ShaderDataBundle(bundle, _) => bundle.validate(),
            _ => Ok(()),
        }
    }

    /// Deep copy suitable for use as a cache key (spec §4.1 `cloneDescriptor`).
    #[must_use]
    pub fn clone_descriptor(&self) -> Self {
        self.clone()
    }
}

/// One reflected shader binding (spec §6).
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderBinding {
    /// Descriptor set index.
    pub set: u32,
    /// Binding index within the set.
    pub binding: u32,
    /// Descriptor type.
    pub descriptor_type: DescriptorType,
    /// Shader stages that reference this binding.
    pub stage_flags: ShaderStageFlags,
    /// Array count; `1` for a scalar binding.
    pub count: u32,
    /// Index into [`ShaderDataBundle::struct_definitions`], if this binding
    /// is backed by a struct type.
    pub struct_def_index: Option<usize>,
    /// Name as it appears in shader source, used in logs.
    pub name: String,
}

/// Descriptor binding type (closed, mirrors the Vulkan descriptor types
/// this graph actually uses).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    /// Uniform buffer.
    UniformBuffer,
    /// Storage buffer (read/write).
    StorageBuffer,
    /// Storage image.
    StorageImage,
    /// Combined image + sampler.
    CombinedImageSampler,
    /// Acceleration structure (ray-tracing).
    AccelerationStructure,
}

impl DescriptorType {
    /// Map to the `ash` descriptor type.
    #[must_use]
    pub fn to_vk(self) -> ash::vk::DescriptorType {
        match self {
            Self::UniformBuffer => ash::vk::DescriptorType::UNIFORM_BUFFER,
            Self::StorageBuffer => ash::vk::DescriptorType::STORAGE_BUFFER,
            Self::StorageImage => ash::vk::DescriptorType::STORAGE_IMAGE,
            Self::CombinedImageSampler => ash::vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            Self::AccelerationStructure => ash::vk::DescriptorType::ACCELERATION_STRUCTURE_KHR,
        }
    }
}

/// A push-constant range (spec §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PushConstantRange {
    /// Byte offset within the push-constant block.
    pub offset: u32,
    /// Size in bytes.
    pub size: u32,
    /// Shader stages that reference this range.
    pub stage_flags: ShaderStageFlags,
}

/// The shader data bundle: the sole interface between the graph and the
/// (out-of-scope, per spec §1) shader toolchain. Treated as pure input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShaderDataBundle {
    /// Program/entry-point name.
    pub program_name: String,
    /// Reflected bindings.
    pub bindings: Vec<ShaderBinding>,
    /// Reflected struct definitions referenced by bindings.
    pub struct_definitions: Vec<RuntimeStructDescriptor>,
    /// Reflected push-constant ranges.
    pub push_constant_ranges: Vec<PushConstantRange>,
    /// Stable hash of the full descriptor interface, used as part of
    /// pipeline/layout cache keys.
    pub descriptor_interface_hash: u64,
}

impl ShaderDataBundle {
    fn validate(&self) -> GraphResult<()> {
        if self.program_name.is_empty() {
            return Err(GraphError::InvalidGraph("shader data bundle has empty program name".into()));
        }
        for binding in &self.bindings {
            if let Some(idx) = binding.struct_def_index {
                if idx >= self.struct_definitions.len() {
                    return Err(GraphError::InvalidGraph(format!(
                        "binding {} references missing struct def {idx}",
                        binding.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Tracked state for a value wrapped by [`Tracked<T>`] (spec §3.1 `RM<T>`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackedState {
    /// Never written.
    Uninitialized,
    /// Holds a usable value.
    Valid,
    /// Holds a stale value; must be recompiled before use.
    Dirty,
    /// The last operation on this value failed.
    Error,
    /// The value has been released; any further read fails.
    Destroyed,
}

/// Wraps a value plus a state, per spec §3.1's `RM<T>` ("resource state").
/// All public mutation goes through [`Tracked::set`]/[`Tracked::mark_dirty`];
/// reads in `Error`/`Destroyed` fail with `InvalidState`.
#[derive(Debug)]
pub struct Tracked<T> {
    value: Option<T>,
    state: TrackedState,
}

impl<T> Tracked<T> {
    /// Construct an uninitialized tracked value.
    #[must_use]
    pub fn uninitialized() -> Self {
        Self { value: None, state: TrackedState::Uninitialized }
    }

    /// Read the current value, failing if the state is `Error` or `Destroyed`.
    pub fn get(&self) -> GraphResult<&T> {
        match self.state {
            TrackedState::Error | TrackedState::Destroyed => {
                Err(GraphError::InvalidState(format!("read on tracked value in state {:?}", self.state)))
            }
            _ => self.value.as_ref().ok_or_else(|| GraphError::InvalidState("tracked value never set".into())),
        }
    }

    /// Current state, for callers that branch on dirtiness.
    #[must_use]
    pub fn state(&self) -> TrackedState {
        self.state
    }

    /// Set a new value, transitioning to `Valid`.
    pub fn set(&mut self, value: T) {
        self.value = Some(value);
        self.state = TrackedState::Valid;
    }

    /// Mark the value stale without discarding it, so a recompile can
    /// still see the old value while rebuilding (spec §4.8 recompile note).
    pub fn mark_dirty(&mut self) {
        if self.state == TrackedState::Valid {
            self.state = TrackedState::Dirty;
        }
    }

    /// Mark the value as failed; future reads will error until `set` again.
    pub fn mark_error(&mut self) {
        self.state = TrackedState::Error;
    }

    /// Release the value and mark destroyed; idempotent.
    pub fn destroy(&mut self) -> Option<T> {
        self.state = TrackedState::Destroyed;
        self.value.take()
    }
}

impl<T> Default for Tracked<T> {
    fn default() -> Self {
        Self::uninitialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_value_starts_uninitialized() {
        let t: Tracked<u32> = Tracked::uninitialized();
        assert_eq!(t.state(), TrackedState::Uninitialized);
        assert!(t.get().is_err());
    }

    #[test]
    fn tracked_value_round_trips() {
        let mut t = Tracked::uninitialized();
        t.set(42u32);
        assert_eq!(*t.get().unwrap(), 42);
        t.mark_dirty();
        assert_eq!(t.state(), TrackedState::Dirty);
    }

    #[test]
    fn destroyed_tracked_value_fails_read() {
        let mut t = Tracked::uninitialized();
        t.set(1u32);
        t.destroy();
        assert!(t.get().is_err());
    }

    #[test]
    fn pass_through_meta_is_tagged_correctly() {
        let variant = ResourceVariant::PassThrough(ResourceMeta::new(Lifetime::Scope, Shape::Handle, RawHandle::NULL));
        assert_eq!(variant.kind_name(), "PassThrough");
        assert_eq!(variant.meta().lifetime, Lifetime::Scope);
    }
}
