//! Per-kind resource descriptors (spec §3.1 "Resource descriptor base").
//!
//! Every descriptor validates itself and supports deep clone (`Clone` is
//! enough here since descriptors are plain data, no shared state) so they
//! can double as cache keys once hashed (spec §4.4).

use bitflags::bitflags;

use crate::error::{GraphError, GraphResult};

bitflags! {
    /// Buffer usage flags, mapped to the concrete backend in `gpu::device`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        /// Vertex attribute source.
        const VERTEX = 1 << 0;
        /// Index buffer source.
        const INDEX = 1 << 1;
        /// Uniform buffer binding.
        const UNIFORM = 1 << 2;
        /// Storage buffer binding (read/write from shaders).
        const STORAGE = 1 << 3;
        /// Transfer source (staging upload).
        const TRANSFER_SRC = 1 << 4;
        /// Transfer destination.
        const TRANSFER_DST = 1 << 5;
    }
}

bitflags! {
    /// Image usage flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ImageUsage: u32 {
        /// Sampled in a shader.
        const SAMPLED = 1 << 0;
        /// Bound as a storage image (read/write).
        const STORAGE = 1 << 1;
        /// Color attachment target.
        const COLOR_ATTACHMENT = 1 << 2;
        /// Depth/stencil attachment target.
        const DEPTH_STENCIL_ATTACHMENT = 1 << 3;
        /// Transfer source.
        const TRANSFER_SRC = 1 << 4;
        /// Transfer destination.
        const TRANSFER_DST = 1 << 5;
    }
}

bitflags! {
    /// Shader stages a binding or push-constant range is visible to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStageFlags: u32 {
        /// Vertex stage.
        const VERTEX = 1 << 0;
        /// Fragment stage.
        const FRAGMENT = 1 << 1;
        /// Compute stage.
        const COMPUTE = 1 << 2;
    }
}

impl BufferUsage {
    /// Map to the `ash` flag set.
    #[must_use]
    pub fn to_vk(self) -> ash::vk::BufferUsageFlags {
        let mut flags = ash::vk::BufferUsageFlags::empty();
        if self.contains(Self::VERTEX) { flags |= ash::vk::BufferUsageFlags::VERTEX_BUFFER; }
        if self.contains(Self::INDEX) { flags |= ash::vk::BufferUsageFlags::INDEX_BUFFER; }
        if self.contains(Self::UNIFORM) { flags |= ash::vk::BufferUsageFlags::UNIFORM_BUFFER; }
        if self.contains(Self::STORAGE) { flags |= ash::vk::BufferUsageFlags::STORAGE_BUFFER; }
        if self.contains(Self::TRANSFER_SRC) { flags |= ash::vk::BufferUsageFlags::TRANSFER_SRC; }
        if self.contains(Self::TRANSFER_DST) { flags |= ash::vk::BufferUsageFlags::TRANSFER_DST; }
        flags
    }
}

impl ImageUsage {
    /// Map to the `ash` flag set.
    #[must_use]
    pub fn to_vk_image(self) -> ash::vk::ImageUsageFlags {
        let mut flags = ash::vk::ImageUsageFlags::empty();
        if self.contains(Self::SAMPLED) { flags |= ash::vk::ImageUsageFlags::SAMPLED; }
        if self.contains(Self::STORAGE) { flags |= ash::vk::ImageUsageFlags::STORAGE; }
        if self.contains(Self::COLOR_ATTACHMENT) { flags |= ash::vk::ImageUsageFlags::COLOR_ATTACHMENT; }
        if self.contains(Self::DEPTH_STENCIL_ATTACHMENT) { flags |= ash::vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT; }
        if self.contains(Self::TRANSFER_SRC) { flags |= ash::vk::ImageUsageFlags::TRANSFER_SRC; }
        if self.contains(Self::TRANSFER_DST) { flags |= ash::vk::ImageUsageFlags::TRANSFER_DST; }
        flags
    }
}

impl ShaderStageFlags {
    /// Map to the `ash` flag set.
    #[must_use]
    pub fn to_vk(self) -> ash::vk::ShaderStageFlags {
        let mut flags = ash::vk::ShaderStageFlags::empty();
        if self.contains(Self::VERTEX) { flags |= ash::vk::ShaderStageFlags::VERTEX; }
        if self.contains(Self::FRAGMENT) { flags |= ash::vk::ShaderStageFlags::FRAGMENT; }
        if self.contains(Self::COMPUTE) { flags |= ash::vk::ShaderStageFlags::COMPUTE; }
        flags
    }
}

/// Pixel/texel format, closed set sufficient for the ray-march pipelines
/// this graph targets (compute clear, storage images, 3D textures).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// 8 bits/channel RGBA, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 32-bit float per channel RGBA, used for HDR storage images.
    Rgba32Float,
    /// 32-bit depth.
    Depth32Float,
    /// 8-bit single channel, used for material palettes.
    R8Uint,
}

impl Format {
    /// Map to the `ash` format.
    #[must_use]
    pub fn to_vk(self) -> ash::vk::Format {
        match self {
            Self::Rgba8Unorm => ash::vk::Format::R8G8B8A8_UNORM,
            Self::Rgba32Float => ash::vk::Format::R32G32B32A32_SFLOAT,
            Self::Depth32Float => ash::vk::Format::D32_SFLOAT,
            Self::R8Uint => ash::vk::Format::R8_UINT,
        }
    }

    fn is_defined(self) -> bool {
        true
    }
}

/// Buffer creation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferDescriptor {
    /// Size in bytes; must be nonzero.
    pub size_bytes: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Validate per spec §3.1 ("size>0 for buffers").
    pub fn validate(&self) -> GraphResult<()> {
        if self.size_bytes == 0 {
            return Err(GraphError::InvalidGraph("buffer descriptor has zero size".into()));
        }
        Ok(())
    }
}

/// Image creation parameters (2D or 3D via `depth`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageDescriptor {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels; `1` for a 2D image.
    pub depth: u32,
    /// Pixel format.
    pub format: Format,
    /// Usage flags.
    pub usage: ImageUsage,
}

impl Default for ImageDescriptor {
    fn default() -> Self {
        Self { width: 1, height: 1, depth: 1, format: Format::Rgba8Unorm, usage: ImageUsage::SAMPLED }
    }
}

impl ImageDescriptor {
    /// Validate per spec §3.1 ("width>0 ∧ height>0 ∧ format≠undefined").
    pub fn validate(&self) -> GraphResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GraphError::InvalidGraph("image descriptor has a zero dimension".into()));
        }
        if !self.format.is_defined() {
            return Err(GraphError::InvalidGraph("image descriptor has undefined format".into()));
        }
        Ok(())
    }
}

/// One field of a SPIR-V-reflected struct (spec §3.1 "runtime struct descriptor").
#[derive(Clone, Debug, PartialEq)]
pub struct StructField {
    /// Field name as it appears in the shader source.
    pub name: String,
    /// Byte offset within the struct.
    pub offset: u32,
    /// Size in bytes.
    pub size: u32,
    /// Base scalar type (`"float"`, `"int"`, `"uint"`, ...).
    pub base_type: String,
    /// Vector/matrix component count; `1` for scalars.
    pub component_count: u32,
    /// Whether this field is an (unbounded) array.
    pub is_array: bool,
}

/// A runtime struct descriptor: SPIR-V-derived field table plus a layout
/// hash used for schema discovery at compile time (spec §3.1, §4.6).
#[derive(Clone, Debug, Default)]
pub struct RuntimeStructDescriptor {
    /// Struct type name.
    pub name: String,
    /// Total size in bytes.
    pub size: u32,
    /// Ordered fields.
    pub fields: Vec<StructField>,
}

impl RuntimeStructDescriptor {
    /// Compute the 64-bit layout hash used as part of cache keys and for
    /// variadic-slot schema discovery.
    #[must_use]
    pub fn layout_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.name.hash(&mut hasher);
        self.size.hash(&mut hasher);
        for field in &self.fields {
            field.name.hash(&mut hasher);
            field.offset.hash(&mut hasher);
            field.size.hash(&mut hasher);
            field.base_type.hash(&mut hasher);
            field.component_count.hash(&mut hasher);
            field.is_array.hash(&mut hasher);
        }
        hasher.finish()
    }
}
