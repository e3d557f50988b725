//! Key-building helpers for the pipeline-shaped caches (spec §4.4, §4.6).

use std::hash::{Hash, Hasher};

use crate::gpu::RawHandle;
use crate::resource::ShaderDataBundle;

/// Content key for a descriptor set layout: the bundle's reflected
/// descriptor interface hash IS the key, since two bundles with the same
/// interface hash are required (spec §6) to describe identical layouts.
#[must_use]
pub fn descriptor_set_layout_key(bundle: &ShaderDataBundle) -> u64 {
    bundle.descriptor_interface_hash
}

/// Content key for a pipeline layout: hash of its set layouts (order
/// matters) plus total push-constant byte size.
#[must_use]
pub fn pipeline_layout_key(set_layouts: &[RawHandle], push_constant_bytes: u32) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for handle in set_layouts {
        handle.0.hash(&mut hasher);
    }
    push_constant_bytes.hash(&mut hasher);
    hasher.finish()
}

/// Content key for a compute pipeline: shader module handle, entry point,
/// and layout.
#[must_use]
pub fn compute_pipeline_key(shader_module: RawHandle, entry_point: &str, layout: RawHandle) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    shader_module.0.hash(&mut hasher);
    entry_point.hash(&mut hasher);
    layout.0.hash(&mut hasher);
    hasher.finish()
}

/// Content key for a graphics pipeline: bundle interface hash, layout, and
/// optional render pass.
#[must_use]
pub fn graphics_pipeline_key(bundle: &ShaderDataBundle, layout: RawHandle, render_pass: Option<RawHandle>) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    bundle.descriptor_interface_hash.hash(&mut hasher);
    layout.0.hash(&mut hasher);
    render_pass.map(|h| h.0).unwrap_or(0).hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_layout_key_is_order_sensitive() {
        let a = pipeline_layout_key(&[RawHandle(1), RawHandle(2)], 0);
        let b = pipeline_layout_key(&[RawHandle(2), RawHandle(1)], 0);
        assert_ne!(a, b);
    }

    #[test]
    fn graphics_pipeline_key_changes_with_render_pass() {
        let bundle = ShaderDataBundle { descriptor_interface_hash: 7, ..Default::default() };
        let a = graphics_pipeline_key(&bundle, RawHandle(1), None);
        let b = graphics_pipeline_key(&bundle, RawHandle(1), Some(RawHandle(9)));
        assert_ne!(a, b);
    }
}
