//! Key-building helpers for the scene-data cache (spec §4.4, §6 "scene data
//! blob" — kept deliberately opaque, see [`crate::resource::ShaderDataBundle`]
//! for the one structured exception).

use std::hash::{Hash, Hasher};

/// Content key for an opaque scene-data blob: a hash of its raw bytes.
/// The graph core never interprets the contents (spec §9 design note 2),
/// so identical bytes are the only equivalence it can reason about.
#[must_use]
pub fn scene_data_key(bytes: &[u8]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}
