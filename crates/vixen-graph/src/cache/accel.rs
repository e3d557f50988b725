//! Key-building helpers for the acceleration-structure cache (spec §4.4).

use std::hash::{Hash, Hasher};

/// Content key for an acceleration structure: a hash of the geometry that
/// built it, so two nodes submitting identical geometry share one BLAS.
#[must_use]
pub fn acceleration_structure_key(geometry_hash: u64, instance_count: u32) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    geometry_hash.hash(&mut hasher);
    instance_count.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_count_changes_key() {
        let a = acceleration_structure_key(123, 1);
        let b = acceleration_structure_key(123, 2);
        assert_ne!(a, b);
    }
}
