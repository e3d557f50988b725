//! Stack-structured lifetime scopes (spec §4.2).

use super::SharedResource;

/// Which stack a scope belongs to. Mirrors the scope-bound variants of
/// [`crate::resource::Lifetime`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    /// Released at the end of the current frame.
    Frame,
    /// Released at the end of the current graph compile.
    Compile,
    /// Released only on explicit teardown.
    Persistent,
}

/// A guard holding every [`SharedResource`] acquired within it. Dropping the
/// guard — on normal return, an early `?`, or panic unwinding — releases
/// every reference it holds, since `Vec<SharedResource>`'s own `Drop` runs
/// [`SharedResource`]'s drop for each entry in order.
pub struct LifetimeScope {
    kind: ScopeKind,
    held: Vec<SharedResource>,
}

impl LifetimeScope {
    /// Open a new, empty scope of the given kind.
    #[must_use]
    pub fn new(kind: ScopeKind) -> Self {
        Self { kind, held: Vec::new() }
    }

    /// Which stack this scope belongs to.
    #[must_use]
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Take ownership of a reference for the lifetime of this scope.
    pub fn hold(&mut self, resource: SharedResource) {
        self.held.push(resource);
    }

    /// Number of references currently held by this scope.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Release every held reference now, without waiting for the guard to
    /// drop. Used when a scope closes explicitly (e.g. end-of-frame) rather
    /// than by falling out of a Rust lexical scope.
    pub fn release_all(&mut self) {
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    use super::*;
    use crate::gpu::RawHandle;
    use crate::resource::{Lifetime, ResourceMeta, Shape, ResourceVariant};

    fn dummy_handle() -> SharedResource {
        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock = Arc::new(AtomicU64::new(0));
        let variant = ResourceVariant::Device(ResourceMeta::new(Lifetime::Scope, Shape::Handle, RawHandle::NULL));
        SharedResource::new(variant, clock, tx)
    }

    #[test]
    fn release_all_drops_every_held_reference() {
        let mut scope = LifetimeScope::new(ScopeKind::Frame);
        let handle = dummy_handle();
        scope.hold(handle.clone());
        scope.hold(handle.clone());
        assert_eq!(scope.held_count(), 2);
        assert_eq!(handle.strong_count(), 3);
        scope.release_all();
        assert_eq!(handle.strong_count(), 1);
    }

    #[test]
    fn guard_drop_releases_refs_on_early_return() {
        fn inner(handle: &SharedResource) {
            let mut scope = LifetimeScope::new(ScopeKind::Compile);
            scope.hold(handle.clone());
            if handle.strong_count() >= 1 {
                return; // early exit; guard still drops at end of this fn
            }
        }
        let handle = dummy_handle();
        inner(&handle);
        assert_eq!(handle.strong_count(), 1);
    }
}
