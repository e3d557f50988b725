//! Shared-resource lifetime management (spec §4.2).
//!
//! Two pieces: [`SharedResource`], an intrusively-refcounted handle whose
//! last-reference drop routes into a [`deferred::DeferredDestructionQueue`]
//! rather than destroying the GPU object in place, and [`scope::LifetimeScope`],
//! a stack-structured guard that releases every reference it holds when it
//! goes out of scope by any exit path.

pub mod deferred;
pub mod scope;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam::channel::Sender;

pub use scope::{LifetimeScope, ScopeKind};

use crate::resource::ResourceVariant;

/// Process-wide frame counter the frame scheduler advances once per frame
/// boundary. A [`SharedResource`] reads it at drop time to tag its deferred
/// entry with the frame its refcount reached zero on (spec §4.2, §4.9).
pub type FrameClock = Arc<AtomicU64>;

struct Inner {
    resource: Mutex<Option<ResourceVariant>>,
    refcount: AtomicUsize,
    clock: FrameClock,
    reclaim: Sender<(u64, ResourceVariant)>,
}

/// An intrusively-refcounted resource handle (spec §4.2).
///
/// Deliberately not a plain [`std::sync::Arc`]: the refcount is tracked by
/// hand so the last-reference transition can route the resource into a
/// [`deferred::DeferredDestructionQueue`] instead of running its destructor
/// inline, which would race a GPU still consuming it from an in-flight
/// frame's command buffers.
pub struct SharedResource {
    inner: Arc<Inner>,
}

impl SharedResource {
    /// Wrap a resource with a fresh refcount of 1.
    #[must_use]
    pub fn new(resource: ResourceVariant, clock: FrameClock, reclaim: Sender<(u64, ResourceVariant)>) -> Self {
        Self {
            inner: Arc::new(Inner {
                resource: Mutex::new(Some(resource)),
                refcount: AtomicUsize::new(1),
                clock,
                reclaim,
            }),
        }
    }

    /// Current number of live handles to this resource.
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.inner.refcount.load(Ordering::Acquire)
    }

    /// Run `f` against the underlying resource, if it has not already been
    /// reclaimed. Used by nodes that need to read a descriptor or handle
    /// without taking ownership.
    pub fn with_resource<R>(&self, f: impl FnOnce(&ResourceVariant) -> R) -> Option<R> {
        self.inner.resource.lock().unwrap().as_ref().map(f)
    }

    /// Pointer identity check, used by cache tests to assert "same handle
    /// returned on a repeated lookup" (spec §8 scenario S3).
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl Clone for SharedResource {
    fn clone(&self) -> Self {
        self.inner.refcount.fetch_add(1, Ordering::AcqRel);
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl Drop for SharedResource {
    fn drop(&mut self) {
        if self.inner.refcount.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Some(resource) = self.inner.resource.lock().unwrap().take() {
                let frame = self.inner.clock.load(Ordering::Acquire);
                // Receiver side (frame scheduler) may already be gone during
                // process teardown; a dropped channel is not an error here.
                let _ = self.inner.reclaim.send((frame, resource));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::RawHandle;
    use crate::resource::{Lifetime, ResourceMeta, Shape};

    fn dummy() -> ResourceVariant {
        ResourceVariant::Device(ResourceMeta::new(Lifetime::Persistent, Shape::Handle, RawHandle::NULL))
    }

    #[test]
    fn clone_increments_and_drop_decrements_refcount() {
        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = Arc::new(AtomicU64::new(0));
        let a = SharedResource::new(dummy(), clock, tx);
        assert_eq!(a.strong_count(), 1);
        let b = a.clone();
        assert_eq!(a.strong_count(), 2);
        drop(b);
        assert_eq!(a.strong_count(), 1);
    }

    #[test]
    fn last_drop_enqueues_for_deferred_destruction() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = Arc::new(AtomicU64::new(7));
        let a = SharedResource::new(dummy(), clock, tx);
        drop(a);
        let (frame, _resource) = rx.try_recv().expect("resource should have been enqueued");
        assert_eq!(frame, 7);
    }

    #[test]
    fn clone_shares_pointer_identity() {
        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = Arc::new(AtomicU64::new(0));
        let a = SharedResource::new(dummy(), clock, tx);
        let b = a.clone();
        assert!(SharedResource::ptr_eq(&a, &b));
    }
}
