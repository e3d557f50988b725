//! Concrete leaf node types (spec §4.11).
//!
//! Each submodule declares one [`crate::node::NodeType`] factory plus the
//! [`crate::node::NodeBehavior`] backing it. Grounded on the teacher's
//! `render/vulkan/renderer`/`render/vulkan/system` split: one file per
//! Vulkan object family, a thin behavior struct that snapshots whatever
//! params it needs at `Setup`/`Compile` and reads them back in `Execute`.

pub mod command_pool;
pub mod descriptor_set;
pub mod device;
pub mod dispatch;
pub mod pipeline;
pub mod render_pass;
pub mod swapchain;

use crossbeam::channel::Sender;

use crate::node::NodeContext;
use crate::resource::ResourceVariant;
use crate::shared::SharedResource;

/// Wrap a freshly built [`ResourceVariant`] in a [`SharedResource`] using
/// the clock/reclaim channel a node's [`NodeContext`] carries. Every leaf
/// node's `compile` should route its outputs through this rather than
/// constructing `SharedResource::new` directly, so a future change to what
/// gets cloned into a resource only has one call site to touch.
#[must_use]
pub fn wrap(ctx: &NodeContext<'_>, variant: ResourceVariant) -> SharedResource {
    SharedResource::new(variant, ctx.clock.clone(), ctx.reclaim.clone())
}

/// Borrow the [`Sender`] half of a context's reclaim channel, for code that
/// wants to clone it without going through [`wrap`] (e.g. passing it on to
/// a [`crate::cache::ContentCache::get_or_create`] call).
#[must_use]
pub fn reclaim_sender(ctx: &NodeContext<'_>) -> Sender<(u64, ResourceVariant)> {
    ctx.reclaim.clone()
}
