//! Opaque GPU API surface.
//!
//! Spec §6 treats the concrete Vulkan API as an external collaborator: "any
//! API offering [device/queue/command-buffer/pipeline/...] suffices". This
//! module is that seam: [`GpuDevice`] is the trait the render-graph core
//! talks to; [`ash`] backs the concrete implementation in [`device`], the
//! way the teacher's `VulkanContext` wraps `ash::Device`/`ash::Instance`
//! directly. A test-only fake (`device::fake`) implements the same trait
//! without touching real hardware, used by the graph compiler's unit tests.

pub mod device;
pub mod sync;
pub mod types;

pub use device::{GpuDevice, PhysicalDeviceInfo, QueueFamilyInfo};
pub use sync::{Fence, FrameSync, Semaphore};
pub use types::*;

use thiserror::Error;

/// Errors surfaced by the GPU API seam. Kept separate from [`crate::error::GraphError`]
/// so backend crates can depend on this module without pulling in the whole graph.
#[derive(Error, Debug, Clone)]
pub enum GpuError {
    /// The underlying API returned a non-success result code.
    #[error("gpu api error at {site}: {code}")]
    Api {
        /// Where in the call sequence the failure occurred, for diagnostics.
        site: &'static str,
        /// String form of the backend's result code (e.g. `ash::vk::Result`).
        code: String,
    },

    /// No physical device satisfies the requested capability set.
    #[error("no suitable physical device: {0}")]
    NoSuitableDevice(String),

    /// A wait (fence, semaphore) exceeded its timeout.
    #[error("timed out waiting on {0}")]
    Timeout(&'static str),

    /// The swapchain needs to be rebuilt (surface resized or lost).
    #[error("swapchain out of date")]
    SwapchainOutOfDate,
}
