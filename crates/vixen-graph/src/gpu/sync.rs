//! GPU-GPU and CPU-GPU synchronization primitives.
//!
//! Grounded directly on the teacher's `state/sync.rs`: binary semaphores
//! for GPU-GPU coordination, fences for CPU-GPU coordination, and a
//! `FrameSync` bundle combining both for one frame-in-flight slot.

use std::sync::Arc;

use ash::vk;

use super::GpuError;

/// GPU-GPU synchronization primitive with RAII cleanup.
pub struct Semaphore {
    device: Arc<ash::Device>,
    handle: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore.
    pub fn new(device: Arc<ash::Device>) -> Result<Self, GpuError> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let handle = unsafe { device.create_semaphore(&create_info, None) }
            .map_err(|e| api_err("Semaphore::new", e))?;
        Ok(Self { device, handle })
    }

    /// The raw Vulkan handle, for submission calls.
    #[must_use]
    pub fn handle(&self) -> vk::Semaphore {
        self.handle
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.destroy_semaphore(self.handle, None) };
    }
}

/// CPU-GPU synchronization primitive with RAII cleanup.
pub struct Fence {
    device: Arc<ash::Device>,
    handle: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled (used for the first
    /// frame so the initial wait does not block).
    pub fn new(device: Arc<ash::Device>, signaled: bool) -> Result<Self, GpuError> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let handle = unsafe { device.create_fence(&create_info, None) }
            .map_err(|e| api_err("Fence::new", e))?;
        Ok(Self { device, handle })
    }

    /// Block until the fence signals or `timeout_ns` elapses.
    pub fn wait(&self, timeout_ns: u64) -> Result<(), GpuError> {
        unsafe { self.device.wait_for_fences(&[self.handle], true, timeout_ns) }
            .map_err(|_| GpuError::Timeout("Fence::wait"))
    }

    /// Reset the fence to unsignaled, required before reuse.
    pub fn reset(&self) -> Result<(), GpuError> {
        unsafe { self.device.reset_fences(&[self.handle]) }.map_err(|e| api_err("Fence::reset", e))
    }

    /// The raw Vulkan handle.
    #[must_use]
    pub fn handle(&self) -> vk::Fence {
        self.handle
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.destroy_fence(self.handle, None) };
    }
}

/// Synchronization bundle for one frame-in-flight slot (spec §4.9).
pub struct FrameSync {
    /// Signaled when the swapchain image for this slot becomes available.
    pub image_available: Semaphore,
    /// Signaled when this slot's rendering is complete.
    pub render_finished: Semaphore,
    /// Gates CPU reuse of this slot until the GPU is done with it.
    pub in_flight: Fence,
}

impl FrameSync {
    /// Build a frame-sync bundle, with the fence pre-signaled so the first
    /// wait on this slot does not block.
    pub fn new(device: Arc<ash::Device>) -> Result<Self, GpuError> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device, true)?,
        })
    }
}

fn api_err(site: &'static str, code: vk::Result) -> GpuError {
    GpuError::Api { site, code: format!("{code:?}") }
}
