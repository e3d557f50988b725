//! Frame scheduler & sync: the ring of frame slots and the per-frame step
//! (spec §4.9).
//!
//! Grounded directly on the teacher's `render/vulkan/renderer/sync_manager.rs`
//! (`SyncManager::wait_for_frame_completion`/`acquire_next_image`/
//! `submit_and_present`), generalized from "one hard-coded render pass" to
//! "play an ordered [`crate::graph::WaveTable`]" and rebuilt against the
//! [`crate::gpu::GpuDevice`] trait seam instead of calling `ash` directly,
//! so the step function also runs against [`crate::gpu::device::fake::FakeGpuDevice`]
//! in tests.

pub mod timestamp;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender};

use crate::error::{GraphError, GraphResult};
use crate::event::{EventBus, Topic};
use crate::gpu::{GpuDevice, GpuError, RawHandle};
use crate::resource::ResourceVariant;
use crate::shared::deferred::DeferredDestructionQueue;
use crate::shared::FrameClock;

pub use timestamp::TimestampReading;

/// Lower/upper bound on `MAX_FRAMES_IN_FLIGHT` (spec §6 `sync.frames_in_flight`).
pub const MIN_FRAMES_IN_FLIGHT: u64 = 1;
/// See [`MIN_FRAMES_IN_FLIGHT`].
pub const MAX_FRAMES_IN_FLIGHT: u64 = 4;
/// Documented default when configuration omits `sync.frames_in_flight`.
pub const DEFAULT_FRAMES_IN_FLIGHT: u64 = 2;

/// Everything one frame-in-flight slot owns (spec §4.9): a fence gating
/// CPU reuse, two semaphores for GPU-GPU ordering, one command pool per
/// queue family, and (if the graph has timing nodes) a 2-entry timestamp
/// query pool.
pub struct FrameSlot {
    /// Gates CPU reuse of this slot until the GPU has finished with it.
    pub fence: RawHandle,
    /// Signaled when this slot's swapchain image becomes available.
    pub image_available: RawHandle,
    /// Signaled when this slot's rendering work completes.
    pub render_finished: RawHandle,
    /// Command pool per queue family index.
    pub command_pools: HashMap<u32, RawHandle>,
    /// Per-slot timestamp query pool, if timing is enabled.
    pub timestamp_pool: Option<RawHandle>,
}

/// The handle to one live frame returned by [`FrameScheduler::begin_frame`],
/// carrying everything [`crate::node::FrameContext`] needs plus the
/// acquired swapchain image index.
pub struct FrameHandle {
    /// This frame's monotonic index (`F` in spec §4.9).
    pub frame_index: u64,
    /// `F mod MAX_FRAMES_IN_FLIGHT`, selecting which slot is live.
    pub slot_index: usize,
    /// Swapchain image index acquired for this frame.
    pub image_index: u32,
    /// Resources reclaimed from the deferred-destruction queue this frame
    /// (already past their `frames_in_flight` safety window).
    pub reclaimed: Vec<ResourceVariant>,
}

/// Ring of frame-in-flight slots plus the deferred-destruction queue,
/// driving the six-step frame loop from spec §4.9.
pub struct FrameScheduler {
    slots: Vec<FrameSlot>,
    frame_index: u64,
    frames_in_flight: u64,
    frames_submitted: u64,
    clock: FrameClock,
    deferred: DeferredDestructionQueue,
    reclaim_rx: Receiver<(u64, ResourceVariant)>,
    reclaim_tx: Sender<(u64, ResourceVariant)>,
}

impl FrameScheduler {
    /// Build the frame-slot ring, creating one fence (pre-signaled), two
    /// semaphores, and one command pool per entry in `queue_families` for
    /// each slot. `frames_in_flight` is clamped to `1..=4` per spec §6.
    pub fn new(device: &dyn GpuDevice, queue_families: &[u32], frames_in_flight: u64) -> GraphResult<Self> {
        let frames_in_flight = frames_in_flight.clamp(MIN_FRAMES_IN_FLIGHT, MAX_FRAMES_IN_FLIGHT);
        let mut slots = Vec::with_capacity(frames_in_flight as usize);

        for _ in 0..frames_in_flight {
            let fence = device.create_fence(true).map_err(GraphError::Gpu)?;
            let image_available = device.create_semaphore().map_err(GraphError::Gpu)?;
            let render_finished = device.create_semaphore().map_err(GraphError::Gpu)?;
            let mut command_pools = HashMap::new();
            for &family in queue_families {
                command_pools.insert(family, device.create_command_pool(family).map_err(GraphError::Gpu)?);
            }
            slots.push(FrameSlot { fence, image_available, render_finished, command_pools, timestamp_pool: None });
        }

        let (reclaim_tx, reclaim_rx) = crossbeam::channel::unbounded();

        Ok(Self {
            slots,
            frame_index: 0,
            frames_in_flight,
            frames_submitted: 0,
            clock: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            deferred: DeferredDestructionQueue::new(),
            reclaim_rx,
            reclaim_tx,
        })
    }

    /// Configured ring size.
    #[must_use]
    pub fn frames_in_flight(&self) -> u64 {
        self.frames_in_flight
    }

    /// Shared frame counter handle, passed to every [`crate::shared::SharedResource::new`]
    /// so a drop can tag its deferred entry with the frame it happened on.
    #[must_use]
    pub fn clock(&self) -> FrameClock {
        Arc::clone(&self.clock)
    }

    /// Sending half of the reclaim channel, passed to every new
    /// [`crate::shared::SharedResource`] alongside [`Self::clock`].
    #[must_use]
    pub fn reclaim_sender(&self) -> Sender<(u64, ResourceVariant)> {
        self.reclaim_tx.clone()
    }

    /// Steps 1-3 of the frame loop (spec §4.9): wait this slot's fence,
    /// drain anything now safely reclaimable, and acquire the next
    /// swapchain image.
    pub fn begin_frame(&mut self, device: &dyn GpuDevice, swapchain: RawHandle, events: &EventBus) -> GraphResult<FrameHandle> {
        let slot_index = (self.frame_index % self.frames_in_flight) as usize;
        let slot = &self.slots[slot_index];

        if self.frame_index >= self.frames_in_flight {
            device.wait_fence(slot.fence, 1_000_000_000).map_err(GraphError::Gpu)?;
        }

        // Pull in every drop that happened since the last drain so this
        // slot's deferred entries are tagged before we check reclaimability.
        while let Ok((frame, resource)) = self.reclaim_rx.try_recv() {
            self.deferred.enqueue(resource, frame);
        }
        let reclaimed = self.deferred.drain_reclaimable(self.frame_index, self.frames_in_flight);

        let image_index = device.acquire_next_image(swapchain, slot.image_available).map_err(|e| match e {
            GpuError::SwapchainOutOfDate => GraphError::Gpu(e),
            other => GraphError::Gpu(other),
        })?;

        events.publish(Topic::FrameStart(self.frame_index));

        Ok(FrameHandle { frame_index: self.frame_index, slot_index, image_index, reclaimed })
    }

    /// Command pool for `queue_family` in the currently-active slot, for
    /// [`crate::node::FrameContext::command_pool`].
    #[must_use]
    pub fn command_pool(&self, handle: &FrameHandle, queue_family: u32) -> Option<RawHandle> {
        self.slots[handle.slot_index].command_pools.get(&queue_family).copied()
    }

    /// Steps 5-6: submit every wave's command buffers in order (waiting on
    /// the image semaphore before the first, signaling render-finished
    /// after the last), then present and re-arm the slot's fence.
    pub fn submit_and_present(
        &mut self,
        device: &dyn GpuDevice,
        handle: &FrameHandle,
        queue_family: u32,
        swapchain: RawHandle,
        waves: &[Vec<RawHandle>],
        events: &EventBus,
    ) -> GraphResult<()> {
        let slot = &self.slots[handle.slot_index];
        device.reset_fence(slot.fence).map_err(GraphError::Gpu)?;

        for (index, wave) in waves.iter().enumerate() {
            let waits: &[RawHandle] = if index == 0 { std::slice::from_ref(&slot.image_available) } else { &[] };
            let is_last = index + 1 == waves.len();
            let signals: &[RawHandle] = if is_last { std::slice::from_ref(&slot.render_finished) } else { &[] };
            let fence = if is_last { Some(slot.fence) } else { None };
            device.submit(queue_family, wave, waits, signals, fence).map_err(GraphError::Gpu)?;
        }

        device
            .present(queue_family, swapchain, handle.image_index, slot.render_finished)
            .map_err(GraphError::Gpu)?;

        self.frames_submitted = self.frames_submitted.max(handle.frame_index + 1);
        events.publish(Topic::FrameEnd(handle.frame_index));
        events.drain();

        self.frame_index += 1;
        self.clock.store(self.frame_index, Ordering::Release);
        Ok(())
    }

    /// Number of resources still awaiting reclamation, for diagnostics.
    #[must_use]
    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::device::fake::FakeGpuDevice;

    #[test]
    fn frames_in_flight_is_clamped_to_documented_range() {
        let device = FakeGpuDevice::new();
        let scheduler = FrameScheduler::new(&device, &[0], 99).unwrap();
        assert_eq!(scheduler.frames_in_flight(), MAX_FRAMES_IN_FLIGHT);

        let scheduler = FrameScheduler::new(&device, &[0], 0).unwrap();
        assert_eq!(scheduler.frames_in_flight(), MIN_FRAMES_IN_FLIGHT);
    }

    #[test]
    fn begin_frame_does_not_wait_on_a_slot_never_submitted() {
        let device = FakeGpuDevice::new();
        let mut scheduler = FrameScheduler::new(&device, &[0], 2).unwrap();
        let swapchain = device.create_swapchain(RawHandle::NULL, 3).unwrap();
        let events = EventBus::new();
        let handle = scheduler.begin_frame(&device, swapchain, &events).unwrap();
        assert_eq!(handle.frame_index, 0);
        assert!(handle.reclaimed.is_empty());
    }

    #[test]
    fn full_step_advances_frame_index_and_publishes_frame_events() {
        let device = FakeGpuDevice::new();
        let mut scheduler = FrameScheduler::new(&device, &[0], 2).unwrap();
        let swapchain = device.create_swapchain(RawHandle::NULL, 3).unwrap();
        let events = EventBus::new();

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _token = events.subscribe(Topic::FrameEnd(0), move |t| seen_clone.lock().unwrap().push(t));

        let handle = scheduler.begin_frame(&device, swapchain, &events).unwrap();
        let cb = device.allocate_command_buffer(RawHandle::NULL).unwrap();
        scheduler.submit_and_present(&device, &handle, 0, swapchain, &[vec![cb]], &events).unwrap();

        assert_eq!(scheduler.frame_index, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn deferred_resource_is_reclaimed_after_frames_in_flight_elapse() {
        let device = FakeGpuDevice::new();
        let mut scheduler = FrameScheduler::new(&device, &[0], 2).unwrap();
        let swapchain = device.create_swapchain(RawHandle::NULL, 3).unwrap();
        let events = EventBus::new();

        let variant = ResourceVariant::Device(crate::resource::ResourceMeta::new(
            crate::resource::Lifetime::Transient,
            crate::resource::Shape::Handle,
            RawHandle::NULL,
        ));
        let resource = crate::shared::SharedResource::new(variant, scheduler.clock(), scheduler.reclaim_sender());
        drop(resource);

        for _ in 0..2 {
            let handle = scheduler.begin_frame(&device, swapchain, &events).unwrap();
            let cb = device.allocate_command_buffer(RawHandle::NULL).unwrap();
            scheduler.submit_and_present(&device, &handle, 0, swapchain, &[vec![cb]], &events).unwrap();
        }

        let handle = scheduler.begin_frame(&device, swapchain, &events).unwrap();
        assert_eq!(handle.reclaimed.len(), 1);
    }
}
