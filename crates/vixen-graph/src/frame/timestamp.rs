//! GPU timing via a 2-slot timestamp query pool per frame slot (spec §4.9
//! "Timestamp queries").
//!
//! Results are read from the *previous* frame's pool rather than the one
//! just recorded, so the CPU never stalls waiting on a query that has not
//! yet retired.

use crate::gpu::{GpuDevice, GpuError, RawHandle};

/// One frame's timing result, converted to nanoseconds using the device's
/// `timestamp_period_ns`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimestampReading {
    /// Frame index the reading was recorded on.
    pub frame_index: u64,
    /// Wall time between the begin/end timestamps, in nanoseconds.
    pub duration_ns: f64,
}

/// Owns one query pool per frame slot, reading each slot's previous
/// occupant's result before that slot is reused for the current frame.
pub struct TimestampTracker {
    pools: Vec<RawHandle>,
    timestamp_period_ns: f32,
    last_reading: Vec<Option<TimestampReading>>,
}

impl TimestampTracker {
    /// Create one query pool per frame slot via `device`.
    pub fn new(device: &dyn GpuDevice, slot_count: usize, timestamp_period_ns: f32) -> Result<Self, GpuError> {
        let mut pools = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            pools.push(device.create_timestamp_query_pool()?);
        }
        Ok(Self { pools, timestamp_period_ns, last_reading: vec![None; slot_count] })
    }

    /// Query pool handle for `slot_index`, for a node to wrap its recorded
    /// commands with begin/end timestamp writes.
    #[must_use]
    pub fn pool_for_slot(&self, slot_index: usize) -> RawHandle {
        self.pools[slot_index]
    }

    /// Read back `slot_index`'s pool (holding the *previous* occupant's
    /// timestamps, since this slot was last used `frames_in_flight` frames
    /// ago) and cache the converted reading, tagged with `frame_index`.
    pub fn collect(&mut self, device: &dyn GpuDevice, slot_index: usize, frame_index: u64) -> Result<(), GpuError> {
        let (begin, end) = device.read_timestamp_query(self.pools[slot_index])?;
        let duration_ns = (end.saturating_sub(begin)) as f64 * f64::from(self.timestamp_period_ns);
        self.last_reading[slot_index] = Some(TimestampReading { frame_index, duration_ns });
        Ok(())
    }

    /// Most recent reading collected for `slot_index`, if any.
    #[must_use]
    pub fn last_reading(&self, slot_index: usize) -> Option<TimestampReading> {
        self.last_reading[slot_index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::device::fake::FakeGpuDevice;

    #[test]
    fn collect_converts_device_ticks_to_nanoseconds() {
        let device = FakeGpuDevice::new();
        let mut tracker = TimestampTracker::new(&device, 2, 1.0).unwrap();
        tracker.collect(&device, 0, 5).unwrap();
        let reading = tracker.last_reading(0).unwrap();
        assert_eq!(reading.frame_index, 5);
        assert!(reading.duration_ns >= 0.0);
    }

    #[test]
    fn slots_track_independent_readings() {
        let device = FakeGpuDevice::new();
        let mut tracker = TimestampTracker::new(&device, 2, 2.0).unwrap();
        tracker.collect(&device, 0, 1).unwrap();
        assert!(tracker.last_reading(1).is_none());
    }
}
