//! Soft/hard memory budgets per class (spec §4.3).
//!
//! Grounded on the teacher's `ResourceConfig`/`ResourceError::MemoryBudgetExceeded`
//! pair: a configured ceiling per resource pool, a running usage counter,
//! and a typed error naming both the requested and available amounts so
//! callers can log something actionable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::MemoryClass;
use crate::error::{GraphError, GraphResult};

/// Soft and hard byte limits for one memory class.
#[derive(Clone, Copy, Debug)]
pub struct ClassLimits {
    /// Logged as a warning once exceeded, but allocation still proceeds.
    pub soft_limit_bytes: u64,
    /// Allocation fails once usage would exceed this.
    pub hard_limit_bytes: u64,
}

impl ClassLimits {
    /// A reasonable default per class: 256 MiB soft, 512 MiB hard.
    #[must_use]
    pub fn default_for(_class: MemoryClass) -> Self {
        Self { soft_limit_bytes: 256 * 1024 * 1024, hard_limit_bytes: 512 * 1024 * 1024 }
    }
}

/// Tracks current usage against configured limits for every [`MemoryClass`].
pub struct BudgetManager {
    limits: HashMap<MemoryClass, ClassLimits>,
    used: Mutex<HashMap<MemoryClass, u64>>,
}

impl BudgetManager {
    /// Build a manager with default limits for every class.
    #[must_use]
    pub fn new() -> Self {
        let limits = MemoryClass::ALL.iter().map(|&c| (c, ClassLimits::default_for(c))).collect();
        Self { limits, used: Mutex::new(HashMap::new()) }
    }

    /// Override the limits for one class.
    pub fn set_limits(&mut self, class: MemoryClass, limits: ClassLimits) {
        self.limits.insert(class, limits);
    }

    /// Reserve `bytes` against `class`'s budget, failing with
    /// [`GraphError::BudgetExceeded`] if the hard limit would be crossed.
    /// Logs a warning (not an error) when the soft limit is crossed.
    pub fn reserve(&self, class: MemoryClass, bytes: u64) -> GraphResult<()> {
        let limits = *self.limits.get(&class).unwrap_or(&ClassLimits::default_for(class));
        let mut used = self.used.lock().unwrap();
        let current = *used.get(&class).unwrap_or(&0);
        let next = current + bytes;

        if next > limits.hard_limit_bytes {
            return Err(GraphError::BudgetExceeded {
                class: format!("{class:?}"),
                requested: bytes,
                available: limits.hard_limit_bytes.saturating_sub(current),
            });
        }
        if next > limits.soft_limit_bytes {
            log::warn!("{class:?} memory usage {next} exceeds soft limit {}", limits.soft_limit_bytes);
        }
        used.insert(class, next);
        Ok(())
    }

    /// Release a previously reserved amount back to the budget.
    pub fn release(&self, class: MemoryClass, bytes: u64) {
        let mut used = self.used.lock().unwrap();
        let current = used.entry(class).or_insert(0);
        *current = current.saturating_sub(bytes);
    }

    /// Current usage for a class, for diagnostics/tests.
    #[must_use]
    pub fn used_bytes(&self, class: MemoryClass) -> u64 {
        *self.used.lock().unwrap().get(&class).unwrap_or(&0)
    }
}

impl Default for BudgetManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Mirrors host-side reservations made through [`BudgetManager`] into a
/// device-side tracker (e.g. `vk-mem`'s own budget query), so the two never
/// drift apart. The device-side figure is authoritative; this bridge exists
/// because the host-side `BudgetManager` must answer synchronously during
/// graph compile, before any device round-trip.
pub struct BudgetBridge {
    manager: Arc<BudgetManager>,
    device_reported_bytes: AtomicU64,
}

impl BudgetBridge {
    /// Wrap a [`BudgetManager`] with a device-side mirror, both starting at
    /// zero reported usage.
    #[must_use]
    pub fn new(manager: Arc<BudgetManager>) -> Self {
        Self { manager, device_reported_bytes: AtomicU64::new(0) }
    }

    /// Update the mirrored device-reported usage, typically read from
    /// `vk-mem`'s heap budget query once per frame.
    pub fn sync_from_device(&self, class: MemoryClass, device_used_bytes: u64) {
        self.device_reported_bytes.store(device_used_bytes, Ordering::Release);
        let host_used = self.manager.used_bytes(class);
        if device_used_bytes > host_used {
            log::debug!(
                "{class:?} device-reported usage {device_used_bytes} exceeds host tracker {host_used}; host is lagging"
            );
        }
    }

    /// The most recent device-reported figure.
    #[must_use]
    pub fn device_reported_bytes(&self) -> u64 {
        self.device_reported_bytes.load(Ordering::Acquire)
    }
}
