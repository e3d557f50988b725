//! Parallel wave-recording worker pool (spec §4.8 step 6, §5).
//!
//! Grounded on the teacher's `ecs/scheduler.rs` `ThreadPool`/`Worker`: a
//! fixed set of threads draining a bounded job queue. Adapted from a
//! `'static`-only job queue to a scoped one (`crossbeam::scope`), since a
//! wave's jobs need to borrow each node's `&mut NodeInstance` directly
//! rather than move owned state across threads.

use crossbeam::channel::bounded;

/// Runs batches of jobs across a fixed number of worker threads, one batch
/// per [`WavePool::map`] call. Sized once at construction, same as the
/// node-local thread pools elsewhere in the crate's concurrency model.
pub struct WavePool {
    worker_count: usize,
}

impl WavePool {
    /// Build a pool with `worker_count` threads (clamped to at least one).
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        Self { worker_count: worker_count.max(1) }
    }

    /// Configured worker thread count.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Run `job` once per item in `items`, spread across up to
    /// [`Self::worker_count`] threads, returning results in `items`'
    /// original order. A wave's nodes are exactly the set the compiler has
    /// already proven don't conflict over a resource (spec §4.8 step 4), so
    /// running them concurrently here never races.
    pub fn map<T, R, F>(&self, items: Vec<T>, job: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let (job_tx, job_rx) = bounded::<(usize, T)>(total);
        let (result_tx, result_rx) = bounded::<(usize, R)>(total);

        for (index, item) in items.into_iter().enumerate() {
            job_tx.send((index, item)).expect("channel sized to item count");
        }
        drop(job_tx);

        crossbeam::scope(|scope| {
            for _ in 0..self.worker_count.min(total) {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let job = &job;
                scope.spawn(move |_| {
                    while let Ok((index, item)) = job_rx.recv() {
                        let result = job(item);
                        let _ = result_tx.send((index, result));
                    }
                });
            }
        })
        .expect("wave-recording worker thread panicked");

        drop(result_tx);
        let mut indexed: Vec<(usize, R)> = result_rx.iter().collect();
        indexed.sort_unstable_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::WavePool;

    #[test]
    fn map_preserves_input_order_regardless_of_completion_order() {
        let pool = WavePool::new(4);
        let items = vec![30u64, 10, 0, 20];
        let results = pool.map(items.clone(), |delay_ms| {
            std::thread::sleep(std::time::Duration::from_millis(delay_ms));
            delay_ms
        });
        assert_eq!(results, items);
    }

    #[test]
    fn map_runs_every_item_exactly_once() {
        let pool = WavePool::new(3);
        let calls = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..10).collect();
        let calls_clone = calls.clone();
        let results = pool.map(items, move |i| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            i * 2
        });
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(results, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn map_on_empty_input_returns_empty() {
        let pool = WavePool::new(2);
        let results: Vec<u32> = pool.map(Vec::new(), |x| x);
        assert!(results.is_empty());
    }
}
