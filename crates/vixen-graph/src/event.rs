//! Process-wide event bus (spec §4.7).
//!
//! Grounded on the teacher's `events/mod.rs` `EventSystem`: a handler-per-
//! topic map and queue-then-dispatch delivery. Reworked from the teacher's
//! single `Event` enum payload to a typed-topic design so each topic's
//! subscribers receive the matching payload directly with no downcasting,
//! and from `Box<dyn EventHandler>` registration to an opaque-token
//! subscription so dropping the guard automatically deregisters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Topics the graph core publishes (spec §4.7). Each carries the payload
/// named in its variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A shader was recompiled; pipelines built from it should go dirty.
    ShaderReloaded,
    /// The presentation surface was resized; swapchain-dependent nodes
    /// should rebuild.
    SwapchainResized,
    /// Frame `index` is beginning; delivered before any node's `Execute`
    /// for that frame (spec §5 ordering guarantee).
    FrameStart(u64),
    /// Frame `index` has finished; delivered after every `Execute` for
    /// that frame.
    FrameEnd(u64),
    /// Node `id` (by stable name, hashed) was marked dirty.
    NodeDirty(u64),
}

/// Opaque token returned by [`EventBus::subscribe`], used to deregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type Callback = Box<dyn FnMut(Topic) + Send>;

struct Subscriber {
    token: SubscriptionToken,
    topic: Topic,
    callback: Callback,
}

/// Topic-typed, process-wide, lock-protected publish/subscribe queue.
/// Publishing is non-blocking; delivery happens on the next [`EventBus::drain`]
/// call. FIFO within a topic; no ordering guarantee across topics.
pub struct EventBus {
    pending: Mutex<Vec<Topic>>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_token: AtomicU64,
}

impl EventBus {
    /// An empty bus with no pending events or subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self { pending: Mutex::new(Vec::new()), subscribers: Mutex::new(Vec::new()), next_token: AtomicU64::new(1) }
    }

    /// Queue `topic` for delivery on the next [`Self::drain`]. Never blocks.
    pub fn publish(&self, topic: Topic) {
        self.pending.lock().unwrap().push(topic);
    }

    /// Register `callback` against `topic`, returning a token that
    /// [`Self::unsubscribe`] accepts.
    pub fn subscribe(&self, topic: Topic, callback: impl FnMut(Topic) + Send + 'static) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().unwrap().push(Subscriber { token, topic, callback: Box::new(callback) });
        token
    }

    /// Remove a subscriber by token. A no-op if it was already removed
    /// (e.g. by a [`SubscriptionGuard`] drop).
    pub fn unsubscribe(&self, token: SubscriptionToken) {
        self.subscribers.lock().unwrap().retain(|s| s.token != token);
    }

    /// Deliver every queued event to matching subscribers, FIFO within
    /// each topic, then clear the queue. Typically called once per frame.
    pub fn drain(&self) {
        let queued: Vec<Topic> = std::mem::take(&mut *self.pending.lock().unwrap());
        let mut subscribers = self.subscribers.lock().unwrap();
        for topic in queued {
            for subscriber in subscribers.iter_mut().filter(|s| topics_match(s.topic, topic)) {
                (subscriber.callback)(topic);
            }
        }
    }

    /// Number of events waiting for the next [`Self::drain`], for tests.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn topics_match(subscribed: Topic, published: Topic) -> bool {
    use Topic::{FrameEnd, FrameStart, NodeDirty};
    match (subscribed, published) {
        (FrameStart(_), FrameStart(_)) | (FrameEnd(_), FrameEnd(_)) | (NodeDirty(_), NodeDirty(_)) => true,
        _ => subscribed == published,
    }
}

/// RAII guard around a subscription: dropping it calls [`EventBus::unsubscribe`]
/// automatically, so a subscriber never leaks a callback after going away
/// (spec §4.7 "dropping a subscriber automatically removes it").
pub struct SubscriptionGuard<'a> {
    bus: &'a EventBus,
    token: SubscriptionToken,
}

impl<'a> SubscriptionGuard<'a> {
    /// Subscribe and wrap the resulting token in a guard.
    #[must_use]
    pub fn new(bus: &'a EventBus, topic: Topic, callback: impl FnMut(Topic) + Send + 'static) -> Self {
        let token = bus.subscribe(topic, callback);
        Self { bus, token }
    }
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.token);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn publish_then_drain_delivers_fifo_within_topic() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_clone = order.clone();
        let _token = bus.subscribe(Topic::ShaderReloaded, move |_| order_clone.lock().unwrap().push(1));

        bus.publish(Topic::ShaderReloaded);
        bus.publish(Topic::ShaderReloaded);
        assert_eq!(bus.pending_len(), 2);
        bus.drain();
        assert_eq!(bus.pending_len(), 0);
        assert_eq!(order.lock().unwrap().len(), 2);
    }

    #[test]
    fn unsubscribe_stops_further_delivery() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let token = bus.subscribe(Topic::SwapchainResized, move |_| { calls_clone.fetch_add(1, Ordering::SeqCst); });

        bus.publish(Topic::SwapchainResized);
        bus.drain();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        bus.unsubscribe(token);
        bus.publish(Topic::SwapchainResized);
        bus.drain();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_guard_deregisters() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let guard = SubscriptionGuard::new(&bus, Topic::ShaderReloaded, move |_| { calls_clone.fetch_add(1, Ordering::SeqCst); });
        drop(guard);

        bus.publish(Topic::ShaderReloaded);
        bus.drain();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn frame_topics_match_regardless_of_index() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let _token = bus.subscribe(Topic::FrameStart(0), move |_| { calls_clone.fetch_add(1, Ordering::SeqCst); });
        bus.publish(Topic::FrameStart(42));
        bus.drain();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
