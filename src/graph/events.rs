//! Change-stream listener registry.
//!
//! Listeners are plain synchronous closures, called inline from the
//! mutator that produced the event. A listener that wants to do async
//! work (the Orchestrator's subscription does) spawns its own task
//! rather than making the graph await it — the graph's mutators must
//! stay short.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::domain::models::GraphEvent;

pub type Listener = Arc<dyn Fn(&GraphEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`]. Dropping it does *not*
/// unsubscribe — call [`EventBus::unsubscribe`] explicitly, matching
/// the returned unsubscribe handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().expect("event bus lock poisoned").push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.write().expect("event bus lock poisoned").retain(|(existing, _)| *existing != id);
    }

    /// Deliver `event` to every active listener. Listener panics are
    /// caught and swallowed — a faulty listener must never abort the
    /// mutation that produced the event.
    pub fn emit(&self, event: &GraphEvent) {
        let listeners = self.listeners.read().expect("event bus lock poisoned").clone();
        for (_, listener) in listeners {
            let listener = listener.clone();
            let event = event.clone();
            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(&event))) {
                tracing::error!(?panic, event = event.kind(), "task graph listener panicked; swallowed");
            }
        }
    }
}
