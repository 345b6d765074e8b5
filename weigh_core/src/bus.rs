//! Synchronous fan-out of weight events.
//!
//! Callbacks run on the stabilization thread, in subscription order. A
//! subscriber that needs another thread must hop there itself; `channel()`
//! hands out a crossbeam receiver for exactly that.

use crossbeam_channel as xch;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::types::WeightEvent;

/// Handle returned by `subscribe`; pass it to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Returns false once the subscriber is gone for good; `publish` then drops it.
type Callback = Arc<dyn Fn(&WeightEvent) -> bool + Send + Sync>;

#[derive(Default)]
pub struct WeightEventBus {
    subscribers: RwLock<Vec<(SubscriptionId, Callback)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for WeightEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightEventBus")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl WeightEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&WeightEvent) + Send + Sync + 'static,
    {
        self.insert(Arc::new(move |ev: &WeightEvent| {
            callback(ev);
            true
        }))
    }

    fn insert(&self, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, callback));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    /// Subscribe through an unbounded channel. The forwarder is removed on the
    /// first publish after the receiver is dropped, or earlier via `unsubscribe`.
    pub fn channel(&self) -> (SubscriptionId, xch::Receiver<WeightEvent>) {
        let (tx, rx) = xch::unbounded();
        let id = self.insert(Arc::new(move |ev: &WeightEvent| tx.send(ev.clone()).is_ok()));
        (id, rx)
    }

    /// Deliver to every subscriber. A panicking subscriber is logged and skipped.
    pub fn publish(&self, event: &WeightEvent) {
        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let subs: Vec<(SubscriptionId, Callback)> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut gone = Vec::new();
        for (id, cb) in subs {
            match catch_unwind(AssertUnwindSafe(|| cb(event))) {
                Ok(true) => {}
                Ok(false) => gone.push(id),
                Err(_) => tracing::warn!(
                    subscription = id.0,
                    channel = %event.weight.channel,
                    "weight subscriber panicked"
                ),
            }
        }
        if !gone.is_empty() {
            tracing::debug!(count = gone.len(), "dropping disconnected subscribers");
            self.subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| !gone.contains(id));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
