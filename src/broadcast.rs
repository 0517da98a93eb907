//! ==============================================================================
//! broadcast.rs - subscription registry and fan-out
//! ==============================================================================
//!
//! purpose:
//!     - SubscriptionRegistry: live viewer connections, one bounded queue each
//!     - Broadcaster: delivers one reading to every registered subscriber
//!
//! delivery model:
//!     at-most-once, best-effort. publish() never awaits: it try_sends into
//!     each queue. a subscriber whose queue is full or closed is removed from
//!     the registry, every other subscriber is unaffected.
//!
//! relationships:
//!     - used by: relay.rs (publish inside the append critical section)
//!     - drained by: live.rs (one websocket task per subscriber)
//!
//! ==============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::Reading;

pub const DEFAULT_QUEUE_DEPTH: usize = 256;

/// opaque, process-unique connection id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Clone)]
pub struct SubscriptionRegistry {
    subscribers: Arc<DashMap<SubscriberId, mpsc::Sender<Reading>>>,
    next_id: Arc<AtomicU64>,
    queue_depth: usize,
}

impl SubscriptionRegistry {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            queue_depth: queue_depth.max(1),
        }
    }

    pub fn register(&self) -> (SubscriberId, mpsc::Receiver<Reading>) {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.queue_depth);
        self.subscribers.insert(id, tx);
        (id, rx)
    }

    /// returns false when the subscriber was already gone
    pub fn unregister(&self, id: SubscriberId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_DEPTH)
    }
}

/// outcome of one publish
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Clone)]
pub struct Broadcaster {
    registry: SubscriptionRegistry,
}

impl Broadcaster {
    pub fn new(registry: SubscriptionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// enqueue `reading` for every current subscriber
    pub fn publish(&self, reading: &Reading) -> FanoutReport {
        let mut report = FanoutReport::default();
        let mut failed = Vec::new();

        // collect failures first; removing while iterating would deadlock the shard
        for entry in self.registry.subscribers.iter() {
            match entry.value().try_send(reading.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = %entry.key(), seq = reading.seq, "subscriber queue full, dropping subscriber");
                    failed.push(*entry.key());
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = %entry.key(), "subscriber went away during delivery");
                    failed.push(*entry.key());
                }
            }
        }

        for id in failed {
            if self.registry.unregister(id) {
                report.dropped += 1;
            }
        }
        report
    }
}
