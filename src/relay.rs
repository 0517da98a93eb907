//! ==============================================================================
//! relay.rs - ingest, history and fan-out as one handle
//! ==============================================================================
//!
//! purpose:
//!     the single shared object of the relay process. created once in main.rs
//!     and injected into the web server (axum State) and the websocket tasks.
//!
//! atomicity:
//!
//!     ingest:  validate ──► [write lock: append ──► publish] ──► ack
//!     connect: [read lock: register ──► snapshot backlog]
//!
//!     publish runs while the write lock is held, so subscribers observe
//!     readings in history order, and a connecting viewer sees every reading
//!     exactly once: either in its backlog or on its queue.
//!
//! ==============================================================================

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

use crate::broadcast::{Broadcaster, SubscriberId, SubscriptionRegistry};
use crate::domain::{Reading, ReadingKind};
use crate::error::ValidationError;
use crate::history::HistoryStore;
use crate::ingest;

/// a freshly connected live viewer
pub struct Subscription {
    pub id: SubscriberId,
    /// history at the moment of registration
    pub backlog: Vec<Reading>,
    /// everything appended after `backlog`
    pub events: mpsc::Receiver<Reading>,
}

#[derive(Clone)]
pub struct Relay {
    history: Arc<RwLock<HistoryStore>>,
    broadcaster: Broadcaster,
    show_readings: bool,
}

impl Relay {
    pub fn new(history_capacity: usize, subscriber_queue: usize) -> Self {
        if history_capacity == 0 {
            tracing::warn!("history capacity 0 is invalid, using 1");
        }
        Self {
            history: Arc::new(RwLock::new(HistoryStore::with_capacity(history_capacity))),
            broadcaster: Broadcaster::new(SubscriptionRegistry::new(subscriber_queue)),
            show_readings: false,
        }
    }

    /// log every accepted reading at info instead of debug
    pub fn with_reading_log(mut self, show: bool) -> Self {
        self.show_readings = show;
        self
    }

    /// validate, append and broadcast one submission
    pub async fn ingest(&self, raw: &Value, kind: ReadingKind) -> Result<Reading, ValidationError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let measurement = ingest::validate(raw, kind, now_ms).map_err(|e| {
            tracing::warn!(kind = kind.as_str(), error = %e, "rejected reading");
            e
        })?;

        let mut history = self.history.write().await;
        let reading = history.append(measurement);
        let report = self.broadcaster.publish(&reading);
        drop(history);

        if self.show_readings {
            tracing::info!(
                seq = reading.seq,
                kind = reading.kind.as_str(),
                node = reading.node.as_deref().unwrap_or("-"),
                pm25 = reading.pm25,
                pm10 = ?reading.pm10,
                lat = reading.lat,
                lon = reading.lon,
                delivered = report.delivered,
                dropped = report.dropped,
                "reading accepted"
            );
        } else {
            tracing::debug!(seq = reading.seq, delivered = report.delivered, "reading accepted");
        }
        Ok(reading)
    }

    pub async fn snapshot(&self) -> Vec<Reading> {
        self.history.read().await.snapshot()
    }

    /// last `n` readings, oldest first
    pub async fn recent(&self, n: usize) -> Vec<Reading> {
        self.history.read().await.tail(n)
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }

    /// register a live viewer and hand it the backlog it missed
    pub async fn connect(&self) -> Subscription {
        let history = self.history.read().await;
        let (id, events) = self.broadcaster.registry().register();
        let backlog = history.snapshot();
        drop(history);

        tracing::info!(subscriber = %id, backlog = backlog.len(), "viewer connected");
        Subscription { id, backlog, events }
    }

    pub fn disconnect(&self, id: SubscriberId) {
        if self.broadcaster.registry().unregister(id) {
            tracing::info!(subscriber = %id, "viewer disconnected");
        } else {
            tracing::debug!(subscriber = %id, "viewer already dropped from registry");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.registry().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(pm25: f64) -> Value {
        json!({"node": "esp32-01", "pm25": pm25, "pm10": pm25 + 5.0, "lat": 45.46, "lon": 9.19})
    }

    #[tokio::test]
    async fn appended_reading_is_in_snapshot_and_pushed() {
        let relay = Relay::new(1000, 16);
        let mut sub = relay.connect().await;

        let r = relay.ingest(&body(12.0), ReadingKind::Node).await.unwrap();

        assert!(relay.snapshot().await.contains(&r));
        assert_eq!(sub.events.recv().await, Some(r));
    }

    #[tokio::test]
    async fn rejected_reading_leaves_history_untouched() {
        let relay = Relay::new(1000, 16);
        let mut sub = relay.connect().await;

        let err = relay.ingest(&json!({"pm25": 1}), ReadingKind::Node).await.unwrap_err();
        assert_eq!(err.code(), "missing_field");
        assert_eq!(relay.history_len().await, 0);
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn backlog_and_events_partition_the_history() {
        let relay = Relay::new(1000, 1024);
        for i in 0..5 {
            relay.ingest(&body(i as f64), ReadingKind::Node).await.unwrap();
        }

        let producer = relay.clone();
        let task = tokio::spawn(async move {
            for i in 5..200 {
                producer.ingest(&body(i as f64), ReadingKind::Node).await.unwrap();
            }
        });
        let mut sub = relay.connect().await;
        task.await.unwrap();

        let mut seen: Vec<u64> = sub.backlog.iter().map(|r| r.seq).collect();
        while let Ok(r) = sub.events.try_recv() {
            seen.push(r.seq);
        }
        let all: Vec<u64> = relay.snapshot().await.iter().map(|r| r.seq).collect();
        assert_eq!(seen, all);
    }

    #[tokio::test]
    async fn concurrent_ingests_keep_broadcast_order_equal_to_history_order() {
        let relay = Relay::new(1000, 1024);
        let mut sub = relay.connect().await;

        let mut tasks = Vec::new();
        for p in 0..4 {
            let relay = relay.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..25 {
                    relay.ingest(&body((p * 100 + i) as f64), ReadingKind::Node).await.unwrap();
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        let history = relay.snapshot().await;
        assert_eq!(history.len(), 100);
        for expected in &history {
            assert_eq!(sub.events.recv().await.as_ref(), Some(expected));
        }
    }

    #[tokio::test]
    async fn disconnect_removes_subscriber() {
        let relay = Relay::new(10, 4);
        let sub = relay.connect().await;
        assert_eq!(relay.subscriber_count(), 1);
        relay.disconnect(sub.id);
        assert_eq!(relay.subscriber_count(), 0);
    }
}
