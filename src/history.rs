//! ==============================================================================
//! history.rs - bounded history store
//! ==============================================================================
//!
//! purpose:
//!     fixed-capacity FIFO of the last N readings. appends go to the tail,
//!     eviction takes from the head. readings are never updated in place.
//!
//! relationships:
//!     - owned by: relay.rs (behind a tokio RwLock; the store itself is not
//!       synchronized)
//!
//! ==============================================================================

use std::collections::VecDeque;

use crate::domain::{Measurement, Reading};

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug)]
pub struct HistoryStore {
    entries: VecDeque<Reading>,
    capacity: usize,
    next_seq: u64,
}

impl HistoryStore {
    /// capacity 0 is clamped to 1
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 1,
        }
    }

    /// append to the tail, evicting from the head once full
    pub fn append(&mut self, measurement: Measurement) -> Reading {
        let reading = Reading::from_measurement(self.next_seq, measurement);
        self.next_seq += 1;

        while self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                tracing::trace!(seq = evicted.seq, "evicted oldest reading");
            }
        }
        self.entries.push_back(reading.clone());
        reading
    }

    /// ordered copy, oldest first
    pub fn snapshot(&self) -> Vec<Reading> {
        self.entries.iter().cloned().collect()
    }

    /// the last `n` readings, oldest first
    pub fn tail(&self, n: usize) -> Vec<Reading> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn last(&self) -> Option<&Reading> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReadingKind;

    fn sample(pm25: f64) -> Measurement {
        Measurement {
            kind: ReadingKind::Node,
            node: Some("esp32-test".into()),
            pm25,
            pm10: Some(pm25 * 2.0),
            lat: 45.46,
            lon: 9.19,
            timestamp: 1_700_000_000_000 + pm25 as i64,
        }
    }

    #[test]
    fn keeps_last_capacity_readings_in_order() {
        let mut store = HistoryStore::with_capacity(5);
        for i in 0..12 {
            store.append(sample(i as f64));
        }
        let snap = store.snapshot();
        assert_eq!(snap.len(), 5);
        let values: Vec<f64> = snap.iter().map(|r| r.pm25).collect();
        assert_eq!(values, vec![7.0, 8.0, 9.0, 10.0, 11.0]);
        let seqs: Vec<u64> = snap.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![8, 9, 10, 11, 12]);
    }

    #[test]
    fn default_capacity_is_one_thousand() {
        let mut store = HistoryStore::default();
        for i in 0..1500 {
            store.append(sample(i as f64));
        }
        assert_eq!(store.len(), 1000);
        assert_eq!(store.capacity(), 1000);
        assert_eq!(store.snapshot()[0].pm25, 500.0);
        assert_eq!(store.last().map(|r| r.pm25), Some(1499.0));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut store = HistoryStore::with_capacity(0);
        store.append(sample(1.0));
        store.append(sample(2.0));
        assert_eq!(store.len(), 1);
        assert_eq!(store.last().map(|r| r.pm25), Some(2.0));
    }

    #[test]
    fn tail_returns_newest_window() {
        let mut store = HistoryStore::with_capacity(10);
        for i in 0..4 {
            store.append(sample(i as f64));
        }
        let tail: Vec<f64> = store.tail(2).iter().map(|r| r.pm25).collect();
        assert_eq!(tail, vec![2.0, 3.0]);
        assert_eq!(store.tail(100).len(), 4);
    }
}
