//! viewer-side copy of the relay history
//!
//! fed by two paths: periodic snapshots (GET /data, or the `history` frame on
//! connect) and live pushes (`new-data`). readings are keyed by their relay
//! `seq`, so the same reading arriving through both paths is stored once.
//!
//! a snapshot is authoritative: it replaces the whole local copy, except for
//! readings pushed since the previous snapshot whose seq is newer than
//! anything the snapshot holds (push wins over an in-flight poll). entries
//! that only ever came from an older snapshot never survive, so a restarted
//! relay (seq back at 1) is picked up on the next snapshot.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::Reading;

pub const VIEWER_CAPACITY: usize = 500;

#[derive(Clone, Debug)]
pub struct LocalHistory {
    entries: BTreeMap<u64, Reading>,
    /// seqs that arrived by push and no snapshot has confirmed yet
    pushed: BTreeSet<u64>,
    capacity: usize,
    connected: bool,
}

impl LocalHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            pushed: BTreeSet::new(),
            capacity: capacity.max(1),
            connected: false,
        }
    }

    /// live push; returns false when the exact reading is already held
    pub fn apply_push(&mut self, reading: Reading) -> bool {
        if self.entries.get(&reading.seq) == Some(&reading) {
            return false;
        }
        self.pushed.insert(reading.seq);
        self.entries.insert(reading.seq, reading);
        self.evict();
        true
    }

    /// full snapshot; returns the readings it added or changed, oldest first
    pub fn apply_snapshot(&mut self, snapshot: Vec<Reading>) -> Vec<Reading> {
        let newest = snapshot.iter().map(|r| r.seq).max();
        let mut next: BTreeMap<u64, Reading> = snapshot.into_iter().map(|r| (r.seq, r)).collect();

        let mut fresh: Vec<Reading> = next
            .iter()
            .filter(|(seq, r)| self.entries.get(seq) != Some(*r))
            .map(|(_, r)| r.clone())
            .collect();

        let pushed = std::mem::take(&mut self.pushed);
        for seq in pushed {
            if newest.is_some_and(|n| seq <= n) {
                continue;
            }
            if let Some(reading) = self.entries.remove(&seq) {
                next.insert(seq, reading);
                self.pushed.insert(seq);
            }
        }

        self.entries = next;
        self.evict();
        fresh.retain(|r| self.entries.contains_key(&r.seq));
        fresh
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            if let Some((seq, _)) = self.entries.pop_first() {
                self.pushed.remove(&seq);
            }
        }
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.entries.values().next_back()
    }

    /// oldest first
    pub fn readings(&self) -> Vec<Reading> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for LocalHistory {
    fn default() -> Self {
        Self::with_capacity(VIEWER_CAPACITY)
    }
}
