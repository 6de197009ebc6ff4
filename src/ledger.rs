//! Bounded set of already-notified event keys.
//!
//! Keys are kept in insertion order. Once the set grows past `capacity` it is
//! cut back to the newest `capacity / 2` keys. Events are processed in
//! ascending block order and scans run chronologically, so insertion order
//! stands in for recency; this is a soft LRU, not a strict one.

use crate::types::EventKey;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct DedupLedger {
    order: VecDeque<EventKey>,
    members: HashSet<EventKey>,
    capacity: usize,
}

impl DedupLedger {
    pub fn new(capacity: usize) -> Self {
        // capacity 1 would compact down to nothing
        let capacity = capacity.max(2);
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Rebuild from keys in insertion order (oldest first).
    pub fn from_keys(keys: impl IntoIterator<Item = EventKey>, capacity: usize) -> Self {
        let mut ledger = Self::new(capacity);
        for key in keys {
            ledger.insert(key);
        }
        ledger.compact();
        ledger
    }

    pub fn seen(&self, key: &EventKey) -> bool {
        self.members.contains(key)
    }

    /// Record a delivered notification. Compacts when over capacity.
    pub fn record(&mut self, key: EventKey) {
        self.insert(key);
        self.compact();
    }

    /// Drop the oldest keys once size exceeds capacity, keeping the newest
    /// `capacity / 2`.
    pub fn compact(&mut self) {
        if self.order.len() <= self.capacity {
            return;
        }

        let retain = self.capacity / 2;
        let evict = self.order.len() - retain;
        for key in self.order.drain(..evict) {
            self.members.remove(&key);
        }
        debug!(evicted = evict, retained = retain, "compacted dedup ledger");
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys oldest first
    pub fn iter(&self) -> impl Iterator<Item = &EventKey> {
        self.order.iter()
    }

    fn insert(&mut self, key: EventKey) {
        if self.members.insert(key) {
            self.order.push_back(key);
        }
    }
}

impl Default for DedupLedger {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
