//! SILT - In-Memory Segment
//! The write buffer of the engine. Exactly one segment is active
//! (mutable, accepting writes); frozen segments become inactive
//! (immutable, read-only) until background flush persists them.
//!
//! Entries are keyed by (raw key, timestamp) with newest-version-first
//! ordering per key, over a lock-free skip map: the single writer never
//! blocks concurrent readers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_skiplist::SkipMap;

use crate::batch::{Operation, TimestampedBatch};
use crate::engine::signal::Signal;
use crate::types::{SegmentId, Timestamp, Value, VersionedKey};

/// An empty value marks a deletion.
pub const TOMBSTONE: Bytes = Bytes::new();

pub struct Segment {
    id: SegmentId,
    entries: SkipMap<VersionedKey, Value>,
    size_bytes: AtomicUsize,
    capacity: usize,
    durable: Arc<Signal>,
}

impl Segment {
    /// Create an empty segment with the given id and byte capacity.
    pub fn new(id: SegmentId, capacity: usize) -> Self {
        Self {
            id,
            entries: SkipMap::new(),
            size_bytes: AtomicUsize::new(0),
            capacity,
            durable: Signal::new(),
        }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Signal resolved once this segment has been persisted to the
    /// object store (or the engine stopped first).
    pub fn durable(&self) -> Arc<Signal> {
        self.durable.clone()
    }

    /// Approximate payload size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes.load(Ordering::Relaxed)
    }

    /// Whether `extra` more bytes still fit under the capacity.
    pub fn can_fit(&self, extra: usize) -> bool {
        self.size_bytes() + extra <= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Store a value for `key` at `timestamp`.
    pub fn set(&self, key: impl Into<Bytes>, timestamp: Timestamp, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.size_bytes
            .fetch_add(key.len() + value.len(), Ordering::Relaxed);
        self.entries
            .insert(VersionedKey { key, timestamp }, value);
    }

    /// Mark `key` deleted at `timestamp` with a tombstone.
    pub fn delete(&self, key: impl Into<Bytes>, timestamp: Timestamp) {
        self.set(key, timestamp, TOMBSTONE);
    }

    /// Apply every entry of a batch under the batch's timestamp.
    pub fn apply(&self, batch: &TimestampedBatch) {
        let timestamp = batch.timestamp();
        for (key, operation) in batch.entries() {
            match operation {
                Operation::Put(value) => self.set(key.clone(), timestamp, value.clone()),
                Operation::Delete => self.delete(key.clone(), timestamp),
            }
        }
    }

    /// Newest version of `key` visible at `read_ts`, tombstones
    /// included; callers decide whether an empty value means "deleted
    /// here" or should shadow older tiers.
    pub fn latest(&self, key: &[u8], read_ts: Timestamp) -> Option<Value> {
        let newest = VersionedKey::new(Bytes::copy_from_slice(key), read_ts);
        let oldest = VersionedKey {
            key: newest.key.clone(),
            timestamp: 0,
        };
        self.entries
            .range(newest..=oldest)
            .next()
            .map(|entry| entry.value().clone())
    }

    /// Full scan in (key, newest-first) order, for the segment encoder.
    pub fn iter(&self) -> impl Iterator<Item = (VersionedKey, Value)> + '_ {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
    }
}
