//! SILT - Core Type Definitions
//! Defines fundamental types used across the storage engine.

use std::cmp::Ordering;

use bytes::Bytes;

/// Key type for the storage engine.
/// `Bytes` allows arbitrary binary keys with cheap clones across
/// the queue/segment boundaries.
pub type Key = Bytes;

/// Value type for the storage engine.
/// An empty value is a tombstone (deletion marker).
pub type Value = Bytes;

/// Logical timestamp assigned by the oracle.
/// Unsigned, monotonically increasing; zero means "nothing has happened".
pub type Timestamp = u64;

/// Identifier of an in-memory or persisted segment.
pub type SegmentId = u64;

/// A raw key bound to the timestamp of the write that produced it.
///
/// Ordering is (key ascending, timestamp descending), so all versions of
/// one key sit together with the newest version first. A range scan from
/// `(key, read_ts)` therefore starts at the newest version visible at
/// `read_ts`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionedKey {
    pub key: Key,
    pub timestamp: Timestamp,
}

impl VersionedKey {
    pub fn new(key: impl Into<Key>, timestamp: Timestamp) -> Self {
        Self {
            key: key.into(),
            timestamp,
        }
    }
}

impl Ord for VersionedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| other.timestamp.cmp(&self.timestamp))
    }
}

impl PartialOrd for VersionedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
