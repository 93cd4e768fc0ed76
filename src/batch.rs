//! SILT - Write Batches
//! An ordered sequence of Put/Delete operations, applied atomically
//! under a single commit timestamp by the write queue.

use crate::error::{Result, SiltError};
use crate::types::{Key, Timestamp, Value};

/// A single operation inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Put(Value),
    Delete,
}

/// An ordered, immutable-once-submitted sequence of key operations.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    entries: Vec<(Key, Operation)>,
}

impl Batch {
    /// Create a new, empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a PUT operation.
    pub fn put(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> &mut Self {
        self.entries.push((key.into(), Operation::Put(value.into())));
        self
    }

    /// Append a DELETE operation (stored as a tombstone).
    pub fn delete(&mut self, key: impl Into<Key>) -> &mut Self {
        self.entries.push((key.into(), Operation::Delete));
        self
    }

    /// Returns the number of operations in the batch.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the batch contains no operations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordered view of the batch entries.
    pub fn entries(&self) -> &[(Key, Operation)] {
        &self.entries
    }

    /// Approximate payload size in bytes (keys + values).
    pub fn size_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|(key, op)| {
                key.len()
                    + match op {
                        Operation::Put(value) => value.len(),
                        Operation::Delete => 0,
                    }
            })
            .sum()
    }
}

/// A batch bound to a single commit timestamp. Every key in it is
/// stamped with that timestamp when materialized into a segment.
#[derive(Debug, Clone)]
pub struct TimestampedBatch {
    batch: Batch,
    timestamp: Timestamp,
}

impl TimestampedBatch {
    /// Bind a batch to its commit timestamp.
    /// Empty batches are rejected before any state is created.
    pub fn new(batch: Batch, timestamp: Timestamp) -> Result<Self> {
        if batch.is_empty() {
            return Err(SiltError::EmptyBatch);
        }
        Ok(Self { batch, timestamp })
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn entries(&self) -> &[(Key, Operation)] {
        self.batch.entries()
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.batch.size_bytes()
    }
}
