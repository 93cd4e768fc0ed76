//! SILT - Storage Engine Module
//! Top-level module coordinating the timestamp oracle, the write
//! queue, and the segment lifecycle.

pub mod codec;
mod flush;
pub mod metrics;
pub mod oracle;
pub mod queue;
pub mod segment;
pub mod signal;
pub mod state;
pub mod store;
pub mod watermark;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::batch::{Batch, TimestampedBatch};
use crate::config::Config;
use crate::error::{Result, SiltError};
use crate::types::{Key, Value};

use self::metrics::EngineMetrics;
use self::oracle::Oracle;
use self::queue::WriteQueue;
use self::signal::WriteSignal;
use self::state::StorageState;
use self::store::{DiskStore, MemoryStore, ObjectStore};

/// The core Silt storage engine.
///
/// An explicitly constructed context object owning one oracle, one
/// write queue, and one storage state; every component is wired at
/// construction, with no ambient state.
///
/// Writes go through [`Silt::put`]/[`Silt::delete`]/[`Silt::write`] and
/// return a two-level signal: applied to memory, then durable in the
/// object store. Reads obtain a stable read timestamp from the oracle,
/// so a reader always observes every commit at or below it and nothing
/// newer.
pub struct Silt {
    oracle: Arc<Oracle>,
    queue: Arc<WriteQueue>,
    state: Arc<StorageState>,
    metrics: Arc<EngineMetrics>,
    closed: AtomicBool,
}

impl Silt {
    /// Open a Silt storage engine with the given configuration.
    pub fn open(config: Config) -> Result<Self> {
        if config.segment_capacity == 0 {
            return Err(SiltError::Config("segment_capacity must be > 0".into()));
        }
        if config.queue_depth == 0 {
            return Err(SiltError::Config("queue_depth must be > 0".into()));
        }

        let store: Arc<dyn ObjectStore> = if config.in_memory {
            Arc::new(MemoryStore::new())
        } else {
            config.ensure_dirs()?;
            Arc::new(DiskStore::new(config.data_dir.clone()))
        };

        let metrics = Arc::new(EngineMetrics::new());
        let state = Arc::new(StorageState::open(&config, store, metrics.clone())?);
        let queue = WriteQueue::start(state.clone(), config.queue_depth, metrics.clone())?;
        let oracle = Arc::new(Oracle::new(0, queue.clone())?);

        log::info!(
            "silt engine opened (segment capacity {} bytes, queue depth {})",
            config.segment_capacity,
            config.queue_depth
        );

        Ok(Self {
            oracle,
            queue,
            state,
            metrics,
            closed: AtomicBool::new(false),
        })
    }

    /// Insert a key-value pair. Returns the write's completion signal.
    pub fn put(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<Arc<WriteSignal>> {
        let mut batch = Batch::new();
        batch.put(key, value);
        self.write(batch)
    }

    /// Delete a key by writing a tombstone.
    pub fn delete(&self, key: impl Into<Key>) -> Result<Arc<WriteSignal>> {
        let mut batch = Batch::new();
        batch.delete(key);
        self.write(batch)
    }

    /// Submit a batch for serialized application under a fresh commit
    /// timestamp.
    pub fn write(&self, batch: Batch) -> Result<Arc<WriteSignal>> {
        if batch.is_empty() {
            return Err(SiltError::EmptyBatch);
        }

        let (timestamp, commit_done) = self.oracle.commit_timestamp();
        let stamped = match TimestampedBatch::new(batch, timestamp) {
            Ok(stamped) => stamped,
            Err(error) => {
                commit_done.done();
                return Err(error);
            }
        };

        self.metrics.record_submit(stamped.size_bytes());
        Ok(self.queue.submit(stamped, commit_done))
    }

    /// Look up the newest visible value for `key` at a stable read
    /// timestamp.
    pub fn get(&self, key: &[u8]) -> Option<Value> {
        let read_ts = self.oracle.read_timestamp();
        self.metrics.record_read_timestamp();

        let value = self.state.get(key, read_ts);
        self.oracle.finish_read(read_ts);

        self.metrics.record_get(value.as_ref().map(Value::len));
        value
    }

    /// Timestamp floor below which no current or future reader can
    /// observe anything; the bound for background cleanup.
    pub fn cleanup_floor(&self) -> u64 {
        self.oracle.max_begin_timestamp()
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn active_segment_id(&self) -> u64 {
        self.state.active_segment_id()
    }

    pub fn inactive_segment_count(&self) -> usize {
        self.state.inactive_count()
    }

    /// Shut the engine down: stop the oracle's watermarks and the
    /// write queue, then drain segment lifecycle signals. Every
    /// outstanding completion signal reaches a terminal resolution.
    /// Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.oracle.close();
        self.state.close();
        log::info!("silt engine closed");
    }
}

impl Drop for Silt {
    fn drop(&mut self) {
        self.close();
    }
}
