//! SILT - Storage State
//! Owns the single mutable active segment and the ordered list of
//! immutable inactive segments awaiting flush.
//!
//! ## Concurrency Model
//! - The active-segment handle is an atomically swapped `Arc`: readers
//!   always observe either the old or the new active segment, never
//!   neither, and never queue behind the writer.
//! - The inactive list is appended to by freeze and drained
//!   oldest-first by flush completion; readers iterate an owned
//!   snapshot of the list.
//! - `set` is only ever called by the write queue worker, the engine's
//!   sole serialization point for writes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;

use crate::batch::TimestampedBatch;
use crate::config::Config;
use crate::engine::flush::Flusher;
use crate::engine::metrics::EngineMetrics;
use crate::engine::segment::Segment;
use crate::engine::signal::Signal;
use crate::engine::store::ObjectStore;
use crate::error::{Result, SiltError};
use crate::types::{SegmentId, Timestamp, Value};

pub(crate) struct StateInner {
    pub(crate) active: ArcSwap<Segment>,
    pub(crate) inactive: RwLock<Vec<Arc<Segment>>>,
    pub(crate) next_segment_id: AtomicU64,
    pub(crate) capacity: usize,
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) metrics: Arc<EngineMetrics>,
}

impl StateInner {
    pub(crate) fn oldest_inactive(&self) -> Option<Arc<Segment>> {
        self.inactive.read().first().cloned()
    }

    pub(crate) fn remove_inactive(&self, id: SegmentId) {
        self.inactive.write().retain(|segment| segment.id() != id);
    }
}

/// The engine's in-memory segment tiers and their lifecycle.
pub struct StorageState {
    inner: Arc<StateInner>,
    flusher: Flusher,
    closed: AtomicBool,
}

impl StorageState {
    pub fn open(
        config: &Config,
        store: Arc<dyn ObjectStore>,
        metrics: Arc<EngineMetrics>,
    ) -> Result<Self> {
        let inner = Arc::new(StateInner {
            active: ArcSwap::from_pointee(Segment::new(1, config.segment_capacity)),
            inactive: RwLock::new(Vec::new()),
            next_segment_id: AtomicU64::new(2),
            capacity: config.segment_capacity,
            store,
            metrics,
        });
        let flusher = Flusher::start(inner.clone(), config.flush_interval)?;
        Ok(Self {
            inner,
            flusher,
            closed: AtomicBool::new(false),
        })
    }

    /// Apply a timestamped batch to the active segment, freezing it
    /// first if the batch does not fit. Returns the durability signal
    /// of the segment the batch landed in.
    pub fn set(&self, batch: &TimestampedBatch) -> Result<Arc<Signal>> {
        let mut active = self.inner.active.load_full();
        if !active.can_fit(batch.size_bytes()) && !active.is_empty() {
            active = self.freeze_active();
        }
        active.apply(batch);
        Ok(active.durable())
    }

    /// Move the active segment to the tail of the inactive list and
    /// install a fresh one. The frozen segment is pushed before the
    /// swap, so a reader sees it in at least one tier at all times.
    fn freeze_active(&self) -> Arc<Segment> {
        let frozen = self.inner.active.load_full();
        let id = self.inner.next_segment_id.fetch_add(1, Ordering::SeqCst);
        let fresh = Arc::new(Segment::new(id, self.inner.capacity));

        self.inner.inactive.write().push(frozen.clone());
        self.inner.active.store(fresh.clone());

        self.inner.metrics.record_freeze();
        log::info!(
            "froze segment {} ({} bytes), active segment is now {}",
            frozen.id(),
            frozen.size_bytes(),
            id
        );
        self.flusher.nudge();
        fresh
    }

    /// Read the newest value of `key` visible at `read_ts`: active
    /// segment first, then inactive segments newest to oldest over a
    /// snapshot of the list. A tombstone in a newer tier shadows older
    /// versions.
    pub fn get(&self, key: &[u8], read_ts: Timestamp) -> Option<Value> {
        let active = self.inner.active.load_full();
        if let Some(value) = active.latest(key, read_ts) {
            return visible(value);
        }

        let snapshot: Vec<Arc<Segment>> = self.inner.inactive.read().clone();
        for segment in snapshot.iter().rev() {
            if let Some(value) = segment.latest(key, read_ts) {
                return visible(value);
            }
        }
        None
    }

    pub fn active_segment_id(&self) -> SegmentId {
        self.inner.active.load().id()
    }

    pub fn inactive_count(&self) -> usize {
        self.inner.inactive.read().len()
    }

    /// Stop background flush and resolve every still-pending durability
    /// signal (inactive and active) with [`SiltError::Stopped`].
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.flusher.stop();
        self.inner
            .active
            .load()
            .durable()
            .resolve(Err(SiltError::Stopped));
        log::info!("storage state closed");
    }
}

impl Drop for StorageState {
    fn drop(&mut self) {
        self.close();
    }
}

fn visible(value: Value) -> Option<Value> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
