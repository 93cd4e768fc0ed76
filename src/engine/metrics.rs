//! SILT - Engine Metrics & Observability
//! Atomic counters for tracking engine operations in a lock-free,
//! thread-safe manner.
//!
//! All counters use `Ordering::Relaxed` since we only need eventual
//! consistency for observability, not synchronization.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic operation counters for the Silt engine.
#[derive(Debug)]
pub struct EngineMetrics {
    /// Batches accepted by the write queue.
    pub batches_submitted: AtomicU64,
    /// Batches applied to the active segment.
    pub batches_applied: AtomicU64,
    /// Point lookups served.
    pub gets: AtomicU64,
    /// Read timestamps issued by the oracle.
    pub read_timestamps: AtomicU64,
    /// Active-segment freezes.
    pub segment_freezes: AtomicU64,
    /// Segments persisted to the object store.
    pub flushes: AtomicU64,
    /// Flush attempts that failed and were left for retry.
    pub flush_failures: AtomicU64,
    /// Artifact bytes persisted to the object store.
    pub bytes_flushed: AtomicU64,
    /// Total batch payload bytes accepted.
    pub bytes_written: AtomicU64,
    /// Total value bytes returned by gets.
    pub bytes_read: AtomicU64,
    /// Timestamp when the engine was opened.
    engine_started: Instant,
}

impl EngineMetrics {
    /// Create a new metrics instance with all counters at zero.
    pub fn new() -> Self {
        Self {
            batches_submitted: AtomicU64::new(0),
            batches_applied: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            read_timestamps: AtomicU64::new(0),
            segment_freezes: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
            bytes_flushed: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            engine_started: Instant::now(),
        }
    }

    pub fn record_submit(&self, payload_bytes: usize) {
        self.batches_submitted.fetch_add(1, Ordering::Relaxed);
        self.bytes_written
            .fetch_add(payload_bytes as u64, Ordering::Relaxed);
    }

    pub fn record_apply(&self) {
        self.batches_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_get(&self, value_size: Option<usize>) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if let Some(size) = value_size {
            self.bytes_read.fetch_add(size as u64, Ordering::Relaxed);
        }
    }

    pub fn record_read_timestamp(&self) {
        self.read_timestamps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_freeze(&self) {
        self.segment_freezes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, artifact_bytes: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.bytes_flushed
            .fetch_add(artifact_bytes as u64, Ordering::Relaxed);
    }

    pub fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get engine uptime in seconds.
    pub fn uptime_secs(&self) -> f64 {
        self.engine_started.elapsed().as_secs_f64()
    }

    /// Format metrics as a human-readable report.
    pub fn report(&self) -> String {
        format!(
            "═══ Silt Engine Metrics ═══\n\
             Writes:\n\
               submitted: {}\n\
               applied:   {}\n\
               bytes:     {}\n\
             Reads:\n\
               gets:          {}\n\
               read ts:       {}\n\
               bytes:         {}\n\
             Segments:\n\
               freezes:        {}\n\
               flushes:        {}\n\
               flush failures: {}\n\
               flushed bytes:  {}\n\
             Uptime: {:.2}s",
            self.batches_submitted.load(Ordering::Relaxed),
            self.batches_applied.load(Ordering::Relaxed),
            self.bytes_written.load(Ordering::Relaxed),
            self.gets.load(Ordering::Relaxed),
            self.read_timestamps.load(Ordering::Relaxed),
            self.bytes_read.load(Ordering::Relaxed),
            self.segment_freezes.load(Ordering::Relaxed),
            self.flushes.load(Ordering::Relaxed),
            self.flush_failures.load(Ordering::Relaxed),
            self.bytes_flushed.load(Ordering::Relaxed),
            self.uptime_secs(),
        )
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operations() {
        let m = EngineMetrics::new();

        m.record_submit(25);
        m.record_apply();
        m.record_get(Some(10));
        m.record_get(None);
        m.record_freeze();
        m.record_flush(4096);
        m.record_flush_failure();

        assert_eq!(m.batches_submitted.load(Ordering::Relaxed), 1);
        assert_eq!(m.batches_applied.load(Ordering::Relaxed), 1);
        assert_eq!(m.gets.load(Ordering::Relaxed), 2);
        assert_eq!(m.bytes_written.load(Ordering::Relaxed), 25);
        assert_eq!(m.bytes_read.load(Ordering::Relaxed), 10);
        assert_eq!(m.segment_freezes.load(Ordering::Relaxed), 1);
        assert_eq!(m.flushes.load(Ordering::Relaxed), 1);
        assert_eq!(m.flush_failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_report_format() {
        let m = EngineMetrics::new();
        m.record_submit(10);
        let report = m.report();
        assert!(report.contains("submitted: 1"));
        assert!(report.contains("Uptime:"));
    }

    #[test]
    fn test_default() {
        let m = EngineMetrics::default();
        assert_eq!(m.batches_submitted.load(Ordering::Relaxed), 0);
    }
}
