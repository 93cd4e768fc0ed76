//! SILT - Engine Configuration
//! Defines tunable parameters for the storage engine core.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the Silt storage engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for persisted segments (disk-backed store only).
    pub data_dir: PathBuf,

    /// Maximum size of the active segment in bytes before it is frozen
    /// and handed to background flush.
    pub segment_capacity: usize,

    /// Depth of the bounded write-submission queue. Submitters block
    /// once this many batches are in flight.
    pub queue_depth: usize,

    /// How often the background flusher looks for pending inactive
    /// segments (freezes also nudge it immediately).
    pub flush_interval: Duration,

    /// Keep persisted segments in an in-memory object store instead of
    /// on disk. Mostly useful for tests and benchmarks.
    pub in_memory: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            segment_capacity: 4 * 1024 * 1024, // 4 MB
            queue_depth: 128,
            flush_interval: Duration::from_millis(50),
            in_memory: false,
        }
    }
}

impl Config {
    /// Create a new Config with a custom data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the active-segment capacity before freeze.
    pub fn with_segment_capacity(mut self, bytes: usize) -> Self {
        self.segment_capacity = bytes;
        self
    }

    /// Set the bounded submission queue depth.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Set the background flush interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Use the in-memory object store.
    pub fn with_in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    /// Ensure the data directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}
