//! SILT - Write-Path Coordination Core
//!
//! The timestamp-ordering and write-serialization core of a
//! log-structured, object-store-backed key/value engine.
//!
//! ## Features
//! - **Timestamp Oracle**: monotonic commit timestamps and stable read
//!   timestamps, gated on watermarks so a reader never observes a
//!   partially applied write
//! - **Watermarks**: out-of-order begin/finish tracking with a
//!   lock-free floor and blocking waiters
//! - **Write Queue**: a single sequential worker applying batches in
//!   submission order, exactly once
//! - **Segment Lifecycle**: one mutable active segment, frozen on
//!   overflow and flushed to an object store in the background
//! - **Completion Signals**: two-level (applied, then durable) one-shot
//!   notifications for every write
//! - **Metrics**: lock-free atomic counters for observability
//!
//! ## Example
//! ```no_run
//! use silt::config::Config;
//! use silt::engine::Silt;
//!
//! let engine = Silt::open(Config::default().with_in_memory(true)).unwrap();
//!
//! let write = engine.put("consensus", "raft").unwrap();
//! write.wait_applied().unwrap();
//! assert_eq!(engine.get(b"consensus"), Some("raft".into()));
//! ```

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod types;
