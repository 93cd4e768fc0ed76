//! SILT - Integration Tests
//! End-to-end tests across the write path: submit → serialize → apply
//! → freeze → flush, plus shutdown behavior.

use std::sync::Arc;
use std::time::Duration;

use silt::batch::Batch;
use silt::config::Config;
use silt::engine::Silt;
use silt::error::SiltError;

mod common {
    use super::*;

    pub fn memory_config() -> Config {
        Config::default().with_in_memory(true)
    }

    /// Tiny segments so a couple of writes force a freeze.
    pub fn tiny_segment_config() -> Config {
        memory_config()
            .with_segment_capacity(128)
            .with_flush_interval(Duration::from_millis(10))
    }
}

#[test]
fn test_basic_put_get_delete() {
    let engine = Silt::open(common::memory_config()).unwrap();

    engine.put("name", "silt").unwrap().wait_applied().unwrap();
    engine.put("version", "0.1.0").unwrap().wait_applied().unwrap();

    assert_eq!(engine.get(b"name"), Some("silt".into()));
    assert_eq!(engine.get(b"version"), Some("0.1.0".into()));
    assert_eq!(engine.get(b"missing"), None);

    engine.delete("name").unwrap().wait_applied().unwrap();
    assert_eq!(engine.get(b"name"), None);
    assert_eq!(engine.get(b"version"), Some("0.1.0".into()));
}

#[test]
fn test_read_your_write() {
    let engine = Silt::open(common::memory_config()).unwrap();

    let write = engine.put("consensus", "raft").unwrap();
    write.wait_applied().unwrap();

    assert_eq!(engine.get(b"consensus"), Some("raft".into()));
}

#[test]
fn test_overwrite_visible_at_newer_timestamp() {
    let engine = Silt::open(common::memory_config()).unwrap();

    engine.put("key", "old").unwrap().wait_applied().unwrap();
    assert_eq!(engine.get(b"key"), Some("old".into()));

    engine.put("key", "new").unwrap().wait_applied().unwrap();
    assert_eq!(engine.get(b"key"), Some("new".into()));
}

#[test]
fn test_overflow_freezes_and_flushes() {
    let engine = Silt::open(common::tiny_segment_config()).unwrap();

    let first = engine.put("consensus", "raft").unwrap();
    let durable = first.wait_applied().unwrap();
    assert_eq!(engine.active_segment_id(), 1);

    // Overflow the active segment; the first write's segment freezes
    // and its durability signal resolves once flushed.
    let mut big = Batch::new();
    big.put("payload", vec![0xABu8; 200]);
    engine.write(big).unwrap().wait_applied().unwrap();

    assert!(engine.active_segment_id() > 1);
    durable
        .wait_timeout(Duration::from_secs(2))
        .expect("frozen segment should flush")
        .unwrap();
    assert_eq!(engine.inactive_segment_count(), 0);
    assert!(engine.metrics().flushes.load(std::sync::atomic::Ordering::Relaxed) >= 1);
}

#[test]
fn test_flushed_artifact_lands_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(dir.path())
        .with_segment_capacity(128)
        .with_flush_interval(Duration::from_millis(10));
    let engine = Silt::open(config).unwrap();

    let durable = engine
        .put("a", "x".repeat(100))
        .unwrap()
        .wait_applied()
        .unwrap();
    engine
        .put("b", "y".repeat(100))
        .unwrap()
        .wait_applied()
        .unwrap();

    durable
        .wait_timeout(Duration::from_secs(2))
        .expect("flush should complete")
        .unwrap();
    assert!(dir.path().join("1.segment").exists());
}

#[test]
fn test_concurrent_writers_all_resolve() {
    let engine = Arc::new(Silt::open(common::memory_config()).unwrap());

    let mut handles = vec![];
    for worker in 0..8 {
        let engine = engine.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..50 {
                let key = format!("w{worker}-k{i}");
                engine
                    .put(key, format!("v{i}"))
                    .unwrap()
                    .wait_applied()
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for worker in 0..8 {
        let key = format!("w{worker}-k49");
        assert_eq!(engine.get(key.as_bytes()), Some("v49".into()));
    }
}

#[test]
fn test_writes_after_close_fail_with_stopped() {
    let engine = Silt::open(common::memory_config()).unwrap();

    let mut before = vec![];
    for i in 0..10 {
        before.push(engine.put(format!("k{i}"), "v").unwrap());
    }
    engine.close();

    // Everything submitted before the close reaches a terminal state.
    for signal in &before {
        let outcome = signal
            .wait_applied_timeout(Duration::from_secs(2))
            .expect("pre-close write must resolve");
        match outcome {
            Ok(_) | Err(SiltError::Stopped) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // Everything submitted after the close fails fast, never hangs.
    for i in 0..5 {
        let signal = engine.put(format!("late{i}"), "v").unwrap();
        assert!(matches!(signal.wait_applied(), Err(SiltError::Stopped)));
    }
}

#[test]
fn test_durability_signal_resolves_across_close() {
    let engine = Silt::open(common::memory_config()).unwrap();

    // The active segment never overflows, so its durability signal can
    // only resolve through shutdown.
    let durable = engine.put("key", "value").unwrap().wait_applied().unwrap();
    engine.close();

    match durable
        .wait_timeout(Duration::from_secs(2))
        .expect("durability signal must resolve at shutdown")
    {
        Err(SiltError::Stopped) => {}
        other => panic!("expected Stopped, got {other:?}"),
    }
}

#[test]
fn test_empty_batch_rejected_without_side_effects() {
    let engine = Silt::open(common::memory_config()).unwrap();
    assert!(matches!(
        engine.write(Batch::new()),
        Err(SiltError::EmptyBatch)
    ));

    // The rejection leaves the engine fully usable.
    engine.put("k", "v").unwrap().wait_applied().unwrap();
    assert_eq!(engine.get(b"k"), Some("v".into()));
}

#[test]
fn test_batch_atomicity() {
    let engine = Silt::open(common::memory_config()).unwrap();

    let mut batch = Batch::new();
    batch.put("alpha", "1").put("bravo", "2").delete("charlie");
    engine.write(batch).unwrap().wait_applied().unwrap();

    assert_eq!(engine.get(b"alpha"), Some("1".into()));
    assert_eq!(engine.get(b"bravo"), Some("2".into()));
    assert_eq!(engine.get(b"charlie"), None);
}

#[test]
fn test_unicode_keys() {
    let engine = Silt::open(common::memory_config()).unwrap();

    engine.put("café", "coffee").unwrap().wait_applied().unwrap();
    engine.put("日本語", "japanese").unwrap().wait_applied().unwrap();

    assert_eq!(engine.get("café".as_bytes()), Some("coffee".into()));
    assert_eq!(engine.get("日本語".as_bytes()), Some("japanese".into()));
}

#[test]
fn test_many_writes_survive_freezes() {
    let engine = Silt::open(common::tiny_segment_config()).unwrap();

    let mut last = None;
    for i in 0..100 {
        let key = format!("key_{i:04}");
        last = Some(engine.put(key, format!("value_{i:04}")).unwrap());
    }
    last.unwrap().wait_applied().unwrap();
    assert!(engine.metrics().segment_freezes.load(std::sync::atomic::Ordering::Relaxed) > 0);

    // Recent writes are still readable from memory tiers.
    assert_eq!(engine.get(b"key_0099"), Some("value_0099".into()));
}
