//! SILT - Timestamp Watermark
//! Tracks the highest timestamp T such that every operation begun at or
//! below T has finished, even when finishes arrive out of order.
//!
//! ## Event Loop
//! All mutation happens on one dedicated thread that drains a
//! multi-producer mailbox of begin/finish marks, so the heap and count
//! maps need no lock. Producers (`begin`, `finish`, `wait_for`) only
//! ever send messages. The floor itself is published through an atomic,
//! so `done_till()` is a lock-free read from any thread.
//!
//! ## Algorithm
//! The loop keeps a min-heap of distinct pending timestamps and a
//! per-timestamp outstanding-begin counter. After each mark it pops the
//! heap minimum while its counter has reached zero, raising a local
//! floor, then publishes the floor with a compare-and-swap that never
//! lets it decrease. Waiters registered at or below the new floor are
//! released on every advance.

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::{Result, SiltError};
use crate::types::Timestamp;

enum Event {
    Begin(Timestamp),
    Finish(Timestamp),
    Wait {
        target: Timestamp,
        id: u64,
        notify: Sender<()>,
    },
    Cancel {
        target: Timestamp,
        id: u64,
    },
    Stop,
}

/// Watermark over a stream of begin/finish marks.
pub struct Watermark {
    name: &'static str,
    done_till: Arc<AtomicU64>,
    events: Sender<Event>,
    next_waiter_id: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Watermark {
    /// Spawn the watermark's event loop. `name` labels the loop thread
    /// and log lines.
    pub fn new(name: &'static str) -> Result<Arc<Self>> {
        let (events, mailbox) = unbounded();
        let done_till = Arc::new(AtomicU64::new(0));

        let worker = thread::Builder::new()
            .name(format!("watermark-{name}"))
            .spawn({
                let done_till = done_till.clone();
                move || event_loop(mailbox, done_till)
            })?;

        Ok(Arc::new(Self {
            name,
            done_till,
            events,
            next_waiter_id: AtomicU64::new(0),
            worker: Mutex::new(Some(worker)),
        }))
    }

    /// Signal that an operation at `ts` has begun. Non-blocking; ignored
    /// after `stop`.
    pub fn begin(&self, ts: Timestamp) {
        let _ = self.events.send(Event::Begin(ts));
    }

    /// Signal that an operation at `ts` has finished. Non-blocking;
    /// ignored after `stop`.
    pub fn finish(&self, ts: Timestamp) {
        let _ = self.events.send(Event::Finish(ts));
    }

    /// Lock-free read of the current floor: every mark at or below this
    /// timestamp has finished.
    pub fn done_till(&self) -> Timestamp {
        self.done_till.load(Ordering::Acquire)
    }

    /// Block until the floor reaches `ts`, the deadline elapses, or the
    /// watermark stops.
    ///
    /// Returns `Ok` immediately when `ts` is already covered, and `Ok`
    /// when the watermark stops while waiting (a stopped watermark never
    /// leaves a waiter hanging). A deadline miss returns
    /// [`SiltError::WaitDeadline`].
    pub fn wait_for(&self, ts: Timestamp, deadline: Option<Duration>) -> Result<()> {
        if self.done_till() >= ts {
            return Ok(());
        }

        let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
        let (notify, notified) = bounded(1);
        if self
            .events
            .send(Event::Wait {
                target: ts,
                id,
                notify,
            })
            .is_err()
        {
            return Ok(());
        }

        match deadline {
            Some(limit) => match notified.recv_timeout(limit) {
                Ok(()) => Ok(()),
                Err(RecvTimeoutError::Timeout) => {
                    // Deregister so the abandoned entry does not outlive
                    // this call.
                    let _ = self.events.send(Event::Cancel { target: ts, id });
                    Err(SiltError::WaitDeadline(ts))
                }
                Err(RecvTimeoutError::Disconnected) => Ok(()),
            },
            None => {
                let _ = notified.recv();
                Ok(())
            }
        }
    }

    /// Terminate the event loop. Every blocked waiter is released.
    /// Idempotent; safe to call from multiple threads.
    pub fn stop(&self) {
        let _ = self.events.send(Event::Stop);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                log::error!("watermark {} event loop panicked", self.name);
            }
        }
    }
}

impl Drop for Watermark {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Waiter {
    id: u64,
    notify: Sender<()>,
}

struct LoopState {
    pending: BinaryHeap<Reverse<Timestamp>>,
    counts: HashMap<Timestamp, i64>,
    waiters: HashMap<Timestamp, Vec<Waiter>>,
    done_till: Arc<AtomicU64>,
}

fn event_loop(mailbox: Receiver<Event>, done_till: Arc<AtomicU64>) {
    let mut state = LoopState {
        pending: BinaryHeap::new(),
        counts: HashMap::new(),
        waiters: HashMap::new(),
        done_till,
    };

    for event in mailbox.iter() {
        match event {
            Event::Begin(ts) => state.mark(ts, 1),
            Event::Finish(ts) => state.mark(ts, -1),
            Event::Wait { target, id, notify } => state.register(target, id, notify),
            Event::Cancel { target, id } => state.cancel(target, id),
            Event::Stop => break,
        }
    }
    // Dropping the loop state closes every waiter channel, which
    // unblocks the waiters without an error.
}

impl LoopState {
    fn mark(&mut self, ts: Timestamp, delta: i64) {
        match self.counts.entry(ts) {
            Entry::Vacant(slot) => {
                slot.insert(delta);
                self.pending.push(Reverse(ts));
            }
            Entry::Occupied(mut slot) => {
                *slot.get_mut() += delta;
            }
        }

        let mut floor = self.done_till.load(Ordering::Acquire);
        while let Some(&Reverse(lowest)) = self.pending.peek() {
            if self.counts.get(&lowest).copied().unwrap_or(0) > 0 {
                break;
            }
            self.pending.pop();
            self.counts.remove(&lowest);
            floor = floor.max(lowest);
        }
        self.advance(floor);
    }

    /// Raise the published floor to `floor` (never lowering it), then
    /// release every waiter whose target is now covered.
    fn advance(&mut self, floor: Timestamp) {
        let mut current = self.done_till.load(Ordering::Acquire);
        while floor > current {
            match self.done_till.compare_exchange(
                current,
                floor,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(seen) => current = seen,
            }
        }

        let covered = self.done_till.load(Ordering::Acquire);
        self.waiters.retain(|&target, waiters| {
            if target <= covered {
                for waiter in waiters.drain(..) {
                    let _ = waiter.notify.send(());
                }
                false
            } else {
                true
            }
        });
    }

    fn register(&mut self, target: Timestamp, id: u64, notify: Sender<()>) {
        if self.done_till.load(Ordering::Acquire) >= target {
            let _ = notify.send(());
            return;
        }
        self.waiters
            .entry(target)
            .or_default()
            .push(Waiter { id, notify });
    }

    fn cancel(&mut self, target: Timestamp, id: u64) {
        if let Some(waiters) = self.waiters.get_mut(&target) {
            waiters.retain(|waiter| waiter.id != id);
            if waiters.is_empty() {
                self.waiters.remove(&target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_out_of_order_finishes() {
        let mark = Watermark::new("test").unwrap();
        mark.begin(1);
        mark.begin(2);
        mark.finish(2);
        mark.finish(1);

        mark.wait_for(2, Some(SECOND)).unwrap();
        assert_eq!(mark.done_till(), 2);
    }

    #[test]
    fn test_floor_stops_at_unfinished_timestamp() {
        let mark = Watermark::new("test").unwrap();
        mark.begin(1);
        mark.begin(2);
        mark.begin(3);
        mark.finish(1);
        mark.finish(3);

        mark.wait_for(1, Some(SECOND)).unwrap();
        assert_eq!(mark.done_till(), 1);

        mark.finish(2);
        mark.wait_for(3, Some(SECOND)).unwrap();
        assert_eq!(mark.done_till(), 3);
    }

    #[test]
    fn test_shared_timestamp_needs_all_finishes() {
        let mark = Watermark::new("test").unwrap();
        mark.begin(5);
        mark.begin(5);
        mark.finish(5);

        assert!(matches!(
            mark.wait_for(5, Some(Duration::from_millis(30))),
            Err(SiltError::WaitDeadline(5))
        ));

        mark.finish(5);
        mark.wait_for(5, Some(SECOND)).unwrap();
        assert_eq!(mark.done_till(), 5);
    }

    #[test]
    fn test_wait_returns_immediately_when_covered() {
        let mark = Watermark::new("test").unwrap();
        mark.begin(1);
        mark.finish(1);
        mark.wait_for(1, Some(SECOND)).unwrap();

        let started = Instant::now();
        mark.wait_for(1, Some(SECOND)).unwrap();
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_deadline_error_within_expected_window() {
        let mark = Watermark::new("test").unwrap();
        mark.begin(7);

        let started = Instant::now();
        let result = mark.wait_for(7, Some(Duration::from_millis(15)));
        assert!(matches!(result, Err(SiltError::WaitDeadline(7))));
        assert!(started.elapsed() >= Duration::from_millis(15));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_waiter_can_retry_after_deadline() {
        let mark = Watermark::new("test").unwrap();
        mark.begin(4);
        assert!(mark.wait_for(4, Some(Duration::from_millis(15))).is_err());

        mark.finish(4);
        mark.wait_for(4, Some(SECOND)).unwrap();
        assert_eq!(mark.done_till(), 4);
    }

    #[test]
    fn test_stop_releases_waiters() {
        let mark = Watermark::new("test").unwrap();
        mark.begin(9);

        let waiter = {
            let mark = mark.clone();
            std::thread::spawn(move || mark.wait_for(9, None))
        };
        std::thread::sleep(Duration::from_millis(20));
        mark.stop();

        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mark = Watermark::new("test").unwrap();
        mark.stop();
        mark.stop();
    }

    #[test]
    fn test_concurrent_producers() {
        let mark = Watermark::new("test").unwrap();
        let mut handles = vec![];
        for chunk in 0..4 {
            let mark = mark.clone();
            handles.push(std::thread::spawn(move || {
                for ts in (chunk * 25 + 1)..=(chunk * 25 + 25) {
                    mark.begin(ts);
                    mark.finish(ts);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        mark.wait_for(100, Some(SECOND)).unwrap();
        assert_eq!(mark.done_till(), 100);
    }
}
