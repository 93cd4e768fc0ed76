//! SILT - Timestamp Oracle
//! Issues monotonically increasing commit timestamps and derives read
//! timestamps that are safe to serve: a new reader never observes a
//! partially applied write.
//!
//! Two watermarks back the oracle. The begin-watermark tracks in-flight
//! readers (its floor bounds what cleanup may discard); the
//! commit-watermark tracks writes between timestamp assignment and
//! application, and gates `read_timestamp` until everything at or below
//! the candidate read timestamp is visible.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::queue::WriteQueue;
use crate::engine::watermark::Watermark;
use crate::error::Result;
use crate::types::Timestamp;

/// One-shot token finishing a commit's watermark mark once the batch
/// has been applied (or terminally rejected). Consuming it is the only
/// way to retire the mark, so it cannot be double-finished.
pub struct CommitDone {
    mark: Arc<Watermark>,
    timestamp: Timestamp,
}

impl CommitDone {
    /// Retire the commit mark.
    pub fn done(self) {
        self.mark.finish(self.timestamp);
    }
}

/// The engine's timestamp authority.
pub struct Oracle {
    next_ts: Mutex<Timestamp>,
    begin_mark: Arc<Watermark>,
    commit_mark: Arc<Watermark>,
    queue: Arc<WriteQueue>,
}

impl Oracle {
    /// Build an oracle resuming from the last persisted commit
    /// timestamp; both watermarks are pre-marked finished through it.
    pub fn new(last_committed: Timestamp, queue: Arc<WriteQueue>) -> Result<Self> {
        let begin_mark = Watermark::new("begin")?;
        let commit_mark = Watermark::new("commit")?;

        begin_mark.begin(last_committed);
        begin_mark.finish(last_committed);
        commit_mark.begin(last_committed);
        commit_mark.finish(last_committed);

        Ok(Self {
            next_ts: Mutex::new(last_committed + 1),
            begin_mark,
            commit_mark,
            queue,
        })
    }

    /// Obtain a read timestamp covering every commit at or below it.
    ///
    /// The candidate is registered on the begin-watermark under the
    /// assignment lock, then the call blocks until the commit-watermark
    /// confirms all writes at or below it have been applied.
    pub fn read_timestamp(&self) -> Timestamp {
        let read_ts = {
            let next = self.next_ts.lock();
            let read_ts = *next - 1;
            self.begin_mark.begin(read_ts);
            read_ts
        };

        // A stopped commit-watermark unblocks immediately, so this
        // cannot hang across shutdown.
        let _ = self.commit_mark.wait_for(read_ts, None);
        read_ts
    }

    /// Release a read timestamp obtained from [`Oracle::read_timestamp`].
    pub fn finish_read(&self, read_ts: Timestamp) {
        self.begin_mark.finish(read_ts);
    }

    /// Highest timestamp no current or future reader can be below.
    /// Cleanup may safely discard versions at or below this floor.
    pub fn max_begin_timestamp(&self) -> Timestamp {
        self.begin_mark.done_till()
    }

    /// Assign the next commit timestamp and register it in flight on
    /// the commit-watermark. The returned token must be consumed when
    /// the write reaches a terminal outcome.
    pub fn commit_timestamp(&self) -> (Timestamp, CommitDone) {
        let mut next = self.next_ts.lock();
        let ts = *next;
        *next += 1;
        self.commit_mark.begin(ts);
        drop(next);

        (
            ts,
            CommitDone {
                mark: self.commit_mark.clone(),
                timestamp: ts,
            },
        )
    }

    /// Stop both watermarks and the write queue.
    pub fn close(&self) {
        self.queue.stop();
        self.begin_mark.stop();
        self.commit_mark.stop();
    }
}
