//! SILT - Completion Signals
//! One-shot, thread-safe notifications of an operation's outcome.
//!
//! A [`Signal`] resolves exactly once; later resolutions are no-ops and
//! every waiter (past or future) observes the first outcome. The chained
//! [`WriteSignal`] resolves with a *nested* signal, letting a caller wait
//! first for "applied to memory" and then, separately, for "durable".

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, SiltError};

/// A one-shot completion notification.
pub struct Signal {
    state: Mutex<Option<Result<()>>>,
    cond: Condvar,
}

impl Signal {
    /// Create an unresolved signal.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(None),
            cond: Condvar::new(),
        })
    }

    /// Resolve the signal. The first resolution wins; returns false if
    /// the signal was already resolved.
    pub fn resolve(&self, outcome: Result<()>) -> bool {
        let mut state = self.state.lock();
        if state.is_some() {
            return false;
        }
        *state = Some(outcome);
        drop(state);
        self.cond.notify_all();
        true
    }

    /// Returns true once the signal has been resolved.
    pub fn is_resolved(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Non-blocking view of the outcome, if resolved.
    pub fn peek(&self) -> Option<Result<()>> {
        self.state.lock().clone()
    }

    /// Block until the signal resolves; returns immediately on all
    /// future calls.
    pub fn wait(&self) -> Result<()> {
        let mut state = self.state.lock();
        loop {
            if let Some(outcome) = state.as_ref() {
                return outcome.clone();
            }
            self.cond.wait(&mut state);
        }
    }

    /// Block until the signal resolves or the timeout elapses.
    /// Returns `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<()>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(outcome) = state.as_ref() {
                return Some(outcome.clone());
            }
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return state.clone();
            }
        }
    }
}

/// A two-level completion signal for writes.
///
/// The first level resolves when the batch has been applied to the
/// active segment; its success value is the [`Signal`] of the segment
/// the batch landed in, which resolves when that segment reaches the
/// object store.
pub struct WriteSignal {
    state: Mutex<Option<Result<Arc<Signal>>>>,
    cond: Condvar,
}

impl WriteSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(None),
            cond: Condvar::new(),
        })
    }

    /// Resolve the applied level with the durability signal of the
    /// segment the batch landed in. First resolution wins.
    pub fn applied(&self, durable: Arc<Signal>) -> bool {
        self.finish(Ok(durable))
    }

    /// Resolve the applied level with an error. First resolution wins.
    pub fn fail(&self, error: SiltError) -> bool {
        self.finish(Err(error))
    }

    fn finish(&self, outcome: Result<Arc<Signal>>) -> bool {
        let mut state = self.state.lock();
        if state.is_some() {
            return false;
        }
        *state = Some(outcome);
        drop(state);
        self.cond.notify_all();
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Block until the batch is applied (or rejected). On success the
    /// returned signal tracks durability of the containing segment.
    pub fn wait_applied(&self) -> Result<Arc<Signal>> {
        let mut state = self.state.lock();
        loop {
            if let Some(outcome) = state.as_ref() {
                return outcome.clone();
            }
            self.cond.wait(&mut state);
        }
    }

    /// Block until the batch is applied or the timeout elapses.
    /// Returns `None` on timeout.
    pub fn wait_applied_timeout(&self, timeout: Duration) -> Option<Result<Arc<Signal>>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(outcome) = state.as_ref() {
                return Some(outcome.clone());
            }
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return state.clone();
            }
        }
    }

    /// Block through both levels: applied, then durable.
    pub fn wait_durable(&self) -> Result<()> {
        self.wait_applied()?.wait()
    }
}
