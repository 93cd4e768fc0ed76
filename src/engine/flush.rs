//! SILT - Background Flush
//! Persists inactive segments to the object store, oldest first.
//! Freezes nudge the worker immediately; a periodic tick retries
//! anything left behind by an earlier I/O failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{select, tick, unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::engine::codec;
use crate::engine::segment::Segment;
use crate::engine::state::StateInner;
use crate::engine::store::segment_path;
use crate::error::{Result, SiltError};

enum FlushCommand {
    Nudge,
    Stop,
}

pub(crate) struct Flusher {
    commands: Sender<FlushCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Flusher {
    pub(crate) fn start(inner: Arc<StateInner>, interval: Duration) -> Result<Self> {
        let (commands, mailbox) = unbounded();
        let worker = thread::Builder::new()
            .name("silt-flush".into())
            .spawn(move || run(inner, mailbox, interval))?;

        Ok(Self {
            commands,
            worker: Mutex::new(Some(worker)),
            stopped: AtomicBool::new(false),
        })
    }

    /// Ask the worker to flush the oldest pending segment now.
    pub(crate) fn nudge(&self) {
        let _ = self.commands.send(FlushCommand::Nudge);
    }

    /// Stop the worker; pending durability signals resolve with
    /// [`SiltError::Stopped`]. Idempotent.
    pub(crate) fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.commands.send(FlushCommand::Stop);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                log::error!("flush worker panicked");
            }
        }
    }
}

fn run(inner: Arc<StateInner>, mailbox: Receiver<FlushCommand>, interval: Duration) {
    let ticker = tick(interval);
    loop {
        select! {
            recv(mailbox) -> command => match command {
                Ok(FlushCommand::Nudge) => flush_oldest(&inner),
                Ok(FlushCommand::Stop) | Err(_) => break,
            },
            recv(ticker) -> _ => flush_oldest(&inner),
        }
    }
    drain(&inner);
}

/// Flush the oldest inactive segment, if any. On success the segment
/// leaves the inactive list and its durability signal resolves Ok; on
/// failure it stays resident for the next tick.
fn flush_oldest(inner: &StateInner) {
    let Some(segment) = inner.oldest_inactive() else {
        return;
    };

    match persist(inner, &segment) {
        Ok(written) => {
            inner.remove_inactive(segment.id());
            segment.durable().resolve(Ok(()));
            inner.metrics.record_flush(written);
            log::info!("flushed segment {} ({} bytes)", segment.id(), written);
        }
        Err(error) => {
            inner.metrics.record_flush_failure();
            log::warn!(
                "flush of segment {} failed, leaving it for retry: {error}",
                segment.id()
            );
        }
    }
}

fn persist(inner: &StateInner, segment: &Segment) -> Result<usize> {
    let artifact = codec::encode_segment(segment.iter())?;
    let written = artifact.len();
    inner.store.set(&segment_path(segment.id()), artifact)?;
    Ok(written)
}

fn drain(inner: &StateInner) {
    let pending: Vec<Arc<Segment>> = inner.inactive.write().drain(..).collect();
    for segment in pending {
        segment.durable().resolve(Err(SiltError::Stopped));
    }
}
