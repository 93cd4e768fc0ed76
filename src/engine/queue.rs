//! SILT - Write Queue
//! The single sequential writer. Every submitted batch is applied to
//! the storage state by one worker thread, in submission order, exactly
//! once, no matter how many producers submit concurrently.
//!
//! Lifecycle is one-way: Running -> Stopping -> Stopped. Stopping
//! drains everything still queued and resolves it with
//! [`SiltError::Stopped`]; a submission is never silently dropped.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;

use crate::batch::TimestampedBatch;
use crate::engine::metrics::EngineMetrics;
use crate::engine::oracle::CommitDone;
use crate::engine::signal::WriteSignal;
use crate::engine::state::StorageState;
use crate::error::{Result, SiltError};

const RUNNING: u8 = 0;
const STOPPING: u8 = 1;
const STOPPED: u8 = 2;

struct WriteRequest {
    batch: TimestampedBatch,
    commit_done: CommitDone,
    signal: Arc<WriteSignal>,
}

/// Serializer for all durable-intent writes.
pub struct WriteQueue {
    requests: Sender<WriteRequest>,
    drain: Receiver<WriteRequest>,
    stop: Sender<()>,
    lifecycle: Arc<AtomicU8>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WriteQueue {
    /// Spawn the worker thread. `depth` bounds the submission queue and
    /// provides backpressure to producers.
    pub fn start(
        storage: Arc<StorageState>,
        depth: usize,
        metrics: Arc<EngineMetrics>,
    ) -> Result<Arc<Self>> {
        let (requests, mailbox) = bounded(depth);
        let (stop, stop_rx) = bounded(1);
        let lifecycle = Arc::new(AtomicU8::new(RUNNING));

        let worker = thread::Builder::new().name("silt-write-queue".into()).spawn({
            let mailbox: Receiver<WriteRequest> = mailbox.clone();
            let lifecycle = lifecycle.clone();
            move || {
                worker_loop(storage, &mailbox, stop_rx, metrics);
                drain_requests(&mailbox);
                lifecycle.store(STOPPED, Ordering::Release);
            }
        })?;

        Ok(Arc::new(Self {
            requests,
            drain: mailbox,
            stop,
            lifecycle,
            worker: Mutex::new(Some(worker)),
        }))
    }

    /// Submit a timestamped batch for application.
    ///
    /// Returns immediately with a signal that always reaches exactly one
    /// terminal resolution. After `stop` has begun the signal resolves
    /// with [`SiltError::Stopped`] without enqueueing. The enqueue
    /// itself blocks only when the bounded queue is full.
    pub fn submit(&self, batch: TimestampedBatch, commit_done: CommitDone) -> Arc<WriteSignal> {
        let signal = WriteSignal::new();

        if self.lifecycle.load(Ordering::Acquire) != RUNNING {
            commit_done.done();
            signal.fail(SiltError::Stopped);
            return signal;
        }

        let request = WriteRequest {
            batch,
            commit_done,
            signal: signal.clone(),
        };
        if let Err(rejected) = self.requests.send(request) {
            let request = rejected.into_inner();
            request.commit_done.done();
            request.signal.fail(SiltError::Stopped);
            return signal;
        }

        // A stop may have raced the enqueue and already finished its
        // drain; re-check and drain again so nothing is stranded.
        if self.lifecycle.load(Ordering::Acquire) != RUNNING {
            drain_requests(&self.drain);
        }
        signal
    }

    /// Begin shutdown and drain the queue. Idempotent; only the first
    /// caller performs the drain and joins the worker.
    pub fn stop(&self) {
        if self
            .lifecycle
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let _ = self.stop.send(());
        drain_requests(&self.drain);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                log::error!("write queue worker panicked");
            }
        }
        self.lifecycle.store(STOPPED, Ordering::Release);
        log::info!("write queue stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.load(Ordering::Acquire) == RUNNING
    }
}

fn worker_loop(
    storage: Arc<StorageState>,
    mailbox: &Receiver<WriteRequest>,
    stop: Receiver<()>,
    metrics: Arc<EngineMetrics>,
) {
    loop {
        select! {
            recv(mailbox) -> message => match message {
                Ok(request) => apply(&storage, &metrics, request),
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }
}

fn apply(storage: &StorageState, metrics: &EngineMetrics, request: WriteRequest) {
    match storage.set(&request.batch) {
        Ok(durable) => {
            request.commit_done.done();
            request.signal.applied(durable);
            metrics.record_apply();
        }
        Err(error) => {
            log::warn!(
                "batch at timestamp {} failed to apply: {error}",
                request.batch.timestamp()
            );
            request.commit_done.done();
            request.signal.fail(error);
        }
    }
}

fn drain_requests(mailbox: &Receiver<WriteRequest>) {
    while let Ok(request) = mailbox.try_recv() {
        request.commit_done.done();
        request.signal.fail(SiltError::Stopped);
    }
}
