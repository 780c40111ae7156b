//! Worker pool and the bounded work queue feeding it.
//!
//! A fixed number of long-lived tasks share one receiver; each queued
//! statement is taken by exactly one worker. The queue is bounded, so a full
//! queue blocks the producer.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use super::progress::ProgressSink;
use super::with_preamble;
use crate::db::DatabaseClient;
use crate::dump::RawStatement;
use crate::error::{ReplayError, Result};

/// Queue slots per worker.
pub const QUEUE_DEPTH_PER_WORKER: usize = 4;

/// Statements enqueued but not yet finished executing.
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn end(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            // Registered before the check so a concurrent `end` cannot be missed.
            let notified = self.idle.notified();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Marks one queued statement finished when dropped, even if the worker panics.
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.end();
    }
}

/// Producer side of the work queue. Dropping it closes the queue.
pub struct WorkQueue {
    sender: mpsc::Sender<RawStatement>,
    in_flight: Arc<InFlight>,
}

impl WorkQueue {
    /// Enqueues a statement, waiting while the queue is full.
    pub async fn push(&self, stmt: RawStatement) -> Result<()> {
        self.in_flight.begin();
        if self.sender.send(stmt).await.is_err() {
            self.in_flight.end();
            return Err(ReplayError::internal("work queue closed: no workers left"));
        }
        Ok(())
    }

    /// Waits until every statement enqueued so far has finished executing.
    ///
    /// Fails if the workers are gone, since statements still buffered in the
    /// queue will then never run.
    pub async fn wait_idle(&self) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.in_flight.wait_idle() => Ok(()),
            _ = self.sender.closed() => Err(ReplayError::internal(
                "work queue closed: no workers left",
            )),
        }
    }

    /// Number of statements enqueued but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Total queue capacity.
    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }
}

/// Outcome counts for statements executed by the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Shared state every worker needs.
struct WorkerContext {
    receiver: Arc<Mutex<mpsc::Receiver<RawStatement>>>,
    client: Arc<dyn DatabaseClient>,
    progress: Arc<dyn ProgressSink>,
    preamble: Arc<str>,
    counters: Arc<Counters>,
}

/// A fixed set of executors draining the work queue.
pub struct WorkerPool {
    workers: JoinSet<()>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Spawns `size` workers and returns the pool with its queue.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        size: usize,
        client: Arc<dyn DatabaseClient>,
        progress: Arc<dyn ProgressSink>,
        preamble: Arc<str>,
    ) -> (Self, WorkQueue) {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel(size * QUEUE_DEPTH_PER_WORKER);
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(Counters::default());
        let in_flight = Arc::new(InFlight::default());

        let mut workers = JoinSet::new();
        for id in 0..size {
            let ctx = WorkerContext {
                receiver: receiver.clone(),
                client: client.clone(),
                progress: progress.clone(),
                preamble: preamble.clone(),
                counters: counters.clone(),
            };
            workers.spawn(run_worker(id, ctx, in_flight.clone()));
        }
        debug!(workers = size, capacity = size * QUEUE_DEPTH_PER_WORKER, "Worker pool started");

        (
            Self { workers, counters },
            WorkQueue { sender, in_flight },
        )
    }

    /// Stops all workers without draining; queued statements are discarded.
    pub fn abort(&mut self) {
        warn!(workers = self.workers.len(), "Aborting worker pool");
        self.workers.abort_all();
    }

    /// Waits for every worker to exit.
    ///
    /// Workers exit once the queue is closed and empty, so the queue must be
    /// dropped first or this never returns.
    pub async fn join(mut self) -> Result<PoolSummary> {
        let mut panicked = 0usize;

        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    error!(error = %e, "Worker panicked");
                    panicked += 1;
                }
            }
        }

        if panicked > 0 {
            return Err(ReplayError::internal(format!(
                "{panicked} worker(s) panicked"
            )));
        }

        Ok(PoolSummary {
            succeeded: self.counters.succeeded.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        })
    }
}

async fn run_worker(id: usize, ctx: WorkerContext, in_flight: Arc<InFlight>) {
    loop {
        let next = ctx.receiver.lock().await.recv().await;
        let Some(stmt) = next else {
            break;
        };
        let _guard = InFlightGuard(in_flight.clone());

        let sql = with_preamble(&ctx.preamble, &stmt);
        match ctx.client.execute(&sql).await {
            Ok(()) => {
                ctx.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                ctx.progress.statement_done();
            }
            Err(e) => {
                ctx.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(worker = id, error = %e, "Statement failed");
                ctx.progress.execution_failed(&stmt.to_sql(), &e);
            }
        }
    }

    debug!(worker = id, "Worker exiting, queue closed");
}
