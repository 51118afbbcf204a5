//! Native implementation of `WorkerPool` using OS threads.
//!
//! # Design Principles
//!
//! - **No polling**: workers park in a blocking channel receive
//! - **Failure isolation**: handler errors, panics and timeouts become `Failure`
//! - **Drain on shutdown**: closing the queue lets workers finish buffered entries

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

use crate::config::WorkerPoolConfig;
use crate::core::handler::HandlerRegistry;
use crate::core::metrics::MetricsAggregator;
use crate::core::{HandlerError, IngestError};
use crate::infra::queue::{BoundedQueue, QueueEntry};

use super::{ProcessingOutcome, WorkerCounters};

/// Fixed pool of dispatcher threads.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    queue: Arc<BoundedQueue>,
    counters: Arc<WorkerCounters>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// State each worker thread owns.
struct WorkerContext {
    worker_id: usize,
    queue: Arc<BoundedQueue>,
    handlers: Arc<HandlerRegistry>,
    metrics: Arc<MetricsAggregator>,
    counters: Arc<WorkerCounters>,
    handler_timeout: Option<Duration>,
}

impl WorkerPool {
    /// Spawn `config.worker_count` workers consuming `queue`.
    ///
    /// # Errors
    ///
    /// `IngestError::InvalidConfig` for invalid settings, `IngestError::WorkerSpawn`
    /// if a runtime or thread cannot be created. Workers already spawned keep
    /// running until the queue is closed.
    pub fn start(
        config: WorkerPoolConfig,
        queue: Arc<BoundedQueue>,
        handlers: Arc<HandlerRegistry>,
        metrics: Arc<MetricsAggregator>,
        counters: Arc<WorkerCounters>,
    ) -> Result<Self, IngestError> {
        config.validate().map_err(IngestError::InvalidConfig)?;

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let ctx = WorkerContext {
                worker_id,
                queue: Arc::clone(&queue),
                handlers: Arc::clone(&handlers),
                metrics: Arc::clone(&metrics),
                counters: Arc::clone(&counters),
                handler_timeout: config.handler_timeout(),
            };
            workers.push(spawn_worker(ctx, config.thread_stack_size)?);
            counters.set_workers(workers.len());
        }

        info!(
            worker_count = config.worker_count,
            queue_capacity = queue.capacity(),
            handler_timeout_ms = ?config.handler_timeout_ms,
            "worker pool started"
        );

        Ok(Self {
            config,
            queue,
            counters,
            workers: Mutex::new(workers),
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Invocations currently in progress.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight()
    }

    /// Close the queue, let workers drain it, and join them.
    ///
    /// Waits at most `shutdown_timeout` overall; workers still busy after that
    /// are detached. Idempotent.
    pub fn shutdown(&self) {
        self.queue.close();

        let mut workers = self.workers.lock();
        if workers.is_empty() {
            return;
        }
        info!(pending = self.queue.len(), "shutting down worker pool");

        let deadline = Instant::now() + self.config.shutdown_timeout();
        let worker_count = workers.len();
        for (idx, worker) in workers.drain(..).enumerate() {
            let (tx, rx) = std::sync::mpsc::channel();
            let join_thread = thread::spawn(move || {
                let result = worker.join();
                let _ = tx.send(result.is_ok());
            });

            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(true) => debug!(worker_id = idx, "worker joined"),
                Ok(false) => warn!(worker_id = idx, "worker panicked"),
                Err(_) => {
                    warn!(worker_id = idx, "worker did not exit within timeout - detaching");
                    continue;
                }
            }
            let _ = join_thread.join();
        }
        self.counters.set_workers(0);

        info!(worker_count, "worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Unblock idle workers; joining is left to an explicit shutdown().
        self.queue.close();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("stats", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}

/// Spawn a worker thread with its own current-thread runtime.
fn spawn_worker(ctx: WorkerContext, stack_size: usize) -> Result<JoinHandle<()>, IngestError> {
    let worker_id = ctx.worker_id;
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error!(worker_id, error = %e, "failed to create worker runtime");
            IngestError::WorkerSpawn(format!("worker {worker_id} runtime: {e}"))
        })?;

    thread::Builder::new()
        .name(format!("ingest-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || worker_loop(&ctx, &rt))
        .map_err(|e| IngestError::WorkerSpawn(format!("worker {worker_id} thread: {e}")))
}

fn worker_loop(ctx: &WorkerContext, rt: &Runtime) {
    debug!(worker_id = ctx.worker_id, "worker started");

    // Parks in recv until an entry arrives; None once the queue is closed and drained.
    while let Some(entry) = ctx.queue.dequeue() {
        ctx.counters.begin();
        let started = Instant::now();
        let id = entry.id;
        let category = entry.message.category.clone();

        let result = dispatch(rt, &ctx.handlers, entry, ctx.handler_timeout);

        let elapsed = started.elapsed();
        ctx.counters.end();

        let outcome = match result {
            Ok(()) => {
                debug!(worker_id = ctx.worker_id, %id, %category, ?elapsed, "message processed");
                ProcessingOutcome::Success(elapsed)
            }
            Err(err) => {
                warn!(worker_id = ctx.worker_id, %id, %category, error = %err, "handler failed");
                ProcessingOutcome::Failure(elapsed)
            }
        };
        ctx.metrics.record_processed(outcome);
    }

    debug!(worker_id = ctx.worker_id, "queue closed, worker exiting");
}

/// Run the category handler for one entry on the worker runtime.
///
/// The handler runs as a spawned task so a panic surfaces as a `JoinError`
/// instead of unwinding the worker, and a timed-out call can be aborted.
fn dispatch(
    rt: &Runtime,
    handlers: &HandlerRegistry,
    entry: QueueEntry,
    timeout: Option<Duration>,
) -> Result<(), HandlerError> {
    let QueueEntry { message, .. } = entry;
    let Some(handler) = handlers.get(&message.category) else {
        return Err(HandlerError::UnknownCategory(message.category));
    };
    let fields = message.fields;

    rt.block_on(async move {
        let mut task = tokio::spawn(async move { handler.handle(&fields).await });
        let joined = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Err(HandlerError::Timeout(
                        u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    ));
                }
            },
            None => task.await,
        };
        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(HandlerError::Panicked),
            Err(e) => Err(HandlerError::failed(format!("handler task cancelled: {e}"))),
        }
    })
}
