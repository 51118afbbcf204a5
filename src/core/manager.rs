//! Queue manager: wires admission, rate limiting, the queue, the worker pool
//! and metrics behind one explicitly constructed value.
//!
//! The manager is owned by the process's composition root and shared by
//! `Arc` with the transport listener and the metrics exporters.
//!
//! ```rust,ignore
//! let manager = Arc::new(QueueManager::new(config, handlers)?);
//! manager.start()?;
//! manager.ingest(datagram);          // from the listener
//! let snapshot = manager.get_metrics(); // from an exporter
//! manager.stop();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::core::admission::{Admission, AdmissionGate, DropReason, FieldShape};
use crate::core::handler::HandlerRegistry;
use crate::core::metrics::{GaugeReadings, MetricsAggregator, MetricsSnapshot};
use crate::core::rate_limiter::RateLimiter;
use crate::core::worker_pool::{PoolStats, WorkerCounters, WorkerPool};
use crate::core::IngestError;
use crate::infra::queue::{BoundedQueue, EnqueueError, QueueEntry};
use crate::util::clock::{SharedClock, SystemClock};

/// What `enqueue` did with one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Placed on the queue for a worker.
    Queued,
    /// Discarded and counted under the given reason.
    Dropped(DropReason),
    /// The manager is stopped; nothing was counted.
    Closed,
}

impl Disposition {
    /// Whether the datagram reached the queue.
    #[must_use]
    pub const fn is_queued(self) -> bool {
        matches!(self, Self::Queued)
    }
}

enum Lifecycle {
    Idle,
    Running(WorkerPool),
    Stopped,
}

/// Admission-controlled, rate-limited, bounded ingestion queue.
pub struct QueueManager {
    config: IngestConfig,
    clock: SharedClock,
    metrics: Arc<MetricsAggregator>,
    gate: AdmissionGate,
    limiter: RateLimiter,
    queue: Arc<BoundedQueue>,
    handlers: Arc<HandlerRegistry>,
    counters: Arc<WorkerCounters>,
    lifecycle: Mutex<Lifecycle>,
    accepting: AtomicBool,
    backpressure_reported: AtomicBool,
}

impl QueueManager {
    /// Build a manager on the system clock. Workers are not started.
    ///
    /// # Errors
    ///
    /// `IngestError::InvalidConfig` if `config` fails validation.
    pub fn new(config: IngestConfig, handlers: HandlerRegistry) -> Result<Self, IngestError> {
        Self::with_clock(config, handlers, Arc::new(SystemClock))
    }

    /// Build a manager on an explicit clock.
    ///
    /// # Errors
    ///
    /// `IngestError::InvalidConfig` if `config` fails validation.
    pub fn with_clock(
        config: IngestConfig,
        handlers: HandlerRegistry,
        clock: SharedClock,
    ) -> Result<Self, IngestError> {
        config.validate().map_err(IngestError::InvalidConfig)?;

        for tag in config.categories.keys() {
            if !handlers.contains(tag) {
                warn!(category = %tag, "configured category has no handler; its messages will fail at dispatch");
            }
        }

        let metrics = Arc::new(MetricsAggregator::new(Arc::clone(&clock), config.latency_samples));
        let gate = AdmissionGate::new(config.admission_policy(), Arc::clone(&metrics), Arc::clone(&clock));
        let limiter = RateLimiter::new(config.rate_limit_per_minute(), Arc::clone(&clock));
        let queue = Arc::new(BoundedQueue::new(config.max_queue_size, config.backpressure_threshold)?);

        info!(
            max_queue_size = config.max_queue_size,
            max_concurrent = config.max_concurrent,
            rate_limit_per_minute = ?config.rate_limit_per_minute(),
            categories = config.categories.len(),
            handlers = handlers.len(),
            "queue manager created"
        );

        Ok(Self {
            config,
            clock,
            metrics,
            gate,
            limiter,
            queue,
            handlers: Arc::new(handlers),
            counters: Arc::new(WorkerCounters::new()),
            lifecycle: Mutex::new(Lifecycle::Idle),
            accepting: AtomicBool::new(true),
            backpressure_reported: AtomicBool::new(false),
        })
    }

    /// Admit `raw` against an explicit field count.
    ///
    /// Identifier positions still come from the category's configuration, if
    /// any. Never blocks and never fails: every outcome is a [`Disposition`]
    /// and, unless `Closed`, is counted exactly once under `received`.
    pub fn enqueue(&self, raw: &[u8], expected_field_count: usize) -> Disposition {
        if !self.accepting.load(Ordering::Acquire) {
            return Disposition::Closed;
        }
        let admission = self.gate.admit_with(raw, |category| {
            let identifier_fields = self
                .config
                .categories
                .get(category)
                .map_or(&[][..], |c| c.identifier_fields.as_slice());
            Some(FieldShape {
                expected_fields: expected_field_count,
                identifier_fields,
            })
        });
        self.admitted(admission)
    }

    /// Admit `raw`, taking the field count and identifier positions from the
    /// configuration of its category. Unconfigured categories are dropped as
    /// `FieldCountMismatch`.
    pub fn ingest(&self, raw: &[u8]) -> Disposition {
        if !self.accepting.load(Ordering::Acquire) {
            return Disposition::Closed;
        }
        let admission = self.gate.admit_with(raw, |category| {
            self.config.categories.get(category).map(|c| FieldShape {
                expected_fields: c.expected_fields,
                identifier_fields: &c.identifier_fields,
            })
        });
        self.admitted(admission)
    }

    fn admitted(&self, admission: Admission) -> Disposition {
        let message = match admission {
            Admission::Accepted(message) => message,
            Admission::Rejected(reason) => return Disposition::Dropped(reason),
        };

        if !self.limiter.try_consume() {
            debug!(category = %message.category, "datagram dropped by rate limiter");
            self.metrics.record_rejected(DropReason::RateLimited);
            return Disposition::Dropped(DropReason::RateLimited);
        }

        let entry = QueueEntry::new(message, self.clock.now_ms());
        match self.queue.enqueue(entry) {
            Ok(()) => {
                self.metrics.record_queued();
                self.report_backpressure();
                Disposition::Queued
            }
            Err(EnqueueError::Full) => {
                warn!(capacity = self.queue.capacity(), "queue full, datagram dropped");
                self.metrics.record_rejected(DropReason::QueueFull);
                Disposition::Dropped(DropReason::QueueFull)
            }
            Err(EnqueueError::Closed) => Disposition::Closed,
        }
    }

    /// Log transitions of the advisory backpressure flag.
    fn report_backpressure(&self) {
        let active = self.queue.backpressure_active();
        if self.backpressure_reported.swap(active, Ordering::Relaxed) != active {
            if active {
                warn!(
                    utilization_pct = self.queue.utilization() * 100.0,
                    "queue backpressure active"
                );
            } else {
                info!("queue backpressure cleared");
            }
        }
    }

    /// Self-consistent copy of every metric.
    #[must_use]
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.report_backpressure();
        self.metrics.snapshot(self.gauges())
    }

    /// Reset the cumulative-since-flush counters. Gauges and sliding windows
    /// are unaffected.
    pub fn clear_metrics(&self) {
        self.metrics.clear();
    }

    /// Subtract an exported snapshot's cumulative counters, keeping anything
    /// recorded after it was taken.
    pub fn clear_exported(&self, exported: &MetricsSnapshot) {
        self.metrics.clear_exported(exported);
    }

    fn gauges(&self) -> GaugeReadings {
        GaugeReadings {
            queue_size: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            in_flight: self.counters.in_flight(),
            max_concurrent: self.config.max_concurrent,
            current_rate: self.limiter.current_count(),
            rate_limit_per_minute: self.limiter.limit().unwrap_or(0),
            backpressure_active: self.queue.backpressure_active(),
        }
    }

    /// Spawn the worker pool. Datagrams queued before this call are processed.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if started twice, `Stopped` after `stop`, or
    /// `WorkerSpawn` if threads cannot be created (the manager is then stopped).
    pub fn start(&self) -> Result<(), IngestError> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Running(_) => return Err(IngestError::AlreadyRunning),
            Lifecycle::Stopped => return Err(IngestError::Stopped),
            Lifecycle::Idle => {}
        }

        match WorkerPool::start(
            self.config.worker_pool(),
            Arc::clone(&self.queue),
            Arc::clone(&self.handlers),
            Arc::clone(&self.metrics),
            Arc::clone(&self.counters),
        ) {
            Ok(pool) => {
                *lifecycle = Lifecycle::Running(pool);
                Ok(())
            }
            Err(e) => {
                self.accepting.store(false, Ordering::Release);
                self.queue.close();
                *lifecycle = Lifecycle::Stopped;
                Err(e)
            }
        }
    }

    /// Stop admitting, drain buffered entries through the workers, and join
    /// them within the configured shutdown timeout. Idempotent.
    ///
    /// A manager that was never started discards whatever it buffered.
    pub fn stop(&self) {
        self.accepting.store(false, Ordering::Release);
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);
        match previous {
            Lifecycle::Running(pool) => pool.shutdown(),
            Lifecycle::Idle => {
                self.queue.close();
                let mut discarded = 0usize;
                while self.queue.try_dequeue().is_some() {
                    discarded += 1;
                }
                if discarded > 0 {
                    warn!(discarded, "queue manager stopped before start; buffered messages discarded");
                }
            }
            Lifecycle::Stopped => {}
        }
    }

    /// Whether workers are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running(_))
    }

    /// Worker activity, including the peak in-flight count.
    #[must_use]
    pub fn worker_stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Registered handlers.
    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("queue", &self.queue)
            .field("limiter", &self.limiter)
            .field("handlers", &self.handlers)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
