//! Dispatcher worker pool: a fixed set of OS threads pulling from the queue.
//!
//! Each worker owns a single-threaded tokio runtime so async handlers can do
//! I/O without borrowing the embedding application's runtime. Concurrency is
//! capped by construction: N workers, each holding at most one entry.
//!
//! # Example
//!
//! ```rust,ignore
//! use status_ingest::config::WorkerPoolConfig;
//! use status_ingest::core::WorkerPool;
//!
//! let pool = WorkerPool::start(
//!     WorkerPoolConfig::new().with_worker_count(4),
//!     queue,
//!     handlers,
//!     metrics,
//!     counters,
//! )?;
//! // ...
//! pool.shutdown();
//! ```

mod native;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub use native::WorkerPool;

/// Result of one handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// The handler returned normally.
    Success(Duration),
    /// The handler returned an error, panicked, timed out, or no handler existed.
    Failure(Duration),
}

impl ProcessingOutcome {
    /// Wall-clock time spent in the invocation.
    #[must_use]
    pub const fn elapsed(self) -> Duration {
        match self {
            Self::Success(d) | Self::Failure(d) => d,
        }
    }

    /// Whether the invocation succeeded.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Statistics about worker activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Worker threads running.
    pub worker_count: usize,
    /// Invocations in progress.
    pub in_flight: usize,
    /// Highest `in_flight` value observed.
    pub peak_in_flight: usize,
}

/// Gauges shared between the workers and the manager (thread-safe).
#[derive(Debug, Default)]
pub struct WorkerCounters {
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    workers: AtomicUsize,
}

impl WorkerCounters {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invocations currently in progress.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Snapshot of worker activity.
    #[must_use]
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            worker_count: self.workers.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Acquire),
            peak_in_flight: self.peak_in_flight.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn begin(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::Relaxed);
    }

    pub(crate) fn end(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn set_workers(&self, n: usize) {
        self.workers.store(n, Ordering::Relaxed);
    }
}
