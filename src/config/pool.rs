//! Worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default per-invocation handler timeout.
pub const DEFAULT_HANDLER_TIMEOUT_MS: u64 = 30_000;
/// Default bound on waiting for workers during shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;
/// Default worker thread stack size.
pub const DEFAULT_THREAD_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Settings for the dispatcher's worker threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Number of worker threads, i.e. the concurrency cap.
    pub worker_count: usize,
    /// Abort a handler invocation after this many milliseconds. `None` waits forever.
    pub handler_timeout_ms: Option<u64>,
    /// Maximum time `shutdown` waits for workers to drain and exit.
    pub shutdown_timeout_ms: u64,
    /// Stack size of each worker thread.
    pub thread_stack_size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(1),
            handler_timeout_ms: Some(DEFAULT_HANDLER_TIMEOUT_MS),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        }
    }
}

impl WorkerPoolConfig {
    /// Defaults: one worker per CPU, 30 s handler timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of workers.
    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set or clear the handler timeout.
    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout_ms = timeout.map(duration_ms);
        self
    }

    /// Set the shutdown wait.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = duration_ms(timeout);
        self
    }

    /// Handler timeout as a `Duration`.
    #[must_use]
    pub const fn handler_timeout(&self) -> Option<Duration> {
        match self.handler_timeout_ms {
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        }
    }

    /// Shutdown wait as a `Duration`.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validate pool settings.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.handler_timeout_ms == Some(0) {
            return Err("handler_timeout_ms must be greater than 0 when set".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
