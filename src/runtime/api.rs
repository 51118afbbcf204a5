//! API-facing response models for an HTTP status endpoint.

use serde::{Deserialize, Serialize};

use crate::core::{MetricsSnapshot, PoolStats, QueueManager};

/// Worker activity as reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    /// Worker threads running.
    pub worker_count: usize,
    /// Invocations in progress.
    pub in_flight: usize,
    /// Highest in-flight count seen.
    pub peak_in_flight: usize,
}

impl From<PoolStats> for WorkerStatus {
    fn from(stats: PoolStats) -> Self {
        Self {
            worker_count: stats.worker_count,
            in_flight: stats.in_flight,
            peak_in_flight: stats.peak_in_flight,
        }
    }
}

/// Status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Workers are running.
    pub running: bool,
    /// Registered handler categories, sorted.
    pub categories: Vec<String>,
    /// Worker activity.
    pub workers: WorkerStatus,
    /// Current metrics.
    pub metrics: MetricsSnapshot,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
}

/// Build a status payload. Reading it does not reset any counter.
pub fn status(manager: &QueueManager) -> StatusResponse {
    StatusResponse {
        running: manager.is_running(),
        categories: {
            let mut categories: Vec<String> =
                manager.handlers().categories().map(str::to_owned).collect();
            categories.sort_unstable();
            categories
        },
        workers: manager.worker_stats().into(),
        metrics: manager.get_metrics(),
    }
}

/// Return a health payload.
pub fn health() -> Health {
    Health { ok: true }
}
