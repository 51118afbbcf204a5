//! Core pipeline: admission, rate limiting, dispatch, metrics, and the manager facade.

pub mod admission;
pub mod error;
pub mod handler;
pub mod manager;
pub mod metrics;
pub mod rate_limiter;
pub mod worker_pool;

pub use admission::{Admission, AdmissionGate, AdmissionPolicy, DropReason, FieldShape, ParsedMessage};
pub use error::{AppResult, HandlerError, IngestError};
pub use handler::{handler_fn, CategoryHandler, FnHandler, HandlerRegistry};
pub use manager::{Disposition, QueueManager};
pub use metrics::{GaugeReadings, MetricsAggregator, MetricsSnapshot};
pub use rate_limiter::RateLimiter;
pub use worker_pool::{PoolStats, ProcessingOutcome, WorkerCounters, WorkerPool};
