//! Configuration models for the ingestion pipeline and its worker pool.

pub mod ingest;
pub mod pool;

pub use ingest::{CategoryConfig, IngestConfig, RateLimitConfig, TASK_LIFECYCLE_FIELDS};
pub use pool::WorkerPoolConfig;
