//! # Status Ingest
//!
//! Ingestion core for a scheduler's status-event daemon.
//!
//! Producers (typically a UDP listener) hand raw `;`-delimited datagrams to a
//! [`QueueManager`](core::QueueManager). Each datagram passes an admission gate
//! (size, encoding, field shape), an optional global rate limiter, and lands in
//! a bounded queue. A fixed pool of worker threads dispatches queued messages
//! to the [`CategoryHandler`](core::CategoryHandler) registered for their
//! category. Nothing on the producer path blocks: every overload outcome is a
//! counted drop.
//!
//! ## Key Features
//!
//! - **Non-blocking admission**: drops instead of waiting when full or limited
//! - **Bounded concurrency**: N workers, at most N handler calls in flight
//! - **Failure isolation**: handler errors, panics and timeouts are counted, never fatal
//! - **Consistent metrics**: `received == queued + dropped_total` in every snapshot
//! - **Drain on stop**: buffered messages are processed before workers exit
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use status_ingest::config::{CategoryConfig, IngestConfig};
//! use status_ingest::core::{HandlerRegistry, QueueManager};
//! use status_ingest::infra::LogHandler;
//!
//! let config = IngestConfig::new()
//!     .with_max_queue_size(1_000)
//!     .with_max_concurrent(4)
//!     .with_rate_limit(Some(6_000))
//!     .with_category("task", CategoryConfig::task_lifecycle());
//! let handlers = HandlerRegistry::new().with_handler("task", LogHandler::new());
//!
//! let manager = Arc::new(QueueManager::new(config, handlers)?);
//! manager.start()?;
//!
//! let socket = tokio::net::UdpSocket::bind("0.0.0.0:9125").await?;
//! let (_tx, rx) = tokio::sync::watch::channel(false);
//! status_ingest::runtime::serve_datagrams(socket, Arc::clone(&manager), rx).await?;
//!
//! manager.stop();
//! ```
//!
//! See `tests/queue_manager_test.rs` for end-to-end scenarios.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core pipeline: admission, rate limiting, queueing, dispatch and metrics.
pub mod core;
/// Configuration models for the pipeline and worker pool.
pub mod config;
/// Builders to construct ingestion components from configuration.
pub mod builders;
/// Infrastructure adapters: the bounded queue and generic handlers.
pub mod infra;
/// Runtime adapters: UDP listener, export loop and status payloads.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::config::{CategoryConfig, IngestConfig};
pub use crate::core::{
    CategoryHandler, Disposition, DropReason, HandlerError, HandlerRegistry, IngestError,
    MetricsSnapshot, QueueManager,
};
