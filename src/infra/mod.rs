//! Infrastructure adapters: the in-memory queue and generic category handlers.

pub mod handler;
pub mod queue;

pub use handler::{FanoutHandler, LogHandler};
pub use queue::{BoundedQueue, EnqueueError, QueueEntry};
