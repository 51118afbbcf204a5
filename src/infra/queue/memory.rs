//! In-memory bounded FIFO queue shared by the producer and the workers.
//!
//! Backed by a bounded `crossbeam-channel`: enqueue never blocks (a full
//! channel is reported immediately) and dequeue parks the worker thread until
//! an entry arrives or the queue is closed and drained.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::core::admission::ParsedMessage;
use crate::core::IngestError;

/// A queued message.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Correlation id for log lines about this message.
    pub id: Uuid,
    /// The admitted message.
    pub message: ParsedMessage,
    /// Time the entry was placed on the queue (ms).
    pub enqueued_at_ms: u64,
}

impl QueueEntry {
    /// Wrap a message for queuing.
    #[must_use]
    pub fn new(message: ParsedMessage, enqueued_at_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
            enqueued_at_ms,
        }
    }
}

/// Why an entry was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// The queue is at capacity.
    #[error("queue is full")]
    Full,
    /// The queue was closed for shutdown.
    #[error("queue is closed")]
    Closed,
}

/// Fixed-capacity FIFO buffer.
pub struct BoundedQueue {
    /// Sender side. `None` once closed; dropping it lets workers drain and exit.
    tx: RwLock<Option<Sender<QueueEntry>>>,
    rx: Receiver<QueueEntry>,
    capacity: usize,
    backpressure_threshold: f64,
}

impl BoundedQueue {
    /// Create a queue holding at most `capacity` entries.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::InvalidConfig` for a zero capacity or a threshold
    /// outside `(0, 1]`.
    pub fn new(capacity: usize, backpressure_threshold: f64) -> Result<Self, IngestError> {
        if capacity == 0 {
            return Err(IngestError::InvalidConfig(
                "queue capacity must be greater than 0".into(),
            ));
        }
        if !(backpressure_threshold > 0.0 && backpressure_threshold <= 1.0) {
            return Err(IngestError::InvalidConfig(format!(
                "backpressure threshold must be in (0, 1], got {backpressure_threshold}"
            )));
        }
        let (tx, rx) = bounded(capacity);
        Ok(Self {
            tx: RwLock::new(Some(tx)),
            rx,
            capacity,
            backpressure_threshold,
        })
    }

    /// Add an entry without blocking.
    ///
    /// # Errors
    ///
    /// `EnqueueError::Full` at capacity, `EnqueueError::Closed` after `close`.
    pub fn enqueue(&self, entry: QueueEntry) -> Result<(), EnqueueError> {
        let tx = self.tx.read();
        let Some(tx) = tx.as_ref() else {
            return Err(EnqueueError::Closed);
        };
        match tx.try_send(entry) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(EnqueueError::Full),
            Err(TrySendError::Disconnected(_)) => Err(EnqueueError::Closed),
        }
    }

    /// Take the oldest entry, parking the calling thread until one exists.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub fn dequeue(&self) -> Option<QueueEntry> {
        self.rx.recv().ok()
    }

    /// Take the oldest entry if one is immediately available.
    pub fn try_dequeue(&self) -> Option<QueueEntry> {
        self.rx.try_recv().ok()
    }

    /// Refuse further entries. Buffered entries stay available to `dequeue`.
    pub fn close(&self) {
        self.tx.write().take();
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.read().is_none()
    }

    /// Entries currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Maximum number of buffered entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Occupancy as a fraction of capacity.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        (self.len() as f64 / self.capacity as f64).min(1.0)
    }

    /// Occupancy has reached the backpressure threshold. Advisory only.
    #[must_use]
    pub fn backpressure_active(&self) -> bool {
        self.utilization() >= self.backpressure_threshold
    }
}

impl std::fmt::Debug for BoundedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
