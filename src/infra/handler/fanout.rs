//! Handler that forwards one message to several handlers in order.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::core::{CategoryHandler, HandlerError};

/// Runs every inner handler, even after one fails.
///
/// The message counts as failed if any inner handler failed; the first error
/// is returned.
#[derive(Clone, Default)]
pub struct FanoutHandler {
    targets: Vec<Arc<dyn CategoryHandler>>,
}

impl FanoutHandler {
    /// Create an empty fanout. With no targets every message succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a target.
    #[must_use]
    pub fn with_target(mut self, target: impl CategoryHandler) -> Self {
        self.targets.push(Arc::new(target));
        self
    }

    /// Append a shared target.
    pub fn push(&mut self, target: Arc<dyn CategoryHandler>) {
        self.targets.push(target);
    }

    /// Number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether there are no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl std::fmt::Debug for FanoutHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutHandler")
            .field("targets", &self.targets.len())
            .finish()
    }
}

#[async_trait]
impl CategoryHandler for FanoutHandler {
    async fn handle(&self, fields: &[String]) -> Result<(), HandlerError> {
        let mut first_error = None;
        for (idx, target) in self.targets.iter().enumerate() {
            if let Err(err) = target.handle(fields).await {
                warn!(target = idx, error = %err, "fanout target failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
