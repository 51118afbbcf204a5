//! Handler that writes every message to the tracing subscriber.

use async_trait::async_trait;
use tracing::info;

use crate::core::{CategoryHandler, HandlerError};

/// Logs each message's fields at `info` level. Never fails.
#[derive(Debug, Clone, Default)]
pub struct LogHandler {
    label: Option<String>,
}

impl LogHandler {
    /// Create a handler with no label.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every log line with `label`.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[async_trait]
impl CategoryHandler for LogHandler {
    async fn handle(&self, fields: &[String]) -> Result<(), HandlerError> {
        let category = fields.first().map_or("", String::as_str);
        info!(
            label = self.label.as_deref().unwrap_or("status"),
            category,
            fields = %fields.join(";"),
            "status event"
        );
        Ok(())
    }
}
