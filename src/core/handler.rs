//! Category handler abstraction and the per-category registry.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::HandlerError;

/// A downstream integration invoked for every message of one category.
///
/// The dispatcher carries no integration-specific knowledge: chat, email,
/// webhook and time-series senders are all registered as handlers.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use status_ingest::core::{CategoryHandler, HandlerError};
///
/// struct WebhookHandler { url: String }
///
/// #[async_trait]
/// impl CategoryHandler for WebhookHandler {
///     async fn handle(&self, fields: &[String]) -> Result<(), HandlerError> {
///         post_json(&self.url, fields).await.map_err(|e| HandlerError::failed(e.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait CategoryHandler: Send + Sync + 'static {
    /// Process one message.
    ///
    /// `fields` holds every sanitized field, the category tag first.
    ///
    /// # Threading
    ///
    /// Called from a dedicated worker thread inside that worker's
    /// single-threaded tokio runtime. At most one call per worker is in
    /// progress at a time.
    async fn handle(&self, fields: &[String]) -> Result<(), HandlerError>;
}

/// Adapter turning an async closure into a [`CategoryHandler`].
pub struct FnHandler<F> {
    f: F,
}

/// Build a handler from `f`, which receives an owned copy of the fields.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> CategoryHandler for FnHandler<F>
where
    F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, fields: &[String]) -> Result<(), HandlerError> {
        (self.f)(fields.to_vec()).await
    }
}

/// One handler per category, resolved by the dispatcher.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn CategoryHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `category`, replacing any previous one.
    pub fn register(&mut self, category: impl Into<String>, handler: Arc<dyn CategoryHandler>) {
        self.handlers.insert(category.into(), handler);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with_handler(
        mut self,
        category: impl Into<String>,
        handler: impl CategoryHandler,
    ) -> Self {
        self.register(category, Arc::new(handler));
        self
    }

    /// Handler for `category`.
    #[must_use]
    pub fn get(&self, category: &str) -> Option<Arc<dyn CategoryHandler>> {
        self.handlers.get(category).cloned()
    }

    /// Whether a handler exists for `category`.
    #[must_use]
    pub fn contains(&self, category: &str) -> bool {
        self.handlers.contains_key(category)
    }

    /// Registered categories.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut categories: Vec<_> = self.categories().collect();
        categories.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("categories", &categories)
            .finish()
    }
}
