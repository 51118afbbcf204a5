//! Build a queue manager from configuration using a handler factory.

use std::sync::Arc;

use crate::config::{CategoryConfig, IngestConfig};
use crate::core::{CategoryHandler, HandlerRegistry, IngestError, QueueManager};

/// Build a [`QueueManager`] with one handler per configured category.
///
/// `handler_factory` is called once per category, in tag order. The manager
/// is returned idle; call `start` to spawn workers.
///
/// # Errors
///
/// `IngestError::InvalidConfig` if the configuration is invalid, or whatever
/// error the factory returns.
pub fn build_manager<F>(cfg: IngestConfig, mut handler_factory: F) -> Result<QueueManager, IngestError>
where
    F: FnMut(&str, &CategoryConfig) -> Result<Arc<dyn CategoryHandler>, IngestError>,
{
    cfg.validate()
        .map_err(|e| IngestError::InvalidConfig(format!("config invalid: {e}")))?;

    let mut tags: Vec<&String> = cfg.categories.keys().collect();
    tags.sort_unstable();

    let mut handlers = HandlerRegistry::new();
    for tag in tags {
        let handler = handler_factory(tag, &cfg.categories[tag])?;
        handlers.register(tag.clone(), handler);
    }

    QueueManager::new(cfg, handlers)
}
