//! Tests for builder modules

use std::sync::Arc;

use status_ingest::builders::build_manager;
use status_ingest::config::{CategoryConfig, IngestConfig};
use status_ingest::core::{CategoryHandler, IngestError};
use status_ingest::infra::LogHandler;

fn config() -> IngestConfig {
    IngestConfig::new()
        .with_max_concurrent(1)
        .with_category("task", CategoryConfig::task_lifecycle())
        .with_category("alert", CategoryConfig::new(3))
}

#[test]
fn test_build_manager_registers_every_category() {
    let mut seen = Vec::new();
    let manager = build_manager(config(), |tag, category| {
        seen.push((tag.to_string(), category.expected_fields));
        Ok(Arc::new(LogHandler::new().with_label(tag)) as Arc<dyn CategoryHandler>)
    })
    .unwrap();

    assert_eq!(seen, vec![("alert".to_string(), 3), ("task".to_string(), 11)]);
    assert!(manager.handlers().contains("task"));
    assert!(manager.handlers().contains("alert"));
    assert!(!manager.is_running());
}

#[test]
fn test_build_manager_propagates_factory_error() {
    let result = build_manager(config(), |tag, _| {
        if tag == "task" {
            Err(IngestError::InvalidConfig("no sender for task".into()))
        } else {
            Ok(Arc::new(LogHandler::new()) as Arc<dyn CategoryHandler>)
        }
    });
    assert!(matches!(result, Err(IngestError::InvalidConfig(m)) if m == "no sender for task"));
}

#[test]
fn test_build_manager_rejects_invalid_config() {
    let result = build_manager(IngestConfig::new().with_max_queue_size(0), |_, _| {
        Ok(Arc::new(LogHandler::new()) as Arc<dyn CategoryHandler>)
    });
    assert!(matches!(result, Err(IngestError::InvalidConfig(_))));
}
