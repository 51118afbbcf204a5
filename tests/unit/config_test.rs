//! Tests for configuration validation

use std::time::Duration;

use status_ingest::config::{CategoryConfig, IngestConfig, WorkerPoolConfig, TASK_LIFECYCLE_FIELDS};

#[test]
fn test_default_config_is_valid() {
    let cfg = IngestConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.max_queue_size, 1_000);
    assert!(cfg.max_concurrent >= 1);
    assert_eq!(cfg.rate_limit_per_minute(), None);
}

#[test]
fn test_zero_queue_size_rejected() {
    assert!(IngestConfig::new().with_max_queue_size(0).validate().is_err());
}

#[test]
fn test_zero_concurrency_rejected() {
    assert!(IngestConfig::new().with_max_concurrent(0).validate().is_err());
}

#[test]
fn test_datagram_size_bounds() {
    assert!(IngestConfig::new().with_max_datagram_size(0).validate().is_err());
    assert!(IngestConfig::new().with_max_datagram_size(65_508).validate().is_err());
    assert!(IngestConfig::new().with_max_datagram_size(65_507).validate().is_ok());
}

#[test]
fn test_backpressure_threshold_bounds() {
    assert!(IngestConfig::new().with_backpressure_threshold(0.0).validate().is_err());
    assert!(IngestConfig::new().with_backpressure_threshold(1.5).validate().is_err());
    assert!(IngestConfig::new().with_backpressure_threshold(1.0).validate().is_ok());
}

#[test]
fn test_enabled_rate_limit_needs_positive_rate() {
    assert!(IngestConfig::new().with_rate_limit(Some(0)).validate().is_err());
    assert!(IngestConfig::new().with_rate_limit(Some(60)).validate().is_ok());
}

#[test]
fn test_category_validation() {
    assert!(IngestConfig::new()
        .with_category("task", CategoryConfig::new(0))
        .validate()
        .is_err());
    assert!(IngestConfig::new()
        .with_category("a;b", CategoryConfig::new(2))
        .validate()
        .is_err());

    let out_of_range = CategoryConfig {
        expected_fields: 3,
        identifier_fields: vec![3],
    };
    assert!(IngestConfig::new()
        .with_category("task", out_of_range)
        .validate()
        .is_err());
}

#[test]
fn test_category_tag_must_survive_field_sanitizing() {
    let long_tag = "t".repeat(9);
    let err = IngestConfig::new()
        .with_max_field_length(8)
        .with_category(long_tag.as_str(), CategoryConfig::new(2))
        .validate()
        .unwrap_err();
    assert!(err.contains("max_field_length"));

    assert!(IngestConfig::new()
        .with_max_field_length(8)
        .with_category("t".repeat(8), CategoryConfig::new(2))
        .validate()
        .is_ok());
    assert!(IngestConfig::new()
        .with_category(" task", CategoryConfig::new(2))
        .validate()
        .is_err());
}

#[test]
fn test_task_lifecycle_preset() {
    let preset = CategoryConfig::task_lifecycle();
    assert_eq!(preset.expected_fields, TASK_LIFECYCLE_FIELDS);
    assert_eq!(preset.identifier_fields, vec![5, 6]);
}

#[test]
fn test_from_json_str_applies_defaults() {
    let cfg = IngestConfig::from_json_str(
        r#"{
            "max_queue_size": 250,
            "max_concurrent": 2,
            "rate_limit": { "enabled": true, "max_per_minute": 600 },
            "categories": { "task": { "expected_fields": 11, "identifier_fields": [5, 6] } }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.max_queue_size, 250);
    assert_eq!(cfg.max_concurrent, 2);
    assert_eq!(cfg.rate_limit_per_minute(), Some(600));
    assert_eq!(cfg.categories["task"], CategoryConfig::task_lifecycle());
    assert!((cfg.backpressure_threshold - 0.8).abs() < f64::EPSILON);
}

#[test]
fn test_from_json_str_rejects_invalid() {
    assert!(IngestConfig::from_json_str(r#"{ "max_queue_size": 0 }"#).is_err());
    assert!(IngestConfig::from_json_str("not json").is_err());
}

#[test]
fn test_worker_pool_config_validation() {
    let valid = WorkerPoolConfig::new()
        .with_worker_count(4)
        .with_handler_timeout(Some(Duration::from_secs(1)));
    assert!(valid.validate().is_ok());
    assert_eq!(valid.handler_timeout(), Some(Duration::from_secs(1)));

    assert!(WorkerPoolConfig::new().with_worker_count(0).validate().is_err());
}
