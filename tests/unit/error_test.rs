//! Tests for error types

use status_ingest::core::{HandlerError, IngestError};

#[test]
fn test_invalid_config_error() {
    let err = IngestError::InvalidConfig("max_queue_size must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: max_queue_size must be greater than 0"
    );
}

#[test]
fn test_lifecycle_errors() {
    assert_eq!(format!("{}", IngestError::AlreadyRunning), "worker pool already running");
    assert_eq!(format!("{}", IngestError::Stopped), "queue manager has been stopped");
}

#[test]
fn test_handler_errors() {
    assert_eq!(format!("{}", HandlerError::failed("smtp down")), "handler failed: smtp down");
    assert_eq!(
        format!("{}", HandlerError::UnknownCategory("job".into())),
        "no handler registered for category `job`"
    );
    assert_eq!(format!("{}", HandlerError::Timeout(250)), "handler timed out after 250 ms");
    assert_eq!(format!("{}", HandlerError::Panicked), "handler panicked");
}

#[test]
fn test_handler_error_from_anyhow_keeps_context() {
    let err = anyhow::anyhow!("connection refused").context("posting webhook");
    let handler_err: HandlerError = err.into();
    assert_eq!(
        format!("{}", handler_err),
        "handler failed: posting webhook: connection refused"
    );
}
