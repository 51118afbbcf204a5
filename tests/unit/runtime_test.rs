//! Tests for status payloads and metrics export

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use status_ingest::config::IngestConfig;
use status_ingest::core::{AppResult, HandlerRegistry, MetricsSnapshot, QueueManager};
use status_ingest::infra::LogHandler;
use status_ingest::runtime::{export_once, health, spawn_export_loop, status, MetricsExporter};

fn manager() -> QueueManager {
    let handlers = HandlerRegistry::new()
        .with_handler("task", LogHandler::new())
        .with_handler("alert", LogHandler::new());
    QueueManager::new(IngestConfig::new().with_max_concurrent(1), handlers).unwrap()
}

/// Exporter that records what it saw and can be told to fail.
#[derive(Default)]
struct RecordingExporter {
    fail: AtomicBool,
    exported: Mutex<Vec<MetricsSnapshot>>,
    calls: AtomicUsize,
}

#[async_trait]
impl MetricsExporter for RecordingExporter {
    async fn export(&self, snapshot: &MetricsSnapshot) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("time-series database unreachable");
        }
        self.exported.lock().push(snapshot.clone());
        Ok(())
    }
}

#[test]
fn test_health_payload() {
    assert!(health().ok);
}

#[test]
fn test_status_payload_reports_without_resetting() {
    let m = manager();
    m.enqueue(b"task;x", 2);
    m.enqueue(b"", 2);

    let report = status(&m);
    assert!(!report.running);
    assert_eq!(report.categories, vec!["alert".to_string(), "task".to_string()]);
    assert_eq!(report.metrics.received, 2);
    assert_eq!(report.metrics.queued, 1);
    assert_eq!(report.metrics.dropped_size, 1);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["metrics"]["queue_size"], 1);

    assert_eq!(m.get_metrics().received, 2);
}

#[tokio::test]
async fn test_export_once_clears_only_on_success() {
    let m = manager();
    let exporter = RecordingExporter::default();
    m.enqueue(b"task;x", 2);

    exporter.fail.store(true, Ordering::SeqCst);
    assert!(export_once(&m, &exporter).await.is_err());
    assert_eq!(m.get_metrics().received, 1);

    m.enqueue(b"task;y", 2);
    exporter.fail.store(false, Ordering::SeqCst);
    let exported = export_once(&m, &exporter).await.unwrap();
    assert_eq!(exported.received, 2);
    assert_eq!(exported.queued, 2);

    let after = m.get_metrics();
    assert_eq!(after.received, 0);
    assert_eq!(after.queued, 0);
    // gauges are live values, not cleared
    assert_eq!(after.queue_size, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_export_loop_runs_until_shutdown() {
    let m = Arc::new(manager());
    let exporter = Arc::new(RecordingExporter::default());
    let (tx, rx) = tokio::sync::watch::channel(false);

    let handle = spawn_export_loop(
        Arc::clone(&m),
        Arc::clone(&exporter) as Arc<dyn MetricsExporter>,
        Duration::from_millis(20),
        rx,
    );
    m.enqueue(b"task;x", 2);
    tokio::time::sleep(Duration::from_millis(150)).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("export loop exits")
        .unwrap();

    assert!(exporter.calls.load(Ordering::SeqCst) >= 2);
    let total: u64 = exporter.exported.lock().iter().map(|s| s.received).sum();
    assert_eq!(total, 1);
}
