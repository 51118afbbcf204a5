//! Periodic metrics export.
//!
//! An exporter receives a snapshot; only after it reports success are the
//! exported counters subtracted, so a failed export is retried with the
//! accumulated totals on the next tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::core::{AppResult, MetricsSnapshot, QueueManager};

/// Destination for periodic metrics, e.g. a time-series database writer.
#[async_trait]
pub trait MetricsExporter: Send + Sync + 'static {
    /// Publish one snapshot.
    async fn export(&self, snapshot: &MetricsSnapshot) -> AppResult<()>;
}

/// Take a snapshot, export it, and on success clear what it reported.
///
/// # Errors
///
/// Propagates the exporter's error; counters are left untouched.
pub async fn export_once(manager: &QueueManager, exporter: &dyn MetricsExporter) -> AppResult<MetricsSnapshot> {
    let snapshot = manager.get_metrics();
    exporter.export(&snapshot).await?;
    manager.clear_exported(&snapshot);
    debug!(received = snapshot.received, processed = snapshot.processed, "metrics exported");
    Ok(snapshot)
}

/// Export every `every` until `shutdown` turns true or its sender is dropped.
///
/// Must be called from within a tokio runtime.
pub fn spawn_export_loop(
    manager: Arc<QueueManager>,
    exporter: Arc<dyn MetricsExporter>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;
        info!(interval = ?every, "metrics export loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = export_once(&manager, exporter.as_ref()).await {
                        warn!(error = %e, "metrics export failed; counters kept for next attempt");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("metrics export loop stopped");
    })
}
