//! Integration tests for the dispatcher WorkerPool
//!
//! These tests drive real worker threads against a real queue:
//! - Concurrency cap under blocking handlers
//! - Failure isolation (errors, panics, timeouts)
//! - Drain on shutdown
//! - Bounded shutdown with stuck handlers

use async_trait::async_trait;
use status_ingest::config::WorkerPoolConfig;
use status_ingest::core::{
    CategoryHandler, HandlerError, HandlerRegistry, MetricsAggregator, ParsedMessage,
    WorkerCounters, WorkerPool,
};
use status_ingest::core::metrics::GaugeReadings;
use status_ingest::infra::{BoundedQueue, QueueEntry};
use status_ingest::util::SystemClock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn entry(category: &str, n: u64) -> QueueEntry {
    QueueEntry::new(
        ParsedMessage {
            category: category.to_string(),
            fields: vec![category.to_string(), n.to_string()],
            received_at_ms: 0,
        },
        0,
    )
}

struct Harness {
    queue: Arc<BoundedQueue>,
    metrics: Arc<MetricsAggregator>,
    counters: Arc<WorkerCounters>,
}

impl Harness {
    fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(BoundedQueue::new(capacity, 0.8).expect("queue")),
            metrics: Arc::new(MetricsAggregator::new(Arc::new(SystemClock), 1024)),
            counters: Arc::new(WorkerCounters::new()),
        }
    }

    fn start(&self, config: WorkerPoolConfig, handlers: HandlerRegistry) -> WorkerPool {
        WorkerPool::start(
            config,
            Arc::clone(&self.queue),
            Arc::new(handlers),
            Arc::clone(&self.metrics),
            Arc::clone(&self.counters),
        )
        .expect("Failed to start pool")
    }

    fn processed(&self) -> (u64, u64, u64) {
        let snap = self.metrics.snapshot(GaugeReadings::default());
        (snap.processed, snap.successful, snap.failed)
    }
}

// ============================================================================
// TEST HANDLERS
// ============================================================================

/// Handler that tracks how many calls overlap
#[derive(Clone, Default)]
struct CountingHandler {
    execution_count: Arc<AtomicU64>,
    concurrent_count: Arc<AtomicU64>,
    max_concurrent: Arc<AtomicU64>,
}

#[async_trait]
impl CategoryHandler for CountingHandler {
    async fn handle(&self, _fields: &[String]) -> Result<(), HandlerError> {
        let current = self.concurrent_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(20)).await;

        self.concurrent_count.fetch_sub(1, Ordering::SeqCst);
        self.execution_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Handler that panics on odd payloads
struct FlakyHandler;

#[async_trait]
impl CategoryHandler for FlakyHandler {
    async fn handle(&self, fields: &[String]) -> Result<(), HandlerError> {
        let n: u64 = fields[1].parse().map_err(|_| HandlerError::failed("bad payload"))?;
        if n % 2 == 1 {
            panic!("flaky handler hit odd payload {n}");
        }
        Ok(())
    }
}

/// Handler that never finishes on its own
struct StuckHandler;

#[async_trait]
impl CategoryHandler for StuckHandler {
    async fn handle(&self, _fields: &[String]) -> Result<(), HandlerError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

/// In-flight invocations never exceed the worker count
#[test]
fn test_concurrency_capped_by_worker_count() {
    let harness = Harness::new(64);
    let handler = CountingHandler::default();
    let pool = harness.start(
        WorkerPoolConfig::new().with_worker_count(3),
        HandlerRegistry::new().with_handler("task", handler.clone()),
    );

    for n in 0..30 {
        harness.queue.enqueue(entry("task", n)).unwrap();
    }
    pool.shutdown();

    assert_eq!(handler.execution_count.load(Ordering::SeqCst), 30);
    assert!(handler.max_concurrent.load(Ordering::SeqCst) <= 3);
    assert!(harness.counters.snapshot().peak_in_flight <= 3);
    assert_eq!(harness.processed(), (30, 30, 0));
}

/// Panicking handlers are counted as failures and the worker keeps going
#[test]
fn test_panics_are_isolated() {
    let harness = Harness::new(16);
    for n in 0..10 {
        harness.queue.enqueue(entry("flaky", n)).unwrap();
    }
    let pool = harness.start(
        WorkerPoolConfig::new().with_worker_count(1),
        HandlerRegistry::new().with_handler("flaky", FlakyHandler),
    );
    pool.shutdown();

    assert_eq!(harness.processed(), (10, 5, 5));
}

/// Messages without a handler fail without stopping the pool
#[test]
fn test_unknown_category_counts_as_failure() {
    let harness = Harness::new(8);
    harness.queue.enqueue(entry("nobody", 0)).unwrap();
    harness.queue.enqueue(entry("task", 1)).unwrap();
    let pool = harness.start(
        WorkerPoolConfig::new().with_worker_count(1),
        HandlerRegistry::new().with_handler("task", CountingHandler::default()),
    );
    pool.shutdown();

    assert_eq!(harness.processed(), (2, 1, 1));
}

/// A handler past its timeout is aborted and the worker moves on
#[test]
fn test_handler_timeout_frees_worker() {
    let harness = Harness::new(8);
    let counting = CountingHandler::default();
    harness.queue.enqueue(entry("stuck", 0)).unwrap();
    harness.queue.enqueue(entry("task", 1)).unwrap();

    let started = Instant::now();
    let pool = harness.start(
        WorkerPoolConfig::new()
            .with_worker_count(1)
            .with_handler_timeout(Some(Duration::from_millis(50))),
        HandlerRegistry::new()
            .with_handler("stuck", StuckHandler)
            .with_handler("task", counting.clone()),
    );
    pool.shutdown();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(counting.execution_count.load(Ordering::SeqCst), 1);
    assert_eq!(harness.processed(), (2, 1, 1));
}

/// Shutdown returns within its timeout even if a handler never finishes
#[test]
fn test_shutdown_is_bounded() {
    let harness = Harness::new(4);
    let pool = harness.start(
        WorkerPoolConfig::new()
            .with_worker_count(1)
            .with_handler_timeout(None)
            .with_shutdown_timeout(Duration::from_millis(100)),
        HandlerRegistry::new().with_handler("stuck", StuckHandler),
    );
    harness.queue.enqueue(entry("stuck", 0)).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while harness.counters.in_flight() == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    let started = Instant::now();
    pool.shutdown();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(harness.queue.is_closed());
}
