//! Metrics aggregation: cumulative counters, sliding windows, latency percentiles.
//!
//! All mutable state lives behind one `parking_lot::Mutex`. Producers and
//! workers hold it for a handful of integer updates, which keeps snapshots
//! self-consistent (`received == queued + dropped_total` holds in every
//! snapshot) and lets `clear` swap the cumulative family in one step.
//!
//! Gauges are not stored here. The owner reads them from the live components
//! and passes them to [`MetricsAggregator::snapshot`].

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::admission::DropReason;
use crate::core::worker_pool::ProcessingOutcome;
use crate::util::clock::SharedClock;

/// Buckets per sliding window.
const WINDOW_BUCKETS: usize = 60;
const SECOND_MS: u64 = 1_000;
const MINUTE_MS: u64 = 60_000;

/// Default capacity of the latency sample ring.
pub const DEFAULT_LATENCY_SAMPLES: usize = 1024;

/// Fixed ring of time-stamped counters.
///
/// Each bucket remembers the absolute slot it was last written for, so reads
/// can skip stale buckets without mutating anything.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    bucket_ms: u64,
    slots: Vec<u64>,
    counts: Vec<u64>,
}

impl SlidingWindow {
    /// Create a window of `buckets` buckets, each `bucket_ms` wide.
    #[must_use]
    pub fn new(buckets: usize, bucket_ms: u64) -> Self {
        Self {
            bucket_ms: bucket_ms.max(1),
            slots: vec![u64::MAX; buckets.max(1)],
            counts: vec![0; buckets.max(1)],
        }
    }

    /// Sixty one-second buckets.
    #[must_use]
    pub fn last_minute() -> Self {
        Self::new(WINDOW_BUCKETS, SECOND_MS)
    }

    /// Sixty one-minute buckets.
    #[must_use]
    pub fn last_hour() -> Self {
        Self::new(WINDOW_BUCKETS, MINUTE_MS)
    }

    /// Add one event at `now_ms`.
    pub fn record(&mut self, now_ms: u64) {
        let slot = now_ms / self.bucket_ms;
        let idx = self.index(slot);
        if self.slots[idx] != slot {
            self.slots[idx] = slot;
            self.counts[idx] = 0;
        }
        self.counts[idx] += 1;
    }

    /// Events recorded within the trailing window ending at `now_ms`.
    #[must_use]
    pub fn total(&self, now_ms: u64) -> u64 {
        let current = now_ms / self.bucket_ms;
        let span = self.slots.len() as u64;
        self.slots
            .iter()
            .zip(&self.counts)
            .filter(|(slot, _)| **slot <= current && current - **slot < span)
            .map(|(_, count)| *count)
            .sum()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn index(&self, slot: u64) -> usize {
        (slot % self.slots.len() as u64) as usize
    }
}

/// Bounded latency estimator.
///
/// Keeps an exact running sum, count and max, plus a ring of the most recent
/// samples from which percentiles are read.
#[derive(Debug, Clone)]
pub struct LatencyReservoir {
    samples: Vec<u64>,
    capacity: usize,
    next: usize,
    count: u64,
    sum_us: u64,
    max_us: u64,
}

impl LatencyReservoir {
    /// Create a reservoir holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            next: 0,
            count: 0,
            sum_us: 0,
            max_us: 0,
        }
    }

    /// Record one duration.
    pub fn record(&mut self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        if self.samples.len() < self.capacity {
            self.samples.push(us);
        } else {
            self.samples[self.next] = us;
        }
        self.next = (self.next + 1) % self.capacity;
        self.count += 1;
        self.sum_us = self.sum_us.saturating_add(us);
        self.max_us = self.max_us.max(us);
    }

    /// Drop every sample.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.next = 0;
        self.count = 0;
        self.sum_us = 0;
        self.max_us = 0;
    }

    /// Number of durations recorded since the last reset.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Average, p95, p99 and max in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(&self) -> LatencySummary {
        if self.count == 0 {
            return LatencySummary::default();
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        LatencySummary {
            avg_ms: self.sum_us as f64 / self.count as f64 / 1_000.0,
            p95_ms: percentile(&sorted, 95) as f64 / 1_000.0,
            p99_ms: percentile(&sorted, 99) as f64 / 1_000.0,
            max_ms: self.max_us as f64 / 1_000.0,
        }
    }
}

/// Nearest-rank percentile over an ascending slice.
fn percentile(sorted: &[u64], pct: usize) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}

/// Latency figures in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencySummary {
    /// Mean duration.
    pub avg_ms: f64,
    /// 95th percentile.
    pub p95_ms: f64,
    /// 99th percentile.
    pub p99_ms: f64,
    /// Longest duration.
    pub max_ms: f64,
}

/// Counters reset by a flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cumulative {
    received: u64,
    queued: u64,
    processed: u64,
    successful: u64,
    failed: u64,
    dropped_size: u64,
    dropped_malformed: u64,
    dropped_rate_limit: u64,
    dropped_queue_full: u64,
}

impl Cumulative {
    const fn dropped_total(&self) -> u64 {
        self.dropped_size + self.dropped_malformed + self.dropped_rate_limit + self.dropped_queue_full
    }

    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::Oversized => self.dropped_size += 1,
            DropReason::MalformedEncoding
            | DropReason::FieldCountMismatch
            | DropReason::InvalidIdentifier => self.dropped_malformed += 1,
            DropReason::RateLimited => self.dropped_rate_limit += 1,
            DropReason::QueueFull => self.dropped_queue_full += 1,
        }
    }
}

struct MetricsState {
    cumulative: Cumulative,
    period_started_ms: u64,
    received_minute: SlidingWindow,
    received_hour: SlidingWindow,
    processed_minute: SlidingWindow,
    processed_hour: SlidingWindow,
    latency: LatencyReservoir,
}

/// Point-in-time gauge readings supplied by the manager.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GaugeReadings {
    /// Entries currently buffered.
    pub queue_size: usize,
    /// Queue capacity.
    pub queue_capacity: usize,
    /// Handler invocations in progress.
    pub in_flight: usize,
    /// Worker count.
    pub max_concurrent: usize,
    /// Admissions in the current rate window.
    pub current_rate: u32,
    /// Configured admissions per minute, zero when limiting is disabled.
    pub rate_limit_per_minute: u32,
    /// Advisory backpressure flag.
    pub backpressure_active: bool,
}

/// Immutable copy of every metric, safe to hand to exporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Entries currently buffered.
    pub queue_size: usize,
    /// Queue capacity.
    pub queue_capacity: usize,
    /// `100 * queue_size / queue_capacity`.
    pub utilization_pct: f64,
    /// Handler invocations in progress.
    pub in_flight: usize,
    /// Worker count.
    pub max_concurrent: usize,
    /// Admissions in the current rate window.
    pub current_rate: u32,
    /// Configured admissions per minute, zero when limiting is disabled.
    pub rate_limit_per_minute: u32,
    /// Utilization has reached the configured threshold.
    pub backpressure_active: bool,

    /// Datagrams seen since the last flush.
    pub received: u64,
    /// Datagrams placed on the queue.
    pub queued: u64,
    /// Handler invocations finished.
    pub processed: u64,
    /// Invocations that returned `Ok`.
    pub successful: u64,
    /// Invocations that failed, panicked or timed out.
    pub failed: u64,
    /// Sum of every drop counter.
    pub dropped_total: u64,
    /// Dropped as empty or oversized.
    pub dropped_size: u64,
    /// Dropped for bad encoding, field count or identifier shape.
    pub dropped_malformed: u64,
    /// Dropped by the rate limiter.
    pub dropped_rate_limit: u64,
    /// Dropped because the queue was full.
    pub dropped_queue_full: u64,

    /// Datagrams received in the trailing minute.
    pub received_last_minute: u64,
    /// Datagrams received in the trailing hour.
    pub received_last_hour: u64,
    /// Invocations finished in the trailing minute.
    pub processed_last_minute: u64,
    /// Invocations finished in the trailing hour.
    pub processed_last_hour: u64,

    /// Mean handler latency.
    pub avg_latency_ms: f64,
    /// 95th percentile handler latency.
    pub p95_latency_ms: f64,
    /// 99th percentile handler latency.
    pub p99_latency_ms: f64,
    /// Longest handler latency.
    pub max_latency_ms: f64,

    /// Start of the current cumulative period (ms).
    pub period_started_ms: u64,
}

/// Thread-safe aggregator shared by the producer, workers and exporters.
pub struct MetricsAggregator {
    state: Mutex<MetricsState>,
    clock: SharedClock,
}

impl MetricsAggregator {
    /// Create an aggregator keeping `latency_samples` recent durations.
    #[must_use]
    pub fn new(clock: SharedClock, latency_samples: usize) -> Self {
        let now = clock.now_ms();
        Self {
            state: Mutex::new(MetricsState {
                cumulative: Cumulative::default(),
                period_started_ms: now,
                received_minute: SlidingWindow::last_minute(),
                received_hour: SlidingWindow::last_hour(),
                processed_minute: SlidingWindow::last_minute(),
                processed_hour: SlidingWindow::last_hour(),
                latency: LatencyReservoir::new(latency_samples),
            }),
            clock,
        }
    }

    /// Count one received datagram that was rejected for `reason`.
    pub fn record_rejected(&self, reason: DropReason) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        Self::bump_received(&mut state, now);
        state.cumulative.record_drop(reason);
    }

    /// Count one received datagram that reached the queue.
    pub fn record_queued(&self) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        Self::bump_received(&mut state, now);
        state.cumulative.queued += 1;
    }

    /// Count one finished handler invocation.
    pub fn record_processed(&self, outcome: ProcessingOutcome) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        let cumulative = &mut state.cumulative;
        cumulative.processed += 1;
        if outcome.is_success() {
            cumulative.successful += 1;
        } else {
            cumulative.failed += 1;
        }
        state.processed_minute.record(now);
        state.processed_hour.record(now);
        state.latency.record(outcome.elapsed());
    }

    fn bump_received(state: &mut MetricsState, now: u64) {
        state.cumulative.received += 1;
        state.received_minute.record(now);
        state.received_hour.record(now);
    }

    /// Copy every metric, combining stored counters with live gauges.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self, gauges: GaugeReadings) -> MetricsSnapshot {
        let now = self.clock.now_ms();
        let state = self.state.lock();
        let c = state.cumulative;
        let latency = state.latency.summary();
        let utilization_pct = if gauges.queue_capacity == 0 {
            0.0
        } else {
            (100.0 * gauges.queue_size as f64 / gauges.queue_capacity as f64).clamp(0.0, 100.0)
        };

        MetricsSnapshot {
            queue_size: gauges.queue_size,
            queue_capacity: gauges.queue_capacity,
            utilization_pct,
            in_flight: gauges.in_flight,
            max_concurrent: gauges.max_concurrent,
            current_rate: gauges.current_rate,
            rate_limit_per_minute: gauges.rate_limit_per_minute,
            backpressure_active: gauges.backpressure_active,
            received: c.received,
            queued: c.queued,
            processed: c.processed,
            successful: c.successful,
            failed: c.failed,
            dropped_total: c.dropped_total(),
            dropped_size: c.dropped_size,
            dropped_malformed: c.dropped_malformed,
            dropped_rate_limit: c.dropped_rate_limit,
            dropped_queue_full: c.dropped_queue_full,
            received_last_minute: state.received_minute.total(now),
            received_last_hour: state.received_hour.total(now),
            processed_last_minute: state.processed_minute.total(now),
            processed_last_hour: state.processed_hour.total(now),
            avg_latency_ms: latency.avg_ms,
            p95_latency_ms: latency.p95_ms,
            p99_latency_ms: latency.p99_ms,
            max_latency_ms: latency.max_ms,
            period_started_ms: state.period_started_ms,
        }
    }

    /// Reset the cumulative-since-flush family and the latency reservoir.
    ///
    /// Gauges and sliding windows are untouched. Increments that win the lock
    /// before this call belong to the closed period, the rest to the new one.
    pub fn clear(&self) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        state.cumulative = Cumulative::default();
        state.latency.reset();
        state.period_started_ms = now;
    }

    /// Subtract what `exported` reported from the cumulative family.
    ///
    /// Anything recorded after `exported` was taken stays counted for the next
    /// period. The latency reservoir is reset since samples cannot be
    /// subtracted.
    pub fn clear_exported(&self, exported: &MetricsSnapshot) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        let c = &mut state.cumulative;
        c.received = c.received.saturating_sub(exported.received);
        c.queued = c.queued.saturating_sub(exported.queued);
        c.processed = c.processed.saturating_sub(exported.processed);
        c.successful = c.successful.saturating_sub(exported.successful);
        c.failed = c.failed.saturating_sub(exported.failed);
        c.dropped_size = c.dropped_size.saturating_sub(exported.dropped_size);
        c.dropped_malformed = c.dropped_malformed.saturating_sub(exported.dropped_malformed);
        c.dropped_rate_limit = c.dropped_rate_limit.saturating_sub(exported.dropped_rate_limit);
        c.dropped_queue_full = c.dropped_queue_full.saturating_sub(exported.dropped_queue_full);
        state.latency.reset();
        state.period_started_ms = now;
    }
}

impl std::fmt::Debug for MetricsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsAggregator")
            .field("cumulative", &self.state.lock().cumulative)
            .finish_non_exhaustive()
    }
}
