//! Internal metrics collection.
//!
//! Collects job metrics in-memory; exposed through the `/metrics` endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for job latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 10ms, 100ms, 500ms, 1s, 5s, 30s, 60s, 300s, 540s, beyond
    buckets: [AtomicU64; 10],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 10] =
        [10, 100, 500, 1_000, 5_000, 30_000, 60_000, 300_000, 540_000, u64::MAX];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Aggregator
    pub aggregation_runs: Counter,
    pub aggregation_failures: Counter,
    pub events_scanned: Counter,
    pub events_skipped: Counter,
    pub stats_written: Counter,
    pub stats_write_errors: Counter,

    // Purger
    pub purge_runs: Counter,
    pub purge_failures: Counter,
    pub events_purged: Counter,
    pub purge_batches: Counter,

    // Latency histograms
    pub aggregation_latency_ms: Histogram,
    pub purge_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub aggregation_runs: u64,
    pub aggregation_failures: u64,
    pub events_scanned: u64,
    pub events_skipped: u64,
    pub stats_written: u64,
    pub stats_write_errors: u64,
    pub purge_runs: u64,
    pub purge_failures: u64,
    pub events_purged: u64,
    pub purge_batches: u64,
    pub aggregation_latency_mean_ms: f64,
    pub purge_latency_mean_ms: f64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            aggregation_runs: self.aggregation_runs.get(),
            aggregation_failures: self.aggregation_failures.get(),
            events_scanned: self.events_scanned.get(),
            events_skipped: self.events_skipped.get(),
            stats_written: self.stats_written.get(),
            stats_write_errors: self.stats_write_errors.get(),
            purge_runs: self.purge_runs.get(),
            purge_failures: self.purge_failures.get(),
            events_purged: self.events_purged.get(),
            purge_batches: self.purge_batches.get(),
            aggregation_latency_mean_ms: self.aggregation_latency_ms.mean(),
            purge_latency_mean_ms: self.purge_latency_ms.mean(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
