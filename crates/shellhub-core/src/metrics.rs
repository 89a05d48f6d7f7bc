//! Metrics and observability for the Shellhub daemon.
//!
//! Request tracking, latency measurement, cache effectiveness and scan
//! throughput.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Atomic metrics for daemon performance tracking.
pub struct Metrics {
    /// Total number of requests processed
    pub requests_total: AtomicU64,
    /// Sum of all request latencies in microseconds
    pub requests_latency_us: AtomicU64,
    /// Content cache hits
    pub cache_hits: AtomicU64,
    /// Content cache misses
    pub cache_misses: AtomicU64,
    /// Scans that ended without a whole-source failure
    pub scans_completed: AtomicU64,
    /// Scans that ended with a whole-source failure
    pub scans_failed: AtomicU64,
    /// Added/Changed/Removed events applied to the index
    pub events_applied: AtomicU64,
    latency: LatencyTracker,
    start_time: Instant,
}

/// Point-in-time copy of [`Metrics`], suitable for status responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub requests_total: u64,
    pub avg_latency_us: u64,
    pub cache_hit_rate: f64,
    pub scans_completed: u64,
    pub scans_failed: u64,
    pub events_applied: u64,
    /// p99 latency per request action
    #[serde(default)]
    pub p99_latency_us: BTreeMap<String, u64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            requests_latency_us: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            scans_completed: AtomicU64::new(0),
            scans_failed: AtomicU64::new(0),
            events_applied: AtomicU64::new(0),
            latency: LatencyTracker::default(),
            start_time: Instant::now(),
        }
    }

    /// Record a completed request.
    pub fn record_request(&self, latency: Duration) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.requests_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a completed request together with its action name.
    pub fn record_operation(&self, operation: &str, latency: Duration) {
        self.record_request(latency);
        self.latency.record(operation, latency);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the end of a scan.
    pub fn record_scan(&self, failed: bool) {
        if failed {
            self.scans_failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.scans_completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_event_applied(&self) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get cache hit rate (0.0 - 1.0).
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Get average request latency.
    pub fn avg_latency(&self) -> Duration {
        let total = self.requests_total.load(Ordering::Relaxed);
        let latency_us = self.requests_latency_us.load(Ordering::Relaxed);
        if total == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(latency_us / total)
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            requests_total: self.requests_total.load(Ordering::Relaxed),
            avg_latency_us: self.avg_latency().as_micros() as u64,
            cache_hit_rate: self.cache_hit_rate(),
            scans_completed: self.scans_completed.load(Ordering::Relaxed),
            scans_failed: self.scans_failed.load(Ordering::Relaxed),
            events_applied: self.events_applied.load(Ordering::Relaxed),
            p99_latency_us: self
                .latency
                .operations()
                .into_iter()
                .map(|op| {
                    let p99 = self.latency.p99(&op).as_micros() as u64;
                    (op, p99)
                })
                .collect(),
        }
    }
}

/// Tracks latency samples per operation for percentile calculation.
pub struct LatencyTracker {
    samples: RwLock<VecDeque<(String, Duration)>>,
    max_samples: usize,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: RwLock::new(VecDeque::with_capacity(max_samples)),
            max_samples,
        }
    }

    /// Record a latency sample for an operation.
    pub fn record(&self, operation: &str, duration: Duration) {
        let mut samples = self.samples.write();
        samples.push_back((operation.to_string(), duration));

        while samples.len() > self.max_samples {
            samples.pop_front();
        }
    }

    /// Operations with at least one retained sample.
    pub fn operations(&self) -> BTreeSet<String> {
        self.samples.read().iter().map(|(op, _)| op.clone()).collect()
    }

    pub fn p50(&self, operation: &str) -> Duration {
        self.percentile(operation, 0.50)
    }

    pub fn p99(&self, operation: &str) -> Duration {
        self.percentile(operation, 0.99)
    }

    pub fn percentile(&self, operation: &str, p: f64) -> Duration {
        let samples = self.samples.read();
        let mut durations: Vec<_> = samples
            .iter()
            .filter(|(op, _)| op == operation)
            .map(|(_, d)| *d)
            .collect();

        if durations.is_empty() {
            return Duration::ZERO;
        }

        durations.sort();
        let idx = ((durations.len() as f64 * p) as usize).min(durations.len() - 1);
        durations[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_request_recording() {
        let metrics = Metrics::new();
        metrics.record_request(Duration::from_millis(10));
        metrics.record_request(Duration::from_millis(20));

        assert_eq!(metrics.requests_total.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.avg_latency(), Duration::from_millis(15));
    }

    #[test]
    fn test_metrics_cache_hit_rate() {
        let metrics = Metrics::new();
        assert_eq!(metrics.cache_hit_rate(), 0.0);
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        assert!((metrics.cache_hit_rate() - 0.75).abs() < 0.01);
    }

    #[test]
    fn test_scan_counters_in_snapshot() {
        let metrics = Metrics::new();
        metrics.record_scan(false);
        metrics.record_scan(true);
        metrics.record_scan(false);
        metrics.record_event_applied();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.scans_completed, 2);
        assert_eq!(snapshot.scans_failed, 1);
        assert_eq!(snapshot.events_applied, 1);
    }

    #[test]
    fn test_operation_latency_in_snapshot() {
        let metrics = Metrics::new();
        metrics.record_operation("page", Duration::from_micros(300));
        metrics.record_operation("find", Duration::from_micros(40));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.p99_latency_us.get("page"), Some(&300));
        assert_eq!(snapshot.p99_latency_us.get("find"), Some(&40));
    }

    #[test]
    fn test_latency_tracker_percentiles() {
        let tracker = LatencyTracker::new(100);
        for i in 1..=100 {
            tracker.record("page", Duration::from_millis(i));
        }

        let p50 = tracker.p50("page");
        let p99 = tracker.p99("page");
        assert!(p50 >= Duration::from_millis(50) && p50 <= Duration::from_millis(51));
        assert!(p99 >= Duration::from_millis(99) && p99 <= Duration::from_millis(100));
        assert_eq!(tracker.p99("find"), Duration::ZERO);
    }

    #[test]
    fn test_latency_tracker_bounded() {
        let tracker = LatencyTracker::new(3);
        for i in 1..=5 {
            tracker.record("page", Duration::from_millis(i));
        }
        assert_eq!(tracker.percentile("page", 0.0), Duration::from_millis(3));
    }
}
