//! Request latency and pipeline metrics.
//!
//! Requests push latencies into [`LatencyRecorder`] and
//! [`KeyedLatencyRecorder`] sinks. The in-process summaries here back those
//! traits and export a Prometheus-style text rendering.
//!
//! Metric names:
//! - request.*_latency_ms  (summaries)
//! - request.stale_dropped_total, request.must_drop_total,
//!   request.throttled_total, request.large_rejected_total (counters)

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Sink for a single latency metric.
pub trait LatencyRecorder: Send + Sync {
    /// Record one latency sample.
    fn add(&self, latency: Duration);
}

/// Sink for a family of latency metrics distinguished by key.
pub trait KeyedLatencyRecorder: Send + Sync {
    /// Record one latency sample under `key`.
    fn add(&self, key: &str, latency: Duration);
}

/// Metric names.
pub mod metrics {
    /// Time from proposal to local commit.
    pub const COMMIT_LATENCY: &str = "request.commit_latency_ms";
    /// Time from proposal to apply, keyed by learner type.
    pub const PROPAGATION_LATENCY: &str = "request.propagation_latency_ms";
    /// Time spent in the prep stage queue.
    pub const PREP_QUEUE_TIME: &str = "request.prep_queue_time_ms";
    /// Time spent in the commit processor queue.
    pub const COMMIT_QUEUE_TIME: &str = "request.commit_queue_time_ms";
    /// Time spent in the sync queue.
    pub const SYNC_QUEUE_TIME: &str = "request.sync_queue_time_ms";
    /// Requests abandoned because they went stale.
    pub const STALE_DROPPED_TOTAL: &str = "request.stale_dropped_total";
    /// Requests abandoned to preserve connection ordering.
    pub const MUST_DROP_TOTAL: &str = "request.must_drop_total";
    /// Requests held back by admission control.
    pub const THROTTLED_TOTAL: &str = "request.throttled_total";
    /// Large requests rejected for exceeding the in-flight byte budget.
    pub const LARGE_REJECTED_TOTAL: &str = "request.large_rejected_total";
}

/// Count, sum, min and max of latency samples in milliseconds.
#[derive(Debug)]
pub struct LatencySummary {
    count: AtomicU64,
    sum_ms: AtomicU64,
    min_ms: AtomicU64,
    max_ms: AtomicU64,
}

/// Point-in-time view of a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummarySnapshot {
    pub count: u64,
    pub sum_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
}

impl SummarySnapshot {
    /// Mean sample in milliseconds.
    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_ms as f64 / self.count as f64
        }
    }
}

impl LatencySummary {
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum_ms: AtomicU64::new(0),
            min_ms: AtomicU64::new(u64::MAX),
            max_ms: AtomicU64::new(0),
        }
    }

    /// Record a sample in milliseconds.
    pub fn observe_ms(&self, ms: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(ms, Ordering::Relaxed);
        self.min_ms.fetch_min(ms, Ordering::Relaxed);
        self.max_ms.fetch_max(ms, Ordering::Relaxed);
    }

    /// Current values.
    pub fn snapshot(&self) -> SummarySnapshot {
        let count = self.count.load(Ordering::Relaxed);
        SummarySnapshot {
            count,
            sum_ms: self.sum_ms.load(Ordering::Relaxed),
            min_ms: if count == 0 {
                0
            } else {
                self.min_ms.load(Ordering::Relaxed)
            },
            max_ms: self.max_ms.load(Ordering::Relaxed),
        }
    }
}

impl Default for LatencySummary {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyRecorder for LatencySummary {
    fn add(&self, latency: Duration) {
        self.observe_ms(latency.as_millis() as u64);
    }
}

/// Summaries keyed by label value.
#[derive(Debug, Default)]
pub struct LatencySummarySet {
    summaries: RwLock<BTreeMap<String, LatencySummary>>,
}

impl LatencySummarySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot for one key.
    pub fn get(&self, key: &str) -> Option<SummarySnapshot> {
        self.summaries.read().get(key).map(LatencySummary::snapshot)
    }

    /// Snapshots for every key, sorted.
    pub fn snapshots(&self) -> Vec<(String, SummarySnapshot)> {
        self.summaries
            .read()
            .iter()
            .map(|(key, summary)| (key.clone(), summary.snapshot()))
            .collect()
    }
}

impl KeyedLatencyRecorder for LatencySummarySet {
    fn add(&self, key: &str, latency: Duration) {
        let ms = latency.as_millis() as u64;
        {
            let summaries = self.summaries.read();
            if let Some(summary) = summaries.get(key) {
                summary.observe_ms(ms);
                return;
            }
        }
        self.summaries
            .write()
            .entry(key.to_string())
            .or_default()
            .observe_ms(ms);
    }
}

/// Metrics shared by the request pipeline.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    /// Proposal-to-commit latency.
    pub commit_latency: LatencySummary,
    /// Proposal-to-apply latency keyed by learner type.
    pub propagation_latency: LatencySummarySet,
    /// Prep stage queue time.
    pub prep_queue_time: LatencySummary,
    /// Commit processor queue time.
    pub commit_queue_time: LatencySummary,
    /// Sync queue time.
    pub sync_queue_time: LatencySummary,
    stale_dropped: AtomicU64,
    must_drop: AtomicU64,
    throttled: AtomicU64,
    large_rejected: AtomicU64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request abandoned as stale.
    pub fn inc_stale_dropped(&self) {
        self.stale_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request abandoned to preserve ordering.
    pub fn inc_must_drop(&self) {
        self.must_drop.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a throttled request.
    pub fn inc_throttled(&self) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected large request.
    pub fn inc_large_rejected(&self) {
        self.large_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stale_dropped(&self) -> u64 {
        self.stale_dropped.load(Ordering::Relaxed)
    }

    pub fn must_drop(&self) -> u64 {
        self.must_drop.load(Ordering::Relaxed)
    }

    pub fn throttled(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }

    pub fn large_rejected(&self) -> u64 {
        self.large_rejected.load(Ordering::Relaxed)
    }

    /// Export metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let mut output = String::new();

        let counters = [
            (metrics::STALE_DROPPED_TOTAL, self.stale_dropped()),
            (metrics::MUST_DROP_TOTAL, self.must_drop()),
            (metrics::THROTTLED_TOTAL, self.throttled()),
            (metrics::LARGE_REJECTED_TOTAL, self.large_rejected()),
        ];
        for (name, value) in counters {
            let name = prometheus_name(name);
            output.push_str(&format!("# TYPE {} counter\n{} {}\n", name, name, value));
        }

        let summaries = [
            (metrics::COMMIT_LATENCY, self.commit_latency.snapshot()),
            (metrics::PREP_QUEUE_TIME, self.prep_queue_time.snapshot()),
            (metrics::COMMIT_QUEUE_TIME, self.commit_queue_time.snapshot()),
            (metrics::SYNC_QUEUE_TIME, self.sync_queue_time.snapshot()),
        ];
        for (name, snapshot) in summaries {
            render_summary(&mut output, &prometheus_name(name), None, &snapshot);
        }

        let name = prometheus_name(metrics::PROPAGATION_LATENCY);
        for (key, snapshot) in self.propagation_latency.snapshots() {
            render_summary(&mut output, &name, Some(&key), &snapshot);
        }

        output
    }
}

fn prometheus_name(name: &str) -> String {
    name.replace('.', "_")
}

fn render_summary(output: &mut String, name: &str, key: Option<&str>, s: &SummarySnapshot) {
    let labels = key
        .map(|k| format!("{{key=\"{}\"}}", k))
        .unwrap_or_default();
    output.push_str(&format!("# TYPE {} summary\n", name));
    output.push_str(&format!("{}_count{} {}\n", name, labels, s.count));
    output.push_str(&format!("{}_sum{} {}\n", name, labels, s.sum_ms));
    output.push_str(&format!("{}_min{} {}\n", name, labels, s.min_ms));
    output.push_str(&format!("{}_max{} {}\n", name, labels, s.max_ms));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_tracks_count_sum_min_max() {
        let summary = LatencySummary::new();
        assert_eq!(summary.snapshot(), SummarySnapshot::default());

        LatencyRecorder::add(&summary, Duration::from_millis(10));
        LatencyRecorder::add(&summary, Duration::from_millis(30));
        LatencyRecorder::add(&summary, Duration::from_millis(20));

        let snapshot = summary.snapshot();
        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.sum_ms, 60);
        assert_eq!(snapshot.min_ms, 10);
        assert_eq!(snapshot.max_ms, 30);
        assert_eq!(snapshot.mean_ms(), 20.0);
    }

    #[test]
    fn summary_set_separates_keys() {
        let set = LatencySummarySet::new();
        set.add("follower", Duration::from_millis(5));
        set.add("observer", Duration::from_millis(7));
        set.add("follower", Duration::from_millis(9));

        assert_eq!(set.get("follower").unwrap().count, 2);
        assert_eq!(set.get("observer").unwrap().sum_ms, 7);
        assert!(set.get("leader").is_none());
        assert_eq!(set.snapshots().len(), 2);
    }

    #[test]
    fn render_includes_counters_and_keyed_summaries() {
        let metrics = RequestMetrics::new();
        metrics.inc_stale_dropped();
        metrics.inc_must_drop();
        metrics.inc_must_drop();
        metrics.propagation_latency.add("follower", Duration::from_millis(3));

        let text = metrics.render();
        assert!(text.contains("request_stale_dropped_total 1"));
        assert!(text.contains("request_must_drop_total 2"));
        assert!(text.contains("request_propagation_latency_ms_count{key=\"follower\"} 1"));
    }
}
