//! Per-pipeline call statistics.
//!
//! # Responsibilities
//! - Count total / successful / failed calls per pipeline name
//! - Produce snapshots with a derived failure rate
//! - Feed the dashboard endpoint
//!
//! # Design Decisions
//! - Counters are monotonic for the life of the process; no reset exposed
//! - Atomic increments only; the map is sharded by name
//! - Reading an unknown name creates its (zeroed) entry
//! - Total is derived as successful + failed, so a snapshot never shows a
//!   call counted in the total but in neither outcome

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
struct Counters {
    successful: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PipelineStats {
        let successful = self.successful.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        let total_calls = successful + failed;
        PipelineStats {
            total_calls,
            successful,
            failed,
            failure_rate_percent: failure_rate(failed, total_calls),
        }
    }
}

/// Snapshot of one pipeline's counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub total_calls: u64,
    pub successful: u64,
    pub failed: u64,
    pub failure_rate_percent: f64,
}

/// Shared handle; clones see the same counters.
#[derive(Debug, Clone, Default)]
pub struct StatsTracker {
    pipelines: Arc<DashMap<String, Arc<Counters>>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self, pipeline: &str, success: bool) {
        let counters = self.counters(pipeline);
        if success {
            counters.successful.fetch_add(1, Ordering::SeqCst);
        } else {
            counters.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn get_stats(&self, pipeline: &str) -> PipelineStats {
        self.counters(pipeline).snapshot()
    }

    /// Stats for every known pipeline, keyed by name.
    pub fn dashboard(&self) -> BTreeMap<String, PipelineStats> {
        self.pipelines
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    /// Names with recorded (or read) stats, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pipelines.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn counters(&self, pipeline: &str) -> Arc<Counters> {
        if let Some(existing) = self.pipelines.get(pipeline) {
            return existing.value().clone();
        }
        self.pipelines.entry(pipeline.to_string()).or_default().value().clone()
    }
}

/// `failed / total * 100`, rounded to two decimals; 0 when nothing was recorded.
fn failure_rate(failed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = failed as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_rounded_to_two_decimals() {
        assert_eq!(failure_rate(0, 0), 0.0);
        assert_eq!(failure_rate(1, 3), 33.33);
        assert_eq!(failure_rate(2, 3), 66.67);
        assert_eq!(failure_rate(4, 4), 100.0);
    }

    #[test]
    fn reading_unknown_name_creates_zeroed_entry() {
        let tracker = StatsTracker::new();
        let stats = tracker.get_stats("fresh");
        assert_eq!(stats, PipelineStats { total_calls: 0, successful: 0, failed: 0, failure_rate_percent: 0.0 });
        assert!(tracker.dashboard().contains_key("fresh"));
    }

    #[test]
    fn counts_split_by_outcome() {
        let tracker = StatsTracker::new();
        tracker.record_call("p", true);
        tracker.record_call("p", false);
        tracker.record_call("p", false);
        tracker.record_call("q", true);

        let p = tracker.get_stats("p");
        assert_eq!((p.total_calls, p.successful, p.failed), (3, 1, 2));
        assert_eq!(p.failure_rate_percent, 66.67);
        assert_eq!(tracker.dashboard().len(), 2);
        assert_eq!(tracker.names(), ["p", "q"]);
    }

    #[test]
    fn snapshots_stay_consistent_under_concurrent_writes() {
        let tracker = StatsTracker::new();
        std::thread::scope(|scope| {
            for i in 0..4 {
                let tracker = &tracker;
                scope.spawn(move || {
                    for n in 0..5_000 {
                        tracker.record_call("mixed", (n + i) % 3 != 0);
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..5_000 {
                    let stats = tracker.get_stats("mixed");
                    assert_eq!(stats.total_calls, stats.successful + stats.failed);
                }
            });
        });

        assert_eq!(tracker.get_stats("mixed").total_calls, 20_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_successes_are_race_free() {
        let tracker = StatsTracker::new();
        let mut tasks = Vec::new();
        for _ in 0..200 {
            let tracker = tracker.clone();
            tasks.push(tokio::spawn(async move {
                tracker.record_call("shared", true);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let stats = tracker.get_stats("shared");
        assert_eq!(stats.total_calls, 200);
        assert_eq!(stats.successful, 200);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.failure_rate_percent, 0.0);
    }
}
