//! Launch instrumentation
//!
//! Lightweight atomic counters recorded by the command queue around every
//! kernel launch. [`LaunchMetrics::snapshot`] produces a serializable
//! [`MetricsSnapshot`] for export to whatever monitoring the surrounding
//! runtime uses.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shared counters for kernel launches on one context.
///
/// Cloning shares the underlying counters.
#[derive(Debug, Clone, Default)]
pub struct LaunchMetrics {
    /// Launches accepted for submission
    submitted: Arc<AtomicU64>,
    /// Launches that ran to completion
    completed: Arc<AtomicU64>,
    /// Launches that surfaced an execution fault
    failed: Arc<AtomicU64>,
    /// Output tiles computed by completed launches
    tiles: Arc<AtomicU64>,
    /// Device busy time across completed launches, in microseconds
    busy_us: Arc<AtomicU64>,
}

impl LaunchMetrics {
    /// Create a fresh set of counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a launch accepted for submission.
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed launch: `tiles` output tiles in `busy` device time.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn record_completed(&self, tiles: u64, busy: Duration) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.tiles.fetch_add(tiles, Ordering::Relaxed);
        self.busy_us
            .fetch_add(busy.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a launch that faulted.
    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent point-in-time view of the counters.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let completed = self.completed.load(Ordering::Relaxed);
        let tiles = self.tiles.load(Ordering::Relaxed);
        let busy_us = self.busy_us.load(Ordering::Relaxed);
        let tiles_per_second = if busy_us == 0 {
            0.0
        } else {
            tiles as f64 / (busy_us as f64 / 1_000_000.0)
        };
        MetricsSnapshot {
            launches_submitted: self.submitted.load(Ordering::Relaxed),
            launches_completed: completed,
            launches_failed: self.failed.load(Ordering::Relaxed),
            tiles_computed: tiles,
            busy_us,
            tiles_per_second,
        }
    }
}

/// Point-in-time view of [`LaunchMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Launches accepted for submission
    pub launches_submitted: u64,
    /// Launches that ran to completion
    pub launches_completed: u64,
    /// Launches that surfaced an execution fault
    pub launches_failed: u64,
    /// Output tiles computed by completed launches
    pub tiles_computed: u64,
    /// Device busy time across completed launches, in microseconds
    pub busy_us: u64,
    /// Throughput derived from `tiles_computed` and `busy_us`
    pub tiles_per_second: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_metrics_zeroed() {
        let snap = LaunchMetrics::new().snapshot();
        assert_eq!(snap.launches_submitted, 0);
        assert_eq!(snap.launches_completed, 0);
        assert_eq!(snap.launches_failed, 0);
        assert_eq!(snap.tiles_computed, 0);
        assert_eq!(snap.tiles_per_second, 0.0);
    }

    #[test]
    fn test_record_lifecycle() {
        let metrics = LaunchMetrics::new();
        metrics.record_submitted();
        metrics.record_completed(16, Duration::from_micros(200));
        metrics.record_submitted();
        metrics.record_failed();

        let snap = metrics.snapshot();
        assert_eq!(snap.launches_submitted, 2);
        assert_eq!(snap.launches_completed, 1);
        assert_eq!(snap.launches_failed, 1);
        assert_eq!(snap.tiles_computed, 16);
        assert_eq!(snap.busy_us, 200);
        assert!(snap.tiles_per_second > 0.0);
    }

    #[test]
    fn test_clone_shares_counters() {
        let metrics = LaunchMetrics::new();
        let alias = metrics.clone();
        alias.record_submitted();
        assert_eq!(metrics.snapshot().launches_submitted, 1);
    }

    #[test]
    fn test_snapshot_serde_roundtrip() {
        let metrics = LaunchMetrics::new();
        metrics.record_submitted();
        let snap = metrics.snapshot();
        let json = serde_json::to_string(&snap).expect("serialize");
        let back: MetricsSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, snap);
    }
}
