//! # Aggregate task metrics.
//!
//! [`EngineCounters`] is the atomic bookkeeping behind a task engine:
//! lifetime totals, per-classification tallies, and the busy-time clock that
//! turns completions into a throughput figure. [`CounterSnapshot`] is the
//! one-shot consistent view handed to callers and to controllers computing
//! cross-engine aggregates.
//!
//! ## Rules
//! - All counters are monotonically non-decreasing for a given run.
//! - `completed = successful + empty + failed`.
//! - `progress ∈ [0, 1]`, and 0 while no task was ever queued.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::engine::result::ResultState;
use crate::lifecycle::RunClock;

/// Atomic counters shared by an engine and its drain handler.
#[derive(Debug, Default)]
pub struct EngineCounters {
    total: AtomicU64,
    successful: AtomicU64,
    empty: AtomicU64,
    failed: AtomicU64,
    clock: RunClock,
}

impl EngineCounters {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_total(&self, n: u64) {
        self.total.fetch_add(n, AtomicOrdering::Relaxed);
    }

    pub(crate) fn add_failed(&self, n: u64) {
        self.failed.fetch_add(n, AtomicOrdering::Relaxed);
    }

    /// Tallies exactly one classification bucket.
    pub(crate) fn record(&self, state: ResultState) {
        let bucket = match state {
            ResultState::Success => &self.successful,
            ResultState::Empty => &self.empty,
            ResultState::Error => &self.failed,
        };
        bucket.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn clock(&self) -> &RunClock {
        &self.clock
    }

    /// One consistent view; `waiting` is supplied by the owner (queue depth).
    pub fn snapshot(&self, waiting: usize) -> CounterSnapshot {
        let total = self.total.load(AtomicOrdering::Relaxed);
        let successful = self.successful.load(AtomicOrdering::Relaxed);
        let empty = self.empty.load(AtomicOrdering::Relaxed);
        let failed = self.failed.load(AtomicOrdering::Relaxed);
        let completed = successful + empty + failed;
        let progress = if total == 0 {
            0.0
        } else {
            (completed as f64 / total as f64).clamp(0.0, 1.0)
        };
        CounterSnapshot {
            total,
            waiting,
            successful,
            empty,
            failed,
            completed,
            progress,
            tasks_per_second: self.clock.rate(completed),
        }
    }
}

/// Point-in-time view of an engine's counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterSnapshot {
    /// Directives ever queued.
    pub total: u64,
    /// Directives still waiting in the queue.
    pub waiting: usize,
    /// Results classified `Success`.
    pub successful: u64,
    /// Results classified `Empty`.
    pub empty: u64,
    /// Results classified `Error` (plus directives failed by an abort).
    pub failed: u64,
    /// `successful + empty + failed`.
    pub completed: u64,
    /// `completed / total`, 0 when `total` is 0; always within `[0, 1]`.
    pub progress: f64,
    /// `completed` divided by elapsed busy seconds.
    pub tasks_per_second: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_derives_completed_and_progress() {
        let counters = EngineCounters::new();
        counters.add_total(4);
        counters.record(ResultState::Success);
        counters.record(ResultState::Empty);
        counters.record(ResultState::Error);

        let snap = counters.snapshot(1);
        assert_eq!(snap.total, 4);
        assert_eq!(snap.waiting, 1);
        assert_eq!(snap.completed, 3);
        assert_eq!(snap.failed, 1);
        assert!((snap.progress - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_engine_reports_zero_progress() {
        let counters = EngineCounters::new();
        let snap = counters.snapshot(0);
        assert_eq!(snap.progress, 0.0);
        assert_eq!(snap.tasks_per_second, 0.0);
    }

    #[test]
    fn progress_stays_within_unit_interval() {
        let counters = EngineCounters::new();
        counters.add_total(1);
        counters.record(ResultState::Success);
        // Abort bookkeeping can add failures past the queued total.
        counters.add_failed(5);
        assert!(counters.snapshot(0).progress <= 1.0);
    }
}
