use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters for one sweep run.
///
/// Cloned into every worker; updates are lock-free since counters sit on
/// the hot path next to the probe loop.
#[derive(Clone, Default)]
pub struct RunProgress {
    inner: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    matches: AtomicU64,
    no_matches: AtomicU64,
    malformed: AtomicU64,
    transient_failures: AtomicU64,
    fatal_failures: AtomicU64,
    conflicts: AtomicU64,
}

impl RunProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatched(&self) {
        self.inner.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.inner.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_match(&self) {
        self.inner.matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_no_match(&self) {
        self.inner.no_matches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.inner.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_failure(&self) {
        self.inner.transient_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fatal_failure(&self) {
        self.inner.fatal_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.inner.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            dispatched: self.inner.dispatched.load(Ordering::Relaxed),
            completed: self.inner.completed.load(Ordering::Relaxed),
            matches: self.inner.matches.load(Ordering::Relaxed),
            no_matches: self.inner.no_matches.load(Ordering::Relaxed),
            malformed: self.inner.malformed.load(Ordering::Relaxed),
            transient_failures: self.inner.transient_failures.load(Ordering::Relaxed),
            fatal_failures: self.inner.fatal_failures.load(Ordering::Relaxed),
            conflicts: self.inner.conflicts.load(Ordering::Relaxed),
        }
    }
}

/// Read-only view of the run counters for summaries and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub dispatched: u64,
    pub completed: u64,
    pub matches: u64,
    pub no_matches: u64,
    pub malformed: u64,
    pub transient_failures: u64,
    pub fatal_failures: u64,
    pub conflicts: u64,
}

impl ProgressSnapshot {
    /// Candidates whose validity could not be determined (probe never
    /// produced a classifiable response).
    pub fn unknown(&self) -> u64 {
        self.transient_failures + self.fatal_failures + self.malformed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let progress = RunProgress::new();
        progress.record_dispatched();
        progress.record_dispatched();
        progress.record_completed();
        progress.record_match();
        progress.record_transient_failure();
        progress.record_malformed();

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.dispatched, 2);
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.matches, 1);
        assert_eq!(snapshot.unknown(), 2);
    }

    #[test]
    fn test_clones_share_counters() {
        let progress = RunProgress::new();
        let clone = progress.clone();
        clone.record_match();
        assert_eq!(progress.snapshot().matches, 1);
    }
}
