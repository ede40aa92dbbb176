//! Telemetry counters for the storage factory.
//!
//! [`FactoryMetrics`] tracks what the factory did over its lifetime —
//! cache hits, adapter constructions, self-test failures, recoveries,
//! disposals — as cheap atomic counters. [`FactoryMetrics::snapshot`]
//! produces a consistent-enough copy for assertions and telemetry export;
//! individual counters use relaxed ordering, so a snapshot taken during
//! concurrent activity may be mid-update across counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic telemetry counters for the factory.
#[derive(Debug, Default)]
pub struct FactoryMetrics {
    cache_hits: AtomicU64,
    adapters_created: AtomicU64,
    creation_failures: AtomicU64,
    self_test_failures: AtomicU64,
    recovery_attempts: AtomicU64,
    recovery_successes: AtomicU64,
    disposals: AtomicU64,
    disposal_failures: AtomicU64,
}

impl FactoryMetrics {
    /// Creates a zeroed set of counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_adapter_created(&self) {
        self.adapters_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_creation_failure(&self) {
        self.creation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_self_test_failure(&self) {
        self.self_test_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recovery_attempt(&self) {
        self.recovery_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recovery_success(&self) {
        self.recovery_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disposal(&self) {
        self.disposals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disposal_failure(&self) {
        self.disposal_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            adapters_created: self.adapters_created.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            self_test_failures: self.self_test_failures.load(Ordering::Relaxed),
            recovery_attempts: self.recovery_attempts.load(Ordering::Relaxed),
            recovery_successes: self.recovery_successes.load(Ordering::Relaxed),
            disposals: self.disposals.load(Ordering::Relaxed),
            disposal_failures: self.disposal_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the factory counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Requests served from the adapter cache.
    pub cache_hits: u64,
    /// Adapters constructed and self-tested successfully.
    pub adapters_created: u64,
    /// Creation attempts that surfaced an error.
    pub creation_failures: u64,
    /// Self-test probe failures.
    pub self_test_failures: u64,
    /// Automatic recovery attempts after corruption.
    pub recovery_attempts: u64,
    /// Recovery attempts whose repair succeeded.
    pub recovery_successes: u64,
    /// Cached adapters disposed (mode change or replacement).
    pub disposals: u64,
    /// Disposals whose close failed (logged, never propagated).
    pub disposal_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = FactoryMetrics::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_adapter_created();
        metrics.record_disposal();
        metrics.record_disposal_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.adapters_created, 1);
        assert_eq!(snapshot.disposals, 1);
        assert_eq!(snapshot.disposal_failures, 1);
        assert_eq!(snapshot.creation_failures, 0);
    }

    #[test]
    fn snapshot_is_stable_copy() {
        let metrics = FactoryMetrics::new();
        metrics.record_recovery_attempt();
        let before = metrics.snapshot();
        metrics.record_recovery_attempt();
        assert_eq!(before.recovery_attempts, 1);
        assert_eq!(metrics.snapshot().recovery_attempts, 2);
    }
}
