//! Cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Snapshot of cache activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Requests answered from a resolved entry.
    pub hits: u64,
    /// Requests that joined a load already in flight.
    pub coalesced: u64,
    /// Loads handed to the asset loader.
    pub loads_started: u64,
    /// Loads that produced a handle.
    pub loads_succeeded: u64,
    /// Loads that produced an error.
    pub loads_failed: u64,
    /// Requests answered with a cached failure during cool-down.
    pub failures_served: u64,
    /// Resolved entries dropped after their last release.
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of requests that did not start a load.
    pub fn reuse_ratio(&self) -> f64 {
        let total = self.hits + self.coalesced + self.failures_served + self.loads_started;
        if total == 0 {
            return 0.0;
        }
        (total - self.loads_started) as f64 / total as f64
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        format!(
            "loads: {} ({} ok, {} failed) | hits: {} | coalesced: {} | cooled-down failures: {} | evictions: {}",
            self.loads_started,
            self.loads_succeeded,
            self.loads_failed,
            self.hits,
            self.coalesced,
            self.failures_served,
            self.evictions
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) hits: AtomicU64,
    pub(crate) coalesced: AtomicU64,
    pub(crate) loads_started: AtomicU64,
    pub(crate) loads_succeeded: AtomicU64,
    pub(crate) loads_failed: AtomicU64,
    pub(crate) failures_served: AtomicU64,
    pub(crate) evictions: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            loads_started: self.loads_started.load(Ordering::Relaxed),
            loads_succeeded: self.loads_succeeded.load(Ordering::Relaxed),
            loads_failed: self.loads_failed.load(Ordering::Relaxed),
            failures_served: self.failures_served.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
