//! Dispatcher counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated without locks.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub requests: AtomicU64,
    pub cache_hits: AtomicU64,
    pub coalesced: AtomicU64,
    pub dispatched: AtomicU64,
    pub delivered: AtomicU64,
    pub stale_delivered: AtomicU64,
    pub unavailable: AtomicU64,
}

impl Counters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, in_flight: usize) -> DispatcherStats {
        DispatcherStats {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            stale_delivered: self.stale_delivered.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            in_flight,
        }
    }
}

/// Snapshot of dispatcher activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Calls to `get`.
    pub requests: u64,
    /// Requests answered from the memory cache.
    pub cache_hits: u64,
    /// Requests merged into an in-flight fetch for the same tile.
    pub coalesced: u64,
    /// Hand-offs to a provider. A request walking the chain counts once per
    /// provider tried.
    pub dispatched: u64,
    /// Fresh tiles delivered.
    pub delivered: u64,
    /// Expired tiles delivered.
    pub stale_delivered: u64,
    /// Requests that ended with no tile.
    pub unavailable: u64,
    /// Tiles currently being fetched.
    pub in_flight: usize,
}

impl DispatcherStats {
    /// Fraction of cache misses that were merged into an existing fetch.
    pub fn coalescing_ratio(&self) -> f64 {
        let misses = self.requests.saturating_sub(self.cache_hits);
        if misses == 0 {
            0.0
        } else {
            self.coalesced as f64 / misses as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalescing_ratio() {
        let stats = DispatcherStats {
            requests: 12,
            cache_hits: 2,
            coalesced: 5,
            ..Default::default()
        };
        assert!((stats.coalescing_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_coalescing_ratio_without_misses() {
        assert_eq!(DispatcherStats::default().coalescing_ratio(), 0.0);
    }

    #[test]
    fn test_snapshot_reads_counters() {
        let counters = Counters::default();
        Counters::incr(&counters.requests);
        Counters::incr(&counters.requests);
        Counters::incr(&counters.cache_hits);

        let stats = counters.snapshot(3);
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.in_flight, 3);
    }
}
