//! Per-wrapper call statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Where calls to a wrapper were answered from
#[derive(Debug, Default)]
pub struct CallStats {
    memo_hits: AtomicU64,
    cache_hits: AtomicU64,
    computations: AtomicU64,
    invalidations: AtomicU64,
}

impl CallStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_memo_hit(&self) {
        self.memo_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_computation(&self) {
        self.computations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Calls answered by the in-process memo
    pub fn memo_hits(&self) -> u64 {
        self.memo_hits.load(Ordering::Relaxed)
    }

    /// Calls answered by the persistent backend
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Times the wrapped target ran, forced refreshes included
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    /// Explicit invalidations
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    /// Share of lookups answered by either layer (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.memo_hits() + self.cache_hits();
        let total = hits + self.computations();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.memo_hits.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.computations.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
    }
}
