//! Cache statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for cache performance tracking
///
/// Counters only ever grow until the owning cache is cleared. They are
/// atomics so a shared handle can be read while another thread holds the
/// cache; they never influence eviction.
///
/// Only the cache updates them. A handle is read-only:
///
/// ```compile_fail
/// use lrucache::LruCache;
///
/// let cache: LruCache<u8, u8> = LruCache::new(1).unwrap();
/// cache.stats().record_hit();
/// ```
///
/// ```compile_fail
/// use lrucache::LruCache;
///
/// let cache: LruCache<u8, u8> = LruCache::new(1).unwrap();
/// cache.stats_handle().reset();
/// ```
#[derive(Debug, Default)]
pub struct CacheStats {
    fetches: AtomicU64,
    hits: AtomicU64,
    evictions: AtomicU64,
    unregister_failures: AtomicU64,
}

impl CacheStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fetch attempt
    pub(crate) fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Release);
    }

    /// Record a cache hit
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Release);
    }

    /// Record an eviction
    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Release);
    }

    /// Record a failed unregister hook
    pub(crate) fn record_unregister_failure(&self) {
        self.unregister_failures.fetch_add(1, Ordering::Release);
    }

    /// Get total fetch attempts
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Acquire)
    }

    /// Get total hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Acquire)
    }

    /// Get total misses
    pub fn misses(&self) -> u64 {
        let hits = self.hits();
        self.fetches().saturating_sub(hits)
    }

    /// Get total evictions (capacity pressure only, not clears)
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Acquire)
    }

    /// Get total unregister hook failures
    pub fn unregister_failures(&self) -> u64 {
        self.unregister_failures.load(Ordering::Acquire)
    }

    /// Calculate hit ratio (0.0 to 1.0), 0.0 before the first fetch
    ///
    /// A fetch is recorded before its hit, so loading hits first keeps the
    /// pair ordered while the cache is being fetched from. A concurrent clear
    /// can still zero fetches between the two loads; the result is clamped.
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let fetches = self.fetches();
        if fetches == 0 {
            0.0
        } else {
            (hits as f64 / fetches as f64).min(1.0)
        }
    }

    /// Reset all statistics
    pub(crate) fn reset(&self) {
        self.hits.store(0, Ordering::Release);
        self.fetches.store(0, Ordering::Release);
        self.evictions.store(0, Ordering::Release);
        self.unregister_failures.store(0, Ordering::Release);
    }
}
