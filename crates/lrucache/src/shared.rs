//! SharedLruCache: an `LruCache` behind a single lock

use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::lru::LruCache;
use crate::provider::{DefaultProvider, ValueProvider};
use crate::stats::CacheStats;

/// Thread-safe wrapper around [`LruCache`]
///
/// Every fetch mutates both the lookup index and the recency queue, so the
/// whole cache sits behind one mutex held for the full call. Statistics are
/// read through a shared handle without taking the lock.
pub struct SharedLruCache<K, V, P = DefaultProvider> {
    /// The cache itself
    inner: Mutex<LruCache<K, V, P>>,

    /// Same counters the cache updates
    stats: Arc<CacheStats>,

    /// Cache capacity
    capacity: usize,
}

impl<K, V, P> SharedLruCache<K, V, P>
where
    K: Hash + Eq + Clone,
    V: Clone,
    P: ValueProvider<K, V>,
{
    /// Create a new shared cache with the given capacity and provider
    ///
    /// # Errors
    /// * [`Error::ZeroCapacity`](crate::Error::ZeroCapacity) if `capacity` is 0
    pub fn with_provider(capacity: usize, provider: P) -> Result<Self> {
        Ok(Self::from_cache(LruCache::with_provider(capacity, provider)?))
    }

    /// Fetch a clone of the value for `key`, registering it on a miss
    ///
    /// # Returns
    /// * `Result<(V, bool)>` - The value and whether it was a hit
    pub fn fetch(&self, key: K) -> Result<(V, bool)> {
        let mut cache = self.inner.lock();
        let (value, hit) = cache.fetch(key)?;
        Ok((value.clone(), hit))
    }

    /// Clear the cache, unregistering every entry and resetting the statistics
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl<K, V, P> SharedLruCache<K, V, P> {
    /// Wrap an existing cache
    pub fn from_cache(cache: LruCache<K, V, P>) -> Self {
        Self {
            stats: cache.stats_handle(),
            capacity: cache.capacity(),
            inner: Mutex::new(cache),
        }
    }

    /// Run `f` with exclusive access to the underlying cache
    pub fn with<R>(&self, f: impl FnOnce(&mut LruCache<K, V, P>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Get current number of cached entries
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Get cache capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take the cache back out of the lock
    pub fn into_inner(self) -> LruCache<K, V, P> {
        self.inner.into_inner()
    }
}

impl<K, V> SharedLruCache<K, V, DefaultProvider>
where
    K: Hash + Eq + Clone,
    V: Clone + Default,
{
    /// Create a shared cache backed by [`DefaultProvider`]
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_provider(capacity, DefaultProvider)
    }
}
