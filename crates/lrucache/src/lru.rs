//! LRU (Least Recently Used) cache implementation
//!
//! Nodes live in a `Vec` arena and are threaded into a doubly-linked list by
//! slot index, so the lookup index can point straight at a node without the
//! node ever moving. Once the arena reaches capacity, a miss reuses the
//! evicted tail's slot in place.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use ahash::RandomState;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::provider::{DefaultProvider, ValueProvider};
use crate::stats::CacheStats;

/// Node in the LRU doubly-linked list
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<K, V> Node<K, V> {
    fn detached(key: K, value: V) -> Self {
        Self {
            key,
            value,
            prev: None,
            next: None,
        }
    }
}

/// Fixed-capacity cache that keeps the most recently fetched entries.
///
/// Missing values come from the provider `P`; the least recently used entry
/// is handed back to the provider when room is needed.
///
/// ```
/// use std::convert::Infallible;
/// use lrucache::{FnProvider, LruCache};
///
/// let square = FnProvider::new(|k: &u32| Ok::<_, Infallible>(k * k));
/// let mut cache = LruCache::with_provider(2, square).unwrap();
///
/// assert_eq!(cache.fetch(2).unwrap(), (&4, false));
/// assert_eq!(cache.fetch(2).unwrap(), (&4, true));
/// assert_eq!(cache.fetch(3).unwrap(), (&9, false));
/// assert_eq!(cache.fetch(5).unwrap(), (&25, false)); // evicts 2
/// assert!(!cache.contains(&2));
/// ```
pub struct LruCache<K, V, P = DefaultProvider> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Node<K, V>>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
    provider: P,
    stats: Arc<CacheStats>,
}

impl<K, V> LruCache<K, V, DefaultProvider>
where
    K: Hash + Eq + Clone,
    V: Default,
{
    /// Create a cache backed by [`DefaultProvider`]
    ///
    /// # Errors
    /// * [`Error::ZeroCapacity`] if `capacity` is 0
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_provider(capacity, DefaultProvider)
    }
}

impl<K, V, P> LruCache<K, V, P>
where
    K: Hash + Eq + Clone,
    P: ValueProvider<K, V>,
{
    /// Create a new LRU cache with the given capacity and provider
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries, fixed for the cache's lifetime
    /// * `provider` - Computes values on miss, notified on eviction
    ///
    /// # Errors
    /// * [`Error::ZeroCapacity`] if `capacity` is 0
    pub fn with_provider(capacity: usize, provider: P) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }

        Ok(Self {
            map: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            capacity,
            provider,
            stats: Arc::new(CacheStats::new()),
        })
    }

    /// Fetch the value for `key`, registering it on a miss
    ///
    /// Returns the value and whether it was a hit. A hit promotes the entry
    /// to most recently used. A miss asks the provider for the value and, if
    /// the cache is full, evicts the least recently used entry first.
    ///
    /// # Errors
    /// * [`Error::Register`] if the provider fails; the cache contents are
    ///   left exactly as they were, only the fetch counter moves.
    pub fn fetch(&mut self, key: K) -> Result<(&V, bool)> {
        self.stats.record_fetch();

        let cached = self.map.get(&key).copied();
        if let Some(idx) = cached {
            self.stats.record_hit();
            self.move_to_front(idx);
            return Ok((&self.nodes[idx].value, true));
        }

        let value = self.provider.register(&key).map_err(Error::register)?;
        let idx = self.insert_front(key, value);
        Ok((&self.nodes[idx].value, false))
    }

    /// Remove every entry and reset the statistics
    ///
    /// Entries are handed to the provider's `unregister` from least to most
    /// recently used. Counters are zeroed before the hooks run, so hook
    /// failures during the clear remain visible afterwards.
    ///
    /// # Panics
    /// Every entry is detached before the first hook runs. If a hook panics,
    /// the cache is already empty and consistent, but the entries after it
    /// are dropped without their `unregister` call, the same as when the
    /// cache itself is dropped.
    pub fn clear(&mut self) {
        self.stats.reset();

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.tail;
        while let Some(idx) = cursor {
            order.push(idx);
            cursor = self.nodes[idx].prev;
        }

        let mut slots: Vec<Option<Node<K, V>>> =
            std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        self.map.clear();
        self.head = None;
        self.tail = None;

        debug!(entries = order.len(), "clearing cache");
        for idx in order {
            if let Some(node) = slots[idx].take() {
                self.notify_unregister(node.key, node.value);
            }
        }
    }

    fn insert_front(&mut self, key: K, value: V) -> usize {
        match self.tail {
            Some(idx) if self.nodes.len() >= self.capacity => {
                self.unlink(idx);
                let evicted = std::mem::replace(
                    &mut self.nodes[idx],
                    Node::detached(key.clone(), value),
                );
                self.map.remove(&evicted.key);
                self.link_front(idx);
                self.map.insert(key, idx);

                self.stats.record_eviction();
                debug!(slot = idx, "evicted least recently used entry");
                self.notify_unregister(evicted.key, evicted.value);
                idx
            }
            _ => {
                let idx = self.nodes.len();
                self.nodes.push(Node::detached(key.clone(), value));
                self.link_front(idx);
                self.map.insert(key, idx);
                idx
            }
        }
    }

    fn notify_unregister(&mut self, key: K, value: V) {
        if let Err(e) = self.provider.unregister(key, value) {
            self.stats.record_unregister_failure();
            warn!(error = %e, "unregister hook failed; entry already removed");
        }
    }
}

impl<K, V, P> LruCache<K, V, P>
where
    K: Hash + Eq,
{
    /// Look at a cached value without changing its recency or the counters
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|&idx| &self.nodes[idx].value)
    }

    /// Check whether `key` is cached, without promoting it
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Verify that the lookup index and the recency queue agree
    ///
    /// # Errors
    /// * [`Error::Corrupted`] describing the first mismatch found
    pub fn check_invariants(&self) -> Result<()> {
        if self.map.len() != self.nodes.len() {
            return Err(Error::Corrupted(format!(
                "index has {} keys, arena has {} nodes",
                self.map.len(),
                self.nodes.len()
            )));
        }
        if self.nodes.len() > self.capacity {
            return Err(Error::Corrupted(format!(
                "{} entries exceed capacity {}",
                self.nodes.len(),
                self.capacity
            )));
        }

        let mut walked = 0;
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = self.nodes.get(idx).ok_or_else(|| {
                Error::Corrupted(format!("link to slot {} is out of bounds", idx))
            })?;
            if node.prev != prev {
                return Err(Error::Corrupted(format!(
                    "slot {} has a broken back link",
                    idx
                )));
            }
            if self.map.get(&node.key) != Some(&idx) {
                return Err(Error::Corrupted(format!(
                    "slot {} is not indexed by its key",
                    idx
                )));
            }
            walked += 1;
            if walked > self.nodes.len() {
                return Err(Error::Corrupted("recency queue has a cycle".into()));
            }
            prev = Some(idx);
            cursor = node.next;
        }

        if prev != self.tail {
            return Err(Error::Corrupted("tail does not end the queue".into()));
        }
        if walked != self.nodes.len() {
            return Err(Error::Corrupted(format!(
                "queue links {} of {} nodes",
                walked,
                self.nodes.len()
            )));
        }
        Ok(())
    }
}

impl<K, V, P> LruCache<K, V, P> {
    /// Get the number of cached entries
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get the fixed capacity (not the current occupancy)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total fetch attempts since construction or the last clear
    pub fn fetch_count(&self) -> u64 {
        self.stats.fetches()
    }

    /// Total hits since construction or the last clear
    pub fn hit_count(&self) -> u64 {
        self.stats.hits()
    }

    /// Hits over fetches, 0.0 before the first fetch
    pub fn hit_ratio(&self) -> f64 {
        self.stats.hit_ratio()
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Shared handle to the statistics, readable from other threads
    pub fn stats_handle(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Get the value provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the value provider mutably
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Iterate entries from most to least recently used
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: &self.nodes,
            cursor: self.head,
            remaining: self.nodes.len(),
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return; // Already at front
        }

        self.unlink(idx);
        self.link_front(idx);
    }

    fn link_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;

        match self.head {
            Some(head_idx) => self.nodes[head_idx].prev = Some(idx),
            None => self.tail = Some(idx),
        }

        self.head = Some(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);

        match prev {
            Some(prev_idx) => self.nodes[prev_idx].next = next,
            None => self.head = next,
        }

        match next {
            Some(next_idx) => self.nodes[next_idx].prev = prev,
            None => self.tail = prev,
        }

        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }
}

/// Iterator over cached entries, most recently used first
pub struct Iter<'a, K, V> {
    nodes: &'a [Node<K, V>],
    cursor: Option<usize>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let node = &self.nodes[idx];
        self.cursor = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::fmt;

    /// Squares keys and records every hook call
    #[derive(Default)]
    struct Square {
        registered: Vec<i64>,
        unregistered: Vec<(i64, i64)>,
    }

    impl ValueProvider<i64, i64> for Square {
        type Error = Infallible;

        fn register(&mut self, key: &i64) -> std::result::Result<i64, Infallible> {
            self.registered.push(*key);
            Ok(key * key)
        }

        fn unregister(&mut self, key: i64, value: i64) -> std::result::Result<(), Infallible> {
            self.unregistered.push((key, value));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Refused(i64);

    impl fmt::Display for Refused {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "refused key {}", self.0)
        }
    }

    impl std::error::Error for Refused {}

    /// Fails to register negative keys, fails every unregister
    #[derive(Default)]
    struct Picky {
        released: Vec<i64>,
    }

    impl ValueProvider<i64, i64> for Picky {
        type Error = Refused;

        fn register(&mut self, key: &i64) -> std::result::Result<i64, Refused> {
            if *key < 0 {
                Err(Refused(*key))
            } else {
                Ok(*key)
            }
        }

        fn unregister(&mut self, key: i64, _value: i64) -> std::result::Result<(), Refused> {
            self.released.push(key);
            Err(Refused(key))
        }
    }

    fn square_cache(capacity: usize) -> LruCache<i64, i64, Square> {
        LruCache::with_provider(capacity, Square::default()).unwrap()
    }

    fn keys<P>(cache: &LruCache<i64, i64, P>) -> Vec<i64> {
        cache.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = LruCache::<i64, i64>::new(0);
        assert!(matches!(result, Err(Error::ZeroCapacity)));

        let result = LruCache::with_provider(0, Square::default());
        assert!(matches!(result, Err(Error::ZeroCapacity)));
    }

    #[test]
    fn test_default_provider_registers_default() {
        let mut cache: LruCache<&str, u32> = LruCache::new(2).unwrap();

        assert_eq!(cache.fetch("a").unwrap(), (&0, false));
        assert_eq!(cache.fetch("a").unwrap(), (&0, true));
        assert_eq!(cache.capacity(), 2);
    }

    #[test]
    fn test_square_scenario() {
        let mut cache = square_cache(2);

        assert_eq!(cache.fetch(2).unwrap(), (&4, false));
        assert_eq!(cache.fetch(2).unwrap(), (&4, true));
        assert_eq!(cache.fetch(3).unwrap(), (&9, false));
        assert_eq!(cache.fetch(3).unwrap(), (&9, true));
        assert_eq!(cache.fetch(5).unwrap(), (&25, false));

        assert_eq!(cache.provider().unregistered, vec![(2, 4)]);
        assert_eq!(keys(&cache), vec![5, 3]);

        assert_eq!(cache.fetch(2).unwrap(), (&4, false));
        assert_eq!(cache.provider().unregistered, vec![(2, 4), (3, 9)]);
        assert_eq!(cache.provider().registered, vec![2, 3, 5, 2]);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_hit_refreshes_recency() {
        let mut cache = square_cache(3);

        for key in [1, 2, 3, 1] {
            cache.fetch(key).unwrap();
        }
        assert_eq!(keys(&cache), vec![1, 3, 2]);

        cache.fetch(4).unwrap(); // Should evict 2
        assert_eq!(cache.provider().unregistered, vec![(2, 4)]);
        assert!(cache.contains(&1));
        assert!(cache.contains(&3));
        assert!(!cache.contains(&2));
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_repeated_hits_do_not_register() {
        let mut cache = square_cache(4);

        for _ in 0..10 {
            assert_eq!(*cache.fetch(7).unwrap().0, 49);
        }

        assert_eq!(cache.provider().registered, vec![7]);
        assert_eq!(cache.fetch_count(), 10);
        assert_eq!(cache.hit_count(), 9);
    }

    #[test]
    fn test_capacity_one() {
        let mut cache = square_cache(1);

        assert!(!cache.fetch(1).unwrap().1);
        assert!(cache.fetch(1).unwrap().1);
        assert!(!cache.fetch(2).unwrap().1);
        assert!(!cache.fetch(1).unwrap().1);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.provider().unregistered, vec![(1, 1), (2, 4)]);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_counters() {
        let mut cache = square_cache(2);
        assert_eq!(cache.hit_ratio(), 0.0);

        for key in [1, 1, 2, 1, 3, 2] {
            cache.fetch(key).unwrap();
        }

        assert_eq!(cache.fetch_count(), 6);
        assert_eq!(cache.hit_count(), 2);
        assert_eq!(cache.hit_ratio(), 2.0 / 6.0);
        assert_eq!(cache.stats().misses(), 4);
        assert_eq!(cache.stats().evictions(), 2);
    }

    #[test]
    fn test_reference_driver_ratio() {
        let mut cache = square_cache(4);

        for _ in 0..100_000 {
            for key in [2, 3] {
                cache.fetch(key).unwrap();
                cache.fetch(key).unwrap();
            }
        }

        assert_eq!(cache.fetch_count(), 400_000);
        assert_eq!(cache.hit_count(), 399_998);
        assert!((cache.hit_ratio() - 0.999995).abs() < 1e-12);
    }

    #[test]
    fn test_register_failure_leaves_cache_untouched() {
        let mut cache = LruCache::with_provider(2, Picky::default()).unwrap();
        cache.fetch(1).unwrap();
        cache.fetch(2).unwrap();

        let err = cache.fetch(-5).unwrap_err();
        assert!(matches!(err, Error::Register(_)));
        assert_eq!(err.to_string(), "Register failed: refused key -5");

        assert_eq!(keys(&cache), vec![2, 1]);
        assert!(!cache.contains(&-5));
        assert!(cache.provider().released.is_empty());
        assert_eq!(cache.fetch_count(), 3);
        assert_eq!(cache.hit_count(), 0);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_unregister_failure_still_evicts() {
        let mut cache = LruCache::with_provider(2, Picky::default()).unwrap();

        for key in [1, 2, 3, 4] {
            cache.fetch(key).unwrap();
        }

        assert_eq!(keys(&cache), vec![4, 3]);
        assert_eq!(cache.provider().released, vec![1, 2]);
        assert_eq!(cache.stats().unregister_failures(), 2);
        assert_eq!(cache.stats().evictions(), 2);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_clear_unregisters_tail_first() {
        let mut cache = square_cache(3);
        for key in [1, 2, 3, 1] {
            cache.fetch(key).unwrap();
        }

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.provider().unregistered, vec![(2, 4), (3, 9), (1, 1)]);
        assert_eq!(cache.fetch_count(), 0);
        assert_eq!(cache.hit_count(), 0);
        assert_eq!(cache.hit_ratio(), 0.0);
        cache.check_invariants().unwrap();

        // Usable again after a clear
        assert_eq!(cache.fetch(1).unwrap(), (&1, false));
        assert_eq!(cache.fetch(1).unwrap(), (&1, true));
    }

    /// Panics when releasing key 2
    #[derive(Default)]
    struct Fragile {
        released: Vec<i64>,
    }

    impl ValueProvider<i64, i64> for Fragile {
        type Error = Infallible;

        fn register(&mut self, key: &i64) -> std::result::Result<i64, Infallible> {
            Ok(*key)
        }

        fn unregister(&mut self, key: i64, _value: i64) -> std::result::Result<(), Infallible> {
            assert_ne!(key, 2, "cannot release 2");
            self.released.push(key);
            Ok(())
        }
    }

    #[test]
    fn test_clear_panicking_hook_leaves_cache_empty() {
        let mut cache = LruCache::with_provider(3, Fragile::default()).unwrap();
        for key in [1, 2, 3] {
            cache.fetch(key).unwrap();
        }

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cache.clear()));
        assert!(result.is_err());

        // Tail first: 1 released, 2 panicked, 3 dropped without its hook
        assert_eq!(cache.provider().released, vec![1]);
        assert!(cache.is_empty());
        assert!(!cache.contains(&3));
        cache.check_invariants().unwrap();

        assert_eq!(cache.fetch(3).unwrap(), (&3, false));
    }

    #[test]
    fn test_clear_counts_hook_failures() {
        let mut cache = LruCache::with_provider(3, Picky::default()).unwrap();
        cache.fetch(1).unwrap();
        cache.fetch(2).unwrap();

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.provider().released, vec![1, 2]);
        assert_eq!(cache.stats().unregister_failures(), 2);
    }

    #[test]
    fn test_peek_does_not_promote() {
        let mut cache = square_cache(2);
        cache.fetch(1).unwrap();
        cache.fetch(2).unwrap();

        assert_eq!(cache.peek(&1), Some(&1));
        assert_eq!(cache.peek(&9), None);
        assert_eq!(cache.fetch_count(), 2);

        cache.fetch(3).unwrap(); // 1 is still least recently used
        assert!(!cache.contains(&1));
    }

    #[test]
    fn test_iter_len() {
        let mut cache = square_cache(4);
        for key in [1, 2, 3] {
            cache.fetch(key).unwrap();
        }

        let iter = cache.iter();
        assert_eq!(iter.len(), 3);
        let pairs: Vec<_> = iter.map(|(k, v)| (*k, *v)).collect();
        assert_eq!(pairs, vec![(3, 9), (2, 4), (1, 1)]);
    }

    #[test]
    fn test_stats_handle_is_shared() {
        let mut cache = square_cache(2);
        let stats = cache.stats_handle();

        cache.fetch(1).unwrap();
        cache.fetch(1).unwrap();

        assert_eq!(stats.fetches(), 2);
        assert_eq!(stats.hits(), 1);
    }
}
