//! Replays a fetch pattern through an `LruCache`

use std::fmt;

use lrucache::{LruCache, Result, ValueProvider};
use tracing::debug;

/// Squaring overflowed `i64`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow(pub i64);

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "square of {} overflows i64", self.0)
    }
}

impl std::error::Error for Overflow {}

/// Computes `key * key` and counts hook calls
#[derive(Debug, Default)]
pub struct SquareProvider {
    registered: u64,
    unregistered: u64,
}

impl ValueProvider<i64, i64> for SquareProvider {
    type Error = Overflow;

    fn register(&mut self, key: &i64) -> std::result::Result<i64, Overflow> {
        let value = key.checked_mul(*key).ok_or(Overflow(*key))?;
        self.registered += 1;
        Ok(value)
    }

    fn unregister(&mut self, key: i64, value: i64) -> std::result::Result<(), Overflow> {
        debug!(key, value, "released");
        self.unregistered += 1;
        Ok(())
    }
}

/// Which keys to fetch and how often
#[derive(Debug, Clone)]
pub struct Pattern {
    /// Keys in fetch order
    pub keys: Vec<i64>,
    /// Consecutive fetches of each key
    pub repeat: u32,
    /// Passes over `keys`
    pub rounds: u64,
}

/// Statistics gathered from one run
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Configured cache capacity
    pub capacity: usize,
    /// Fetch attempts
    pub fetches: u64,
    /// Fetches served from the cache
    pub hits: u64,
    /// `hits / fetches`, 0.0 when nothing was fetched
    pub hit_ratio: f64,
    /// Entries pushed out by capacity pressure
    pub evictions: u64,
    /// Values the provider computed
    pub registered: u64,
}

/// Run `pattern` against a fresh cache of `capacity` entries
pub fn run(capacity: usize, provider: SquareProvider, pattern: &Pattern) -> Result<Report> {
    let mut cache = LruCache::with_provider(capacity, provider)?;

    for _ in 0..pattern.rounds {
        for &key in &pattern.keys {
            for _ in 0..pattern.repeat {
                cache.fetch(key)?;
            }
        }
    }

    let report = Report {
        capacity: cache.capacity(),
        fetches: cache.fetch_count(),
        hits: cache.hit_count(),
        hit_ratio: cache.hit_ratio(),
        evictions: cache.stats().evictions(),
        registered: cache.provider().registered,
    };

    cache.clear();
    debug!(released = cache.provider().unregistered, "cache cleared");

    Ok(report)
}
