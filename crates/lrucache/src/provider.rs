//! Value providers: how a cache computes missing values and releases evicted ones.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;
use std::marker::PhantomData;

/// Computes values for missing keys and is notified when entries leave the cache.
///
/// The cache owns its provider and calls it synchronously from
/// [`LruCache::fetch`](crate::LruCache::fetch) and
/// [`LruCache::clear`](crate::LruCache::clear).
pub trait ValueProvider<K, V> {
    /// Failure type for both hooks
    type Error: StdError + Send + Sync + 'static;

    /// Produce the value for a key that is not cached.
    ///
    /// Should be deterministic for a given key, otherwise hit ratios lose
    /// their meaning. The cache does not check this.
    fn register(&mut self, key: &K) -> Result<V, Self::Error>;

    /// Called exactly once for every entry that leaves the cache, either by
    /// eviction or by [`clear`](crate::LruCache::clear).
    ///
    /// The entry is already detached when this runs, so an error here is
    /// logged and counted but never puts the pair back. A panic here
    /// propagates out of the cache call; see
    /// [`clear`](crate::LruCache::clear#panics) for what that means for the
    /// remaining entries.
    fn unregister(&mut self, key: K, value: V) -> Result<(), Self::Error> {
        let _ = (key, value);
        Ok(())
    }
}

/// Baseline policy: `register` yields `V::default()` and `unregister` does nothing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DefaultProvider;

impl<K, V: Default> ValueProvider<K, V> for DefaultProvider {
    type Error = Infallible;

    fn register(&mut self, _key: &K) -> Result<V, Infallible> {
        Ok(V::default())
    }
}

/// Adapts a closure into a provider with a no-op `unregister`.
///
/// ```
/// use std::convert::Infallible;
/// use lrucache::{FnProvider, LruCache};
///
/// let square = FnProvider::new(|key: &i64| Ok::<_, Infallible>(key * key));
/// let mut cache = LruCache::with_provider(2, square).unwrap();
/// assert_eq!(cache.fetch(3).unwrap(), (&9, false));
/// assert_eq!(cache.fetch(3).unwrap(), (&9, true));
/// ```
pub struct FnProvider<F, E = Infallible> {
    register: F,
    _error: PhantomData<fn() -> E>,
}

impl<F, E> FnProvider<F, E> {
    /// Wrap `register`
    pub fn new<K, V>(register: F) -> Self
    where
        F: FnMut(&K) -> Result<V, E>,
    {
        Self {
            register,
            _error: PhantomData,
        }
    }
}

impl<F, E> fmt::Debug for FnProvider<F, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProvider").finish_non_exhaustive()
    }
}

impl<K, V, F, E> ValueProvider<K, V> for FnProvider<F, E>
where
    F: FnMut(&K) -> Result<V, E>,
    E: StdError + Send + Sync + 'static,
{
    type Error = E;

    fn register(&mut self, key: &K) -> Result<V, E> {
        (self.register)(key)
    }
}
