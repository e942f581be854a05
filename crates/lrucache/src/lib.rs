//! # lrucache
//!
//! Fixed-capacity cache that keeps the most recently used entries.
//!
//! ## Architecture
//! - **HashMap**: AHash index from key to arena slot (O(1))
//! - **LRU List**: Doubly-linked list threaded through the arena (O(1) promote and evict)
//! - **ValueProvider**: Caller-supplied hooks that compute values on miss and
//!   release them on eviction
//! - **SharedLruCache**: The same cache behind one mutex for multi-threaded callers
//!
//! ```
//! use std::convert::Infallible;
//! use lrucache::{FnProvider, LruCache};
//!
//! let provider = FnProvider::new(|key: &i32| Ok::<_, Infallible>(key * key));
//! let mut cache = LruCache::with_provider(4, provider).unwrap();
//!
//! let (value, hit) = cache.fetch(3).unwrap();
//! assert_eq!((*value, hit), (9, false));
//! assert_eq!(cache.hit_ratio(), 0.0);
//! ```

#![warn(missing_docs)]

mod error;
mod lru;
mod provider;
mod shared;
mod stats;

pub use error::{Error, Result};
pub use lru::{Iter, LruCache};
pub use provider::{DefaultProvider, FnProvider, ValueProvider};
pub use shared::SharedLruCache;
pub use stats::CacheStats;
