//! Error types for lrucache

use std::error::Error as StdError;
use std::fmt;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache operations
#[derive(Debug)]
pub enum Error {
    /// Capacity must be at least one entry
    ZeroCapacity,

    /// The value provider could not produce a value for a missing key
    Register(Box<dyn StdError + Send + Sync>),

    /// Lookup index and recency queue disagree
    Corrupted(String),
}

impl Error {
    /// Wrap a provider failure
    pub(crate) fn register<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Register(Box::new(err))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ZeroCapacity => write!(f, "Invalid capacity: must be greater than 0"),
            Error::Register(e) => write!(f, "Register failed: {}", e),
            Error::Corrupted(msg) => write!(f, "Cache corrupted: {}", msg),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Register(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
