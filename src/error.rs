//! Error types for the loader layer.
//!
//! The primitives in [`crate::lru`] and [`crate::singleflight`] never produce these: a cache
//! miss is `None`, and a coalesced call hands back whatever error type the caller's function
//! returns. `Error` is what [`crate::CacheLoader`] and [`crate::Getter`] speak.

use std::fmt;

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the loader layer.
///
/// `Error` is `Clone` because one getter failure is delivered to every caller that coalesced
/// onto the same fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The getter failed to produce a value.
    ///
    /// Common causes:
    /// - Peer or database unreachable
    /// - Remote returned an error status
    /// - Payload could not be decoded
    ///
    /// **Recovery:** Nothing is cached, so the next `get` for the key fetches again.
    GetterError(String),

    /// The getter has no value for this key.
    NotFound(String),

    /// The key cannot be looked up (for example, it is empty).
    InvalidKey(String),

    /// Configuration error while building a loader.
    ///
    /// Common causes:
    /// - Empty loader name
    /// - Malformed JSON configuration
    ///
    /// **Recovery:** Fix configuration and restart.
    ConfigError(String),

    /// Generic error with custom message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::GetterError(msg) => write!(f, "Getter error: {}", msg),
            Error::NotFound(key) => write!(f, "Not found: {}", key),
            Error::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ConfigError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}
