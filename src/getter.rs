//! The fetch a loader runs on a miss.
//!
//! A [`Getter`] is whatever produces the authoritative value for a key: a call to a peer node,
//! a database query, a computation. The loader makes sure at most one `get` per key is in
//! flight and caches what it returns.
//!
//! # Implementing Getter
//!
//! ```ignore
//! use flight_cache::{Error, Getter, Result};
//! use std::future::Future;
//!
//! struct PeerGetter {
//!     client: reqwest::Client,
//!     base: String,
//! }
//!
//! impl Getter<Vec<u8>> for PeerGetter {
//!     fn get(&self, key: &str) -> impl Future<Output = Result<Vec<u8>>> + Send {
//!         let url = format!("{}/{}", self.base, key);
//!         let client = self.client.clone();
//!         async move {
//!             let resp = client.get(url).send().await
//!                 .map_err(|e| Error::GetterError(e.to_string()))?;
//!             Ok(resp.bytes().await.map_err(|e| Error::GetterError(e.to_string()))?.to_vec())
//!         }
//!     }
//! }
//! ```
//!
//! For closures use [`FnGetter`]; for tests use [`InMemoryGetter`].

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of values for a [`crate::CacheLoader`].
///
/// # Errors
///
/// Return `Err` when the value cannot be produced. The error is handed to every caller that
/// coalesced onto this fetch and nothing is cached.
pub trait Getter<V>: Send + Sync {
    /// Fetch the value for `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<V>> + Send;
}

/// Adapts an async closure taking the owned key into a [`Getter`].
///
/// # Example
///
/// ```
/// use flight_cache::{FnGetter, Getter};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let getter = FnGetter::new(|key: String| async move { Ok::<_, flight_cache::Error>(key.len()) });
/// assert_eq!(getter.get("four").await, Ok(4));
/// # }
/// ```
pub struct FnGetter<F> {
    f: F,
}

impl<F> FnGetter<F> {
    pub fn new(f: F) -> Self {
        FnGetter { f }
    }
}

impl<V, F, Fut> Getter<V> for FnGetter<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<V>> + Send,
{
    fn get(&self, key: &str) -> impl Future<Output = Result<V>> + Send {
        (self.f)(key.to_string())
    }
}

// ============================================================================
// In-Memory Test Getter
// ============================================================================

/// Getter serving a fixed map, counting every fetch.
///
/// Useful in tests to check how many fetches actually reached the source. Missing keys fail
/// with `Error::NotFound`.
pub struct InMemoryGetter<V> {
    data: HashMap<String, V>,
    fetches: AtomicUsize,
}

impl<V> InMemoryGetter<V> {
    pub fn new() -> Self {
        InMemoryGetter {
            data: HashMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Insert or update a value.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.data.insert(key.into(), value);
    }

    /// Number of `get` calls served so far, hits and misses alike.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<V> Default for InMemoryGetter<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Getter<V> for InMemoryGetter<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> impl Future<Output = Result<V>> + Send {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let result = self
            .data
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()));
        async move { result }
    }
}
