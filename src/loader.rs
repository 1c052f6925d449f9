//! Cache loader: the composed miss path.
//!
//! ```text
//! get(key)
//!   ├─ local LRU hit ──────────────────────────────► value
//!   └─ miss
//!        └─ AsyncGroup::call(key)        one fetch per key in flight
//!             ├─ re-check LRU            a burst that just ended may have filled it
//!             ├─ Getter::get(key)        the opaque fetch
//!             ├─ add to LRU              on success only
//!             └────────────────────────► value to the caller and every waiter
//! ```
//!
//! The LRU sits behind a `std::sync::Mutex` that is held only for individual cache operations
//! and never across an `.await`.

use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use crate::getter::Getter;
use crate::lru;
use crate::singleflight::AsyncGroup;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Read-through cache over a [`Getter`].
///
/// `CacheLoader` is `Clone`; clones share the same cache and in-flight fetches, so it can be
/// handed to every task or request handler.
///
/// # Example
///
/// ```
/// use flight_cache::{CacheLoader, InMemoryGetter, LoaderConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> flight_cache::Result<()> {
/// let mut getter = InMemoryGetter::new();
/// getter.insert("user:1", "alice".to_string());
///
/// let loader = CacheLoader::new(LoaderConfig::default().with_name("users"), getter)?;
///
/// assert_eq!(loader.get("user:1").await?, "alice"); // fetched
/// assert_eq!(loader.get("user:1").await?, "alice"); // cached
/// assert_eq!(loader.getter().fetches(), 1);
/// # Ok(())
/// # }
/// ```
pub struct CacheLoader<V, G> {
    inner: Arc<Inner<V, G>>,
}

impl<V, G> Clone for CacheLoader<V, G> {
    fn clone(&self) -> Self {
        CacheLoader {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<V, G> {
    config: LoaderConfig,
    cache: Mutex<lru::Cache<String, V>>,
    flights: AsyncGroup<V, Error>,
    getter: G,
}

impl<V, G> CacheLoader<V, G>
where
    V: Clone + Send + Sync + 'static,
    G: Getter<V> + 'static,
{
    /// Create a loader with an empty cache.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if `config` fails validation.
    pub fn new(config: LoaderConfig, getter: G) -> Result<Self> {
        config.validate()?;

        let name = config.name.clone();
        let cache = lru::Cache::new(config.max_entries)
            .with_on_evicted(move |key: String, _: V| debug!("[{}] evicted {}", name, key));

        info!(
            "[{}] loader created (flight-cache {}, max_entries: {})",
            config.name,
            crate::VERSION,
            config.max_entries
        );

        Ok(CacheLoader {
            inner: Arc::new(Inner {
                config,
                cache: Mutex::new(cache),
                flights: AsyncGroup::new(),
                getter,
            }),
        })
    }

    /// Also pass evicted entries to `f`, e.g. to release resources they hold.
    ///
    /// Runs for capacity eviction and [`CacheLoader::clear`], not for [`CacheLoader::remove`].
    pub fn with_on_evicted<F>(self, mut f: F) -> Self
    where
        F: FnMut(String, V) + Send + 'static,
    {
        let name = self.inner.config.name.clone();
        self.inner.lock_cache().set_on_evicted(move |key, value| {
            debug!("[{}] evicted {}", name, key);
            f(key, value);
        });
        self
    }

    /// Get the value for `key`, fetching it on a miss.
    ///
    /// Concurrent misses for the same key share one fetch.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidKey`: `key` is empty
    /// - Any error returned by the getter, delivered to every caller that shared the fetch.
    ///   Errors are not cached.
    pub async fn get(&self, key: &str) -> Result<V> {
        if key.is_empty() {
            return Err(Error::InvalidKey("key must not be empty".to_string()));
        }

        if let Some(value) = self.inner.lookup(key) {
            debug!("[{}] HIT {}", self.inner.config.name, key);
            return Ok(value);
        }
        debug!("[{}] MISS {}", self.inner.config.name, key);

        let inner = Arc::clone(&self.inner);
        let owned = key.to_string();
        self.inner
            .flights
            .call(key, move || async move { inner.load(&owned).await })
            .await
    }

    /// Look up `key` in the local cache only, without fetching.
    pub fn get_cached(&self, key: &str) -> Option<V> {
        self.inner.lookup(key)
    }

    /// Drop `key` from the local cache, returning its value.
    pub fn remove(&self, key: &str) -> Option<V> {
        let removed = self.inner.lock_cache().remove(key);
        if removed.is_some() {
            debug!("[{}] removed {}", self.inner.config.name, key);
        }
        removed
    }

    /// Purge the local cache. Fetches already in flight are unaffected.
    pub fn clear(&self) {
        self.inner.lock_cache().clear();
        warn!("[{}] cache cleared", self.inner.config.name);
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock_cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock_cache().is_empty()
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    pub fn getter(&self) -> &G {
        &self.inner.getter
    }
}

impl<V, G> Inner<V, G>
where
    V: Clone + Send + Sync + 'static,
    G: Getter<V>,
{
    fn lock_cache(&self) -> MutexGuard<'_, lru::Cache<String, V>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, key: &str) -> Option<V> {
        self.lock_cache().get(key).cloned()
    }

    /// Runs inside the flight for `key`.
    async fn load(&self, key: &str) -> Result<V> {
        if let Some(value) = self.lookup(key) {
            return Ok(value);
        }

        debug!("[{}] fetching {}", self.config.name, key);
        match self.getter.get(key).await {
            Ok(value) => {
                self.lock_cache().add(key.to_string(), value.clone());
                Ok(value)
            }
            Err(e) => {
                debug!("[{}] fetch for {} failed: {}", self.config.name, key, e);
                Err(e)
            }
        }
    }
}
