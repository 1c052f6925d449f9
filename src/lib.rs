//! # flight-cache
//!
//! The local miss path of an in-process lookup cache.
//!
//! ## Building Blocks
//!
//! - **[`lru::Cache`]:** Bounded, recency-ordered key/value store with an eviction callback.
//!   Not synchronized; wrap it in a lock when sharing it.
//! - **[`singleflight::Group`]:** Duplicate call suppression for blocking callers. Concurrent
//!   calls for one key run the function once and share its result.
//! - **[`singleflight::AsyncGroup`]:** The same guarantee for async callers.
//! - **[`CacheLoader`]:** Both primitives composed: look up, coalesce the fetch on a miss,
//!   insert, return.
//!
//! ## Quick Start
//!
//! ### Using the primitives directly
//!
//! ```
//! use flight_cache::lru::Cache;
//! use flight_cache::singleflight::Group;
//! use std::sync::Mutex;
//!
//! let cache: Mutex<Cache<String, u64>> = Mutex::new(Cache::new(128));
//! let group: Group<u64, String> = Group::new();
//!
//! let key = "answer";
//! let hit = cache.lock().unwrap().get(key).copied();
//! let value = match hit {
//!     Some(v) => v,
//!     None => {
//!         let v = group.call(key, || Ok::<_, String>(42))?;
//!         cache.lock().unwrap().add(key.to_string(), v);
//!         v
//!     }
//! };
//! assert_eq!(value, 42);
//! # Ok::<(), String>(())
//! ```
//!
//! ### Using the loader
//!
//! ```ignore
//! use flight_cache::{CacheLoader, FnGetter, LoaderConfig};
//!
//! let getter = FnGetter::new(|key: String| async move {
//!     // fetch from a peer, a database, ...
//!     Ok(format!("value for {}", key))
//! });
//!
//! let loader = CacheLoader::new(LoaderConfig::default().with_max_entries(10_000), getter)?;
//! let value = loader.get("user:42").await?;
//! ```

#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod getter;
pub mod loader;
pub mod lru;
pub mod singleflight;

// Re-exports for convenience
pub use config::LoaderConfig;
pub use error::{Error, Result};
pub use getter::{FnGetter, Getter, InMemoryGetter};
pub use loader::CacheLoader;
pub use lru::Cache;
pub use singleflight::{AsyncGroup, Group};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
