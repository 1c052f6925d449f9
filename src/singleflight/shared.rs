//! Duplicate call suppression for async callers.
//!
//! Each in-flight call is a [`Shared`] future stored in a sharded [`DashMap`]. The first
//! caller for a key inserts it through the map's entry API and spawns a task that drives it to
//! completion; later callers clone it and await the same output. Map guards are never held
//! across an `.await`.
//!
//! The driver task removes the entry once the flight completes, and only if it still belongs
//! to the same burst. Callers are free to give up at any point (a `timeout`, an aborted task):
//! the fetch still completes exactly once and the key is released.
//!
//! A panic inside the flight is caught and stored as `None`, so the entry is released like
//! any other completion before the observers re-panic.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

type Flight<T, E> = Shared<BoxFuture<'static, Option<Result<T, E>>>>;

type Flights<T, E> = DashMap<String, Flight<T, E>>;

/// Async counterpart of [`super::Group`].
///
/// # Example
///
/// ```
/// use flight_cache::singleflight::AsyncGroup;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let group: AsyncGroup<u64, String> = AsyncGroup::new();
/// let value = group.call("answer", || async { Ok(42) }).await;
/// assert_eq!(value, Ok(42));
/// # }
/// ```
pub struct AsyncGroup<T, E> {
    flights: Arc<Flights<T, E>>,
}

impl<T, E> Default for AsyncGroup<T, E> {
    fn default() -> Self {
        AsyncGroup {
            flights: Arc::new(DashMap::new()),
        }
    }
}

impl<T, E> AsyncGroup<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the future produced by `f`, making sure only one is in flight for `key` at a time.
    ///
    /// Concurrent callers for `key` do not call `f`; they await the in-flight future and get a
    /// clone of its output. `f` itself is called while the key's shard is locked, so it should
    /// only build the future and leave the work to it.
    ///
    /// The future runs on its own Tokio task, so dropping every caller does not cancel it.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime. If the in-flight future panics, every caller
    /// awaiting it panics. The key is released so the next call starts over.
    pub async fn call<F, Fut>(&self, key: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (flight, started) = match self.flights.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                debug!("singleflight: joining in-flight call for {}", key);
                (entry.get().clone(), false)
            }
            Entry::Vacant(entry) => {
                let flight = AssertUnwindSafe(f())
                    .catch_unwind()
                    .map(|outcome| outcome.ok())
                    .boxed()
                    .shared();
                entry.insert(flight.clone());
                (flight, true)
            }
        };
        if started {
            drive(Arc::clone(&self.flights), key.to_string(), flight.clone());
        }

        let outcome = flight.clone().await;
        release(&self.flights, key, &flight);

        match outcome {
            Some(result) => result,
            None => {
                warn!("singleflight: call for {} panicked, key released", key);
                panic!("singleflight: in-flight call for key {:?} panicked", key)
            }
        }
    }

    /// Whether a call for `key` is currently in flight.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.flights.contains_key(key)
    }

    /// Number of keys with a call in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}

/// Poll `flight` to completion on the runtime, then release its key.
fn drive<T, E>(flights: Arc<Flights<T, E>>, key: String, flight: Flight<T, E>)
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        if flight.clone().await.is_none() {
            trace!("singleflight: driver for {} saw a panic", key);
        }
        release(&flights, &key, &flight);
    });
}

/// Remove the entry for `key` if it is still `flight`, not a later burst.
fn release<T, E>(flights: &Flights<T, E>, key: &str, flight: &Flight<T, E>)
where
    T: Clone,
    E: Clone,
{
    flights.remove_if(key, |_, current| current.ptr_eq(flight));
}
