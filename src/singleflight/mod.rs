//! Duplicate function call suppression.
//!
//! A group is a namespace of keys. While a call for a key is in flight, every other call for
//! that key waits for it and receives a clone of its result instead of running its own
//! function. Once the call completes the key is forgotten: there is no result caching here,
//! and a failed call is not remembered either.
//!
//! - [`Group`] is for blocking callers (threads).
//! - [`AsyncGroup`] is for async callers.
//!
//! Callers of one burst all receive clones of the same `Result`. Use `Arc<_>` for the value
//! or error type when they must share one instance.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

mod shared;

pub use shared::AsyncGroup;

/// The guarded data is only ever replaced wholesale, so a poisoned lock still holds a
/// consistent value.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum State<T, E> {
    Pending,
    Done(Result<T, E>),
    Panicked,
}

/// An in-flight call. Written once by the executing caller, then read by every waiter.
struct Call<T, E> {
    state: Mutex<State<T, E>>,
    done: Condvar,
}

impl<T: Clone, E: Clone> Call<T, E> {
    fn new() -> Self {
        Call {
            state: Mutex::new(State::Pending),
            done: Condvar::new(),
        }
    }

    fn finish(&self, state: State<T, E>) {
        *lock(&self.state) = state;
        self.done.notify_all();
    }

    fn wait(&self, key: &str) -> Result<T, E> {
        let state = self
            .done
            .wait_while(lock(&self.state), |state| matches!(state, State::Pending))
            .unwrap_or_else(PoisonError::into_inner);

        match &*state {
            State::Done(result) => result.clone(),
            State::Panicked => panic!("singleflight: in-flight call for key {:?} panicked", key),
            State::Pending => unreachable!("woken before the call finished"),
        }
    }
}

/// Group represents a class of work and forms a namespace in which units of work can be
/// executed with duplicate suppression.
///
/// # Example
///
/// ```
/// use flight_cache::singleflight::Group;
///
/// let group: Group<String, String> = Group::new();
/// let value = group.call("user:1", || Ok("alice".to_string()));
/// assert_eq!(value.as_deref(), Ok("alice"));
/// assert!(!group.is_in_flight("user:1"));
/// ```
pub struct Group<T, E> {
    calls: Mutex<HashMap<String, Arc<Call<T, E>>>>,
}

impl<T, E> Default for Group<T, E> {
    fn default() -> Self {
        Group {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone, E: Clone> Group<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute `f` and return its result, making sure only one execution is in flight for
    /// `key` at a time.
    ///
    /// If a call for `key` is already running, this blocks until it finishes and returns a
    /// clone of its result without running `f`. The group lock is never held while `f` runs,
    /// so other keys are not held up.
    ///
    /// There is no timeout: if the in-flight `f` never returns, neither do its waiters.
    ///
    /// # Panics
    ///
    /// If the in-flight `f` panics, the executing caller resumes the panic and every waiter of
    /// that burst panics as well. The key is released either way, so the next call runs
    /// fresh.
    pub fn call<F>(&self, key: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let mut calls = lock(&self.calls);
        if let Some(call) = calls.get(key) {
            let call = Arc::clone(call);
            drop(calls);
            debug!("singleflight: joining in-flight call for {}", key);
            return call.wait(key);
        }

        let call = Arc::new(Call::new());
        calls.insert(key.to_string(), Arc::clone(&call));
        drop(calls);

        let flight = Flight {
            group: self,
            key,
            call: &call,
            finished: false,
        };
        let result = f();
        flight.finish(result.clone());
        result
    }

    /// Whether a call for `key` is currently executing.
    pub fn is_in_flight(&self, key: &str) -> bool {
        lock(&self.calls).contains_key(key)
    }

    /// Number of keys with a call currently executing.
    pub fn in_flight(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of callers blocked on the in-flight call for `key`, not counting the one
    /// executing it.
    pub fn waiting(&self, key: &str) -> usize {
        // One reference is the map's, one the executing caller's.
        lock(&self.calls)
            .get(key)
            .map_or(0, |call| Arc::strong_count(call).saturating_sub(2))
    }
}

/// Releases the key when the executing caller is done with it, including by unwinding.
struct Flight<'a, T: Clone, E: Clone> {
    group: &'a Group<T, E>,
    key: &'a str,
    call: &'a Call<T, E>,
    finished: bool,
}

impl<T: Clone, E: Clone> Flight<'_, T, E> {
    fn finish(mut self, result: Result<T, E>) {
        self.call.finish(State::Done(result));
        self.finished = true;
    }
}

impl<T: Clone, E: Clone> Drop for Flight<'_, T, E> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("singleflight: call for {} panicked, releasing waiters", self.key);
            self.call.finish(State::Panicked);
        }
        lock(&self.group.calls).remove(self.key);
    }
}
