//! Integration tests for flight-cache
//!
//! These tests drive the primitives the way a cache fill path does: look up the LRU, coalesce
//! the fetch on a miss, insert the result.

use flight_cache::lru::Cache;
use flight_cache::singleflight::Group;
use flight_cache::{CacheLoader, Error, FnGetter, InMemoryGetter, LoaderConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The miss path composed by hand from the two primitives.
struct FillPath {
    cache: Mutex<Cache<String, Arc<String>>>,
    group: Group<Arc<String>, Error>,
    fetches: AtomicUsize,
    /// Callers the next fetch waits for before it runs.
    hold_for: AtomicUsize,
}

impl FillPath {
    fn new(max_entries: usize) -> Self {
        FillPath {
            cache: Mutex::new(Cache::new(max_entries)),
            group: Group::new(),
            fetches: AtomicUsize::new(0),
            hold_for: AtomicUsize::new(0),
        }
    }

    /// Make the next fetch hold its key until `waiters` other callers are blocked on it.
    fn holding(self, waiters: usize) -> Self {
        self.hold_for.store(waiters, Ordering::SeqCst);
        self
    }

    fn get(&self, key: &str) -> Result<Arc<String>, Error> {
        if let Some(v) = self.cache.lock().unwrap().get(key) {
            return Ok(Arc::clone(v));
        }
        self.group.call(key, || {
            if let Some(v) = self.cache.lock().unwrap().get(key) {
                return Ok(Arc::clone(v));
            }
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let hold_for = self.hold_for.swap(0, Ordering::SeqCst);
            while self.group.waiting(key) < hold_for {
                thread::sleep(Duration::from_millis(1));
            }
            thread::sleep(Duration::from_millis(10));
            if key.starts_with("bad") {
                return Err(Error::GetterError(format!("cannot fetch {}", key)));
            }
            let value = Arc::new(format!("value of {}", key));
            self.cache
                .lock()
                .unwrap()
                .add(key.to_string(), Arc::clone(&value));
            Ok(value)
        })
    }
}

/// Test 1: Thundering herd on one key
///
/// Many threads miss the same key at once:
/// - exactly one fetch happens
/// - every thread gets the same instance
/// - the cache holds the value afterwards
#[test]
fn test_thundering_herd_single_fetch() {
    init_logging();
    let path = Arc::new(FillPath::new(16).holding(15));
    let start = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let path = Arc::clone(&path);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                path.get("hot").expect("fetch should succeed")
            })
        })
        .collect();

    let values: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(path.fetches.load(Ordering::SeqCst), 1);
    assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    assert_eq!(*values[0], "value of hot");
    assert_eq!(path.cache.lock().unwrap().len(), 1);
    assert!(!path.group.is_in_flight("hot"));
}

/// Test 2: Failing fetch
///
/// A failing fetch runs once for the whole burst and reaches every coalesced caller. Nothing
/// is cached, and the next call fetches again.
#[test]
fn test_failed_fetch_is_not_memoized() {
    init_logging();
    let path = Arc::new(FillPath::new(16).holding(7));
    let start = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let path = Arc::clone(&path);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                path.get("bad-key")
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(
            handle.join().unwrap(),
            Err(Error::GetterError("cannot fetch bad-key".to_string()))
        );
    }
    assert_eq!(path.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(path.cache.lock().unwrap().len(), 0);

    assert!(path.get("bad-key").is_err());
    assert_eq!(path.fetches.load(Ordering::SeqCst), 2);
}

/// Test 3: Distinct keys proceed independently and respect capacity
#[test]
fn test_distinct_keys_fill_bounded_cache() {
    init_logging();
    let path = Arc::new(FillPath::new(4));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let path = Arc::clone(&path);
            thread::spawn(move || path.get(&format!("key-{}", i)).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(path.fetches.load(Ordering::SeqCst), 8);
    assert_eq!(path.cache.lock().unwrap().len(), 4);
    assert_eq!(path.group.in_flight(), 0);
}

/// Test 4: Loader end to end
///
/// - miss fetches and populates
/// - hit is served locally
/// - remove forces a refetch
#[tokio::test]
async fn test_loader_end_to_end() {
    init_logging();
    let mut getter = InMemoryGetter::new();
    getter.insert("user:1", "Alice".to_string());
    getter.insert("user:2", "Bob".to_string());

    let loader = CacheLoader::new(LoaderConfig::default().with_name("users"), getter)
        .expect("valid config");

    assert_eq!(loader.get("user:1").await.unwrap(), "Alice");
    assert_eq!(loader.get("user:1").await.unwrap(), "Alice");
    assert_eq!(loader.getter().fetches(), 1);

    assert_eq!(loader.get("user:2").await.unwrap(), "Bob");
    assert_eq!(loader.len(), 2);

    assert_eq!(loader.remove("user:1"), Some("Alice".to_string()));
    assert_eq!(loader.get("user:1").await.unwrap(), "Alice");
    assert_eq!(loader.getter().fetches(), 3);

    assert_eq!(
        loader.get("user:3").await,
        Err(Error::NotFound("user:3".to_string()))
    );
}

/// Test 5: Loader under a multi-threaded runtime
///
/// Concurrent tasks on several worker threads miss the same keys; each key is fetched once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_loader_coalesces_across_workers() {
    init_logging();
    let fetches = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fetches);
    let getter = FnGetter::new(move |key: String| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, Error>(Arc::new(key.to_uppercase()))
        }
    });
    let loader = CacheLoader::new(LoaderConfig::default(), getter).unwrap();

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let loader = loader.clone();
            let key = if i % 2 == 0 { "even" } else { "odd" };
            tokio::spawn(async move { (key, loader.get(key).await.unwrap()) })
        })
        .collect();

    let mut evens = Vec::new();
    for handle in handles {
        let (key, value) = handle.await.unwrap();
        assert_eq!(*value, key.to_uppercase());
        if key == "even" {
            evens.push(value);
        }
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 2);
    assert!(evens.iter().all(|v| Arc::ptr_eq(v, &evens[0])));
    assert_eq!(loader.len(), 2);
}

/// Test 6: Loader from JSON configuration with a small capacity
#[tokio::test]
async fn test_loader_from_json_config() {
    init_logging();
    let config = LoaderConfig::from_json(r#"{"name": "tiny", "max_entries": 1}"#).unwrap();
    let getter = FnGetter::new(|key: String| async move { Ok::<_, Error>(key.len()) });
    let loader = CacheLoader::new(config, getter).unwrap();

    assert_eq!(loader.get("a").await, Ok(1));
    assert_eq!(loader.get("bb").await, Ok(2));

    assert_eq!(loader.len(), 1);
    assert_eq!(loader.get_cached("a"), None);
    assert_eq!(loader.get_cached("bb"), Some(2));
    assert_eq!(loader.name(), "tiny");
}
