//! Basic usage example: a loader in front of a slow source.
//!
//! Run with: RUST_LOG=debug cargo run --example basic_usage

use flight_cache::getter::Getter;
use flight_cache::{CacheLoader, Error, LoaderConfig, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Example value: a user profile
#[derive(Clone, Serialize, Deserialize, Debug)]
struct Profile {
    id: String,
    display_name: String,
    followers: u64,
}

/// Mock source that simulates a slow remote lookup
struct ProfileSource {
    calls: AtomicUsize,
}

impl Getter<Arc<Profile>> for ProfileSource {
    fn get(&self, key: &str) -> impl Future<Output = Result<Arc<Profile>>> + Send {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let id = key.to_string();
        async move {
            println!("  [SOURCE] fetch #{} for {}", call, id);
            tokio::time::sleep(Duration::from_millis(250)).await;

            match id.as_str() {
                "alice" | "bob" | "carol" => Ok(Arc::new(Profile {
                    display_name: id.to_uppercase(),
                    followers: id.len() as u64 * 1000,
                    id,
                })),
                _ => Err(Error::NotFound(id)),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = LoaderConfig::from_json(r#"{"name": "profiles", "max_entries": 2}"#)?;
    println!("Config: {}", serde_json::to_string(&config)?);

    let loader = CacheLoader::new(
        config,
        ProfileSource {
            calls: AtomicUsize::new(0),
        },
    )?
    .with_on_evicted(|key, _profile| println!("  [EVICT] {}", key));

    // 1. A burst of concurrent misses for one key runs one fetch
    println!("\n=== Burst of 8 requests for alice ===");
    let started = Instant::now();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let loader = loader.clone();
            tokio::spawn(async move { loader.get("alice").await })
        })
        .collect();
    for handle in handles {
        let profile = handle.await.map_err(|e| Error::Other(e.to_string()))??;
        println!("  got {:?}", profile);
    }
    println!("  took {:?}", started.elapsed());

    // 2. Now it is cached
    println!("\n=== Cached lookup ===");
    let started = Instant::now();
    let profile = loader.get("alice").await?;
    let elapsed = started.elapsed();
    println!("  got {} in {:?}", serde_json::to_string(&*profile)?, elapsed);

    // 3. Errors are returned, not cached
    println!("\n=== Unknown user ===");
    match loader.get("mallory").await {
        Ok(p) => println!("  unexpected {:?}", p),
        Err(e) => println!("  error: {}", e),
    }

    // 4. Capacity 2: a third key evicts the least recently used
    println!("\n=== Fill past capacity ===");
    loader.get("bob").await?;
    loader.get("alice").await?;
    loader.get("carol").await?;
    println!("  cached entries: {}", loader.len());

    Ok(())
}
