//! Bounded least-recently-used cache.
//!
//! Entries live in a `Vec` arena linked into a doubly-linked recency list by index, and a
//! `HashMap` maps each key to its arena slot. Moving an entry to the front and dropping the
//! back are both O(1); nothing ever scans the list. Vacated slots are recycled through a free
//! list.
//!
//! The cache is **not** synchronized. Share it behind a `Mutex` (as [`crate::CacheLoader`]
//! does) or keep it on one thread.
//!
//! # Example
//!
//! ```
//! use flight_cache::lru::Cache;
//! use std::sync::{Arc, Mutex};
//!
//! let evicted = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&evicted);
//!
//! let mut cache = Cache::new(2).with_on_evicted(move |key: &'static str, value: i32| {
//!     sink.lock().unwrap().push((key, value));
//! });
//!
//! cache.add("a", 1);
//! cache.add("b", 2);
//! cache.add("c", 3); // over capacity, "a" goes
//!
//! assert_eq!(cache.get("a"), None);
//! assert_eq!(cache.len(), 2);
//! assert_eq!(*evicted.lock().unwrap(), vec![("a", 1)]);
//! ```

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Null link in the recency list.
const NIL: usize = usize::MAX;

type EvictFn<K, V> = Box<dyn FnMut(K, V) + Send>;

struct Node<K, V> {
    /// `None` while the slot sits on the free list.
    entry: Option<(K, V)>,
    prev: usize,
    next: usize,
}

/// An LRU cache. It is not safe for concurrent access.
///
/// `max_entries == 0` means no limit; eviction is then left to the caller
/// (see [`Cache::remove_oldest`]).
///
/// The eviction callback runs for capacity eviction, [`Cache::remove_oldest`] and
/// [`Cache::clear`]. It does not run for [`Cache::remove`] or when [`Cache::add`] replaces the
/// value of an existing key.
pub struct Cache<K, V> {
    max_entries: usize,
    on_evicted: Option<EvictFn<K, V>>,
    map: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    free: Vec<usize>,
    /// Most recently used.
    head: usize,
    /// Least recently used.
    tail: usize,
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("max_entries", &self.max_entries)
            .field("len", &self.map.len())
            .field("on_evicted", &self.on_evicted.is_some())
            .finish()
    }
}

impl<K: Hash + Eq + Clone, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<K: Hash + Eq + Clone, V> Cache<K, V> {
    /// Create an empty cache holding at most `max_entries` entries (0 = unbounded).
    ///
    /// Nothing is allocated until the first insert.
    pub fn new(max_entries: usize) -> Self {
        Cache {
            max_entries,
            on_evicted: None,
            map: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    /// Set the eviction callback.
    pub fn with_on_evicted<F>(mut self, f: F) -> Self
    where
        F: FnMut(K, V) + Send + 'static,
    {
        self.set_on_evicted(f);
        self
    }

    /// Replace the eviction callback.
    pub fn set_on_evicted<F>(&mut self, f: F)
    where
        F: FnMut(K, V) + Send + 'static,
    {
        self.on_evicted = Some(Box::new(f));
    }

    /// Drop the eviction callback; evicted entries are simply dropped afterwards.
    pub fn clear_on_evicted(&mut self) {
        self.on_evicted = None;
    }

    /// Configured capacity (0 = unbounded).
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Add a value, making it the most recently used entry.
    ///
    /// If the key is already present its value is replaced and the old value returned; the
    /// size does not change. A new key that pushes the cache over `max_entries` evicts the
    /// least recently used entry.
    pub fn add(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&idx) = self.map.get(&key) {
            self.move_to_front(idx);
            return self.nodes[idx]
                .entry
                .as_mut()
                .map(|(_, old)| std::mem::replace(old, value));
        }

        let idx = self.alloc(key.clone(), value);
        self.push_front(idx);
        self.map.insert(key, idx);

        if self.max_entries != 0 && self.map.len() > self.max_entries {
            self.remove_oldest();
        }
        None
    }

    /// Look up a key's value, marking it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.nodes[idx].entry.as_ref().map(|(_, v)| v)
    }

    /// Look up a key's value without touching its recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.nodes[idx].entry.as_ref().map(|(_, v)| v)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Remove a key, returning its value. The eviction callback is not called.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.remove_node(idx).map(|(_, v)| v)
    }

    /// Remove the least recently used entry, handing it to the eviction callback.
    ///
    /// Returns `false` if the cache was empty.
    pub fn remove_oldest(&mut self) -> bool {
        if self.tail == NIL {
            return false;
        }
        match self.remove_node(self.tail) {
            Some((key, value)) => {
                trace!("lru: evicted oldest entry, {} left", self.map.len());
                if let Some(on_evicted) = self.on_evicted.as_mut() {
                    on_evicted(key, value);
                }
                true
            }
            None => false,
        }
    }

    /// The least recently used entry, without touching its recency.
    pub fn oldest(&self) -> Option<(&K, &V)> {
        if self.tail == NIL {
            return None;
        }
        self.nodes[self.tail].entry.as_ref().map(|(k, v)| (k, v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Purge every entry, handing each one to the eviction callback, and reset to the empty
    /// state.
    pub fn clear(&mut self) {
        let nodes = std::mem::take(&mut self.nodes);
        self.map = HashMap::new();
        self.free = Vec::new();
        self.head = NIL;
        self.tail = NIL;

        if let Some(on_evicted) = self.on_evicted.as_mut() {
            for (key, value) in nodes.into_iter().filter_map(|node| node.entry) {
                on_evicted(key, value);
            }
        }
    }

    /// Iterate from most to least recently used without touching recency.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: &self.nodes,
            cursor: self.head,
            remaining: self.map.len(),
        }
    }

    // ------------------------------------------------------------------------
    // Arena and list bookkeeping
    // ------------------------------------------------------------------------

    fn alloc(&mut self, key: K, value: V) -> usize {
        let node = Node {
            entry: Some((key, value)),
            prev: NIL,
            next: NIL,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);

        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }

        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head == NIL {
            self.tail = idx;
        } else {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head != idx {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    /// Unlink a slot, drop its key from the map and recycle it.
    fn remove_node(&mut self, idx: usize) -> Option<(K, V)> {
        self.unlink(idx);
        let (key, value) = self.nodes[idx].entry.take()?;
        self.map.remove(&key);
        self.free.push(idx);
        Some((key, value))
    }
}

/// Iterator over cache entries, most recently used first. See [`Cache::iter`].
pub struct Iter<'a, K, V> {
    nodes: &'a [Node<K, V>],
    cursor: usize,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let node = &self.nodes[self.cursor];
        self.cursor = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        node.entry.as_ref().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
