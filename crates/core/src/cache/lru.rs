//! Fixed-capacity least-recently-used cache.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// Default number of entries kept by [`LruCache::default`].
pub const DEFAULT_MAXSIZE: usize = 100;

/// Index of the sentinel node in the arena.
const ROOT: usize = 0;

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

struct Node<K, V> {
    prev: usize,
    next: usize,
    entry: Option<(K, V)>,
}

/// List state guarded by the cache mutex.
///
/// Nodes live in an index arena. Node 0 is the sentinel root of a circular
/// doubly-linked list: `root.next` is the least recently used entry and
/// `root.prev` the most recently used one.
struct Inner<K, V> {
    map: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    hits: u64,
    misses: u64,
}

impl<K, V> Inner<K, V> {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            nodes: vec![Node {
                prev: ROOT,
                next: ROOT,
                entry: None,
            }],
            hits: 0,
            misses: 0,
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    /// Link `idx` just before the root, making it the most recently used.
    fn push_back(&mut self, idx: usize) {
        let last = self.nodes[ROOT].prev;
        self.nodes[idx].prev = last;
        self.nodes[idx].next = ROOT;
        self.nodes[last].next = idx;
        self.nodes[ROOT].prev = idx;
    }

    fn promote(&mut self, idx: usize) {
        self.unlink(idx);
        self.push_back(idx);
    }
}

/// Thread-safe LRU cache with O(1) `get` and `put`.
///
/// The cache is not self-populating: a miss never inserts anything. Every
/// operation holds one mutex for its whole duration.
pub struct LruCache<K, V> {
    maxsize: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache holding at most `maxsize` entries.
    pub fn new(maxsize: usize) -> Self {
        Self {
            maxsize,
            inner: Mutex::new(Inner::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`, promoting it to most recently used on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        match inner.map.get(key).copied() {
            Some(idx) => {
                inner.promote(idx);
                inner.hits += 1;
                inner.nodes[idx].entry.as_ref().map(|(_, v)| v.clone())
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Like [`get`](Self::get) but returns `default` on a miss.
    pub fn get_or(&self, key: &K, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Look up `key` without promoting it or touching the counters.
    pub fn peek(&self, key: &K) -> Option<V> {
        let inner = self.lock();
        let idx = *inner.map.get(key)?;
        inner.nodes[idx].entry.as_ref().map(|(_, v)| v.clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().map.contains_key(key)
    }

    /// Insert or update `key`, evicting the least recently used entry when
    /// the cache is full.
    pub fn put(&self, key: K, value: V) {
        if self.maxsize == 0 {
            return;
        }
        let mut inner = self.lock();

        if let Some(idx) = inner.map.get(&key).copied() {
            if let Some(entry) = inner.nodes[idx].entry.as_mut() {
                entry.1 = value;
            }
            inner.promote(idx);
            return;
        }

        if inner.map.len() >= self.maxsize {
            // Reuse the oldest node for the new entry.
            let oldest = inner.nodes[ROOT].next;
            if let Some((old_key, _)) = inner.nodes[oldest].entry.take() {
                inner.map.remove(&old_key);
            }
            inner.nodes[oldest].entry = Some((key.clone(), value));
            inner.map.insert(key, oldest);
            inner.promote(oldest);
            return;
        }

        let idx = inner.nodes.len();
        inner.nodes.push(Node {
            prev: ROOT,
            next: ROOT,
            entry: Some((key.clone(), value)),
        });
        inner.push_back(idx);
        inner.map.insert(key, idx);
    }

    /// Drop all entries. Counters are kept.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let (hits, misses) = (inner.hits, inner.misses);
        *inner = Inner::new();
        inner.hits = hits;
        inner.misses = misses;
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.maxsize
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            len: inner.map.len(),
            capacity: self.maxsize,
        }
    }

    /// Keys ordered from least to most recently used.
    pub fn keys(&self) -> Vec<K> {
        let inner = self.lock();
        let mut keys = Vec::with_capacity(inner.map.len());
        let mut idx = inner.nodes[ROOT].next;
        while idx != ROOT {
            if let Some((k, _)) = inner.nodes[idx].entry.as_ref() {
                keys.push(k.clone());
            }
            idx = inner.nodes[idx].next;
        }
        keys
    }
}

impl<K, V> Default for LruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_MAXSIZE)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_put_get() {
        let cache = LruCache::default();
        cache.put("1".to_string(), "one".to_string());
        cache.put("two".to_string(), "2".to_string());
        cache.put("THREE".to_string(), "three".to_string());

        assert_eq!(cache.get(&"1".to_string()), Some("one".to_string()));
        assert_eq!(cache.get(&"two".to_string()), Some("2".to_string()));
        assert_eq!(cache.get(&"THREE".to_string()), Some("three".to_string()));
        assert_eq!(cache.get(&"4".to_string()), None);
    }

    #[test]
    fn test_get_or_default_on_miss() {
        let cache: LruCache<u32, &str> = LruCache::new(4);
        assert_eq!(cache.get_or(&7, "fallback"), "fallback");
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let cache = LruCache::new(10);
        for i in 0..11 {
            cache.put(i, i.to_string());
        }
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.get(&0), None);
        for i in 1..11 {
            assert_eq!(cache.get(&i), Some(i.to_string()));
        }
    }

    #[test]
    fn test_get_promotes_entry() {
        let cache = LruCache::new(10);
        for i in 0..10 {
            cache.put(i, i.to_string());
        }
        for i in 0..10 {
            assert_eq!(cache.get(&i), Some(i.to_string()));
        }
        assert_eq!(cache.get(&0), Some("0".to_string()));

        cache.put(10, "10".to_string());

        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&0), Some("0".to_string()));
        for i in 2..11 {
            assert_eq!(cache.get(&i), Some(i.to_string()));
        }
    }

    #[test]
    fn test_two_slot_scenario() {
        let cache = LruCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.put("c", 3);

        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"a"));
        assert!(cache.contains(&"c"));
    }

    #[test]
    fn test_put_existing_updates_and_promotes() {
        let cache = LruCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("a", 10);
        cache.put("c", 3);

        assert_eq!(cache.peek(&"a"), Some(10));
        assert_eq!(cache.peek(&"b"), None);
        assert_eq!(cache.keys(), vec!["a", "c"]);
    }

    #[test]
    fn test_peek_does_not_promote() {
        let cache = LruCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.peek(&"a"), Some(1));
        cache.put("c", 3);

        assert!(!cache.contains(&"a"));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_stats_and_clear() {
        let cache = LruCache::new(3);
        cache.put(1, 1);
        cache.get(&1);
        cache.get(&2);
        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.len, 0);
        assert_eq!(stats.capacity, 3);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = LruCache::new(0);
        cache.put(1, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_never_exceeds_capacity_under_mixed_access() {
        let cache = LruCache::new(5);
        for i in 0..200u32 {
            cache.put(i % 13, i);
            if i % 3 == 0 {
                cache.get(&(i % 7));
            }
            assert!(cache.len() <= 5);
        }
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(LruCache::new(16));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..500u32 {
                        cache.put((t, i % 32), i);
                        cache.get(&(t, (i + 1) % 32));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 16);
    }
}
