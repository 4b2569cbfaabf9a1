//! Bounded, time-expiring cache of query embeddings.
//!
//! Keys are the query text truncated to [`MAX_KEY_CHARS`] characters. The cache
//! is an explicit LRU list behind a single mutex, so eviction order is
//! deterministic under concurrent access: a hit moves the entry to the
//! most-recent end and an insert beyond capacity drops the least recent one.
//! Expiry is checked lazily on lookup against the entry's last access.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::debug;

pub const MAX_KEY_CHARS: usize = 4096;

pub fn normalize_key(text: &str) -> String {
    text.chars().take(MAX_KEY_CHARS).collect()
}

struct Entry {
    vector: Vec<f32>,
    last_access: Instant,
}

pub struct QueryEmbeddingCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl QueryEmbeddingCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)), ttl }
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.get_at(text, Instant::now())
    }

    pub fn set(&self, text: &str, vector: Vec<f32>) {
        self.set_at(text, vector, Instant::now());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn get_at(&self, text: &str, now: Instant) -> Option<Vec<f32>> {
        let key = normalize_key(text);
        let mut entries = self.entries.lock();
        let fresh = match entries.peek(&key) {
            None => return None,
            Some(entry) => now.saturating_duration_since(entry.last_access) <= self.ttl,
        };
        if !fresh {
            entries.pop(&key);
            debug!(key_len = key.len(), "embedding cache entry expired");
            return None;
        }
        let entry = entries.get_mut(&key)?;
        entry.last_access = now;
        Some(entry.vector.clone())
    }

    fn set_at(&self, text: &str, vector: Vec<f32>, now: Instant) {
        let key = normalize_key(text);
        let mut entries = self.entries.lock();
        if let Some((evicted, _)) = entries.push(key.clone(), Entry { vector, last_access: now }) {
            if evicted != key {
                debug!(size = entries.len(), "embedding cache evicted least recently used entry");
            }
        }
    }
}
