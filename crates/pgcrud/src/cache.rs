//! Read-through result cache with expiry.
//!
//! Entries live in per-table buckets keyed by the request hash key. Writes to
//! a table drop its whole bucket, since a changed row can appear in any cached
//! query of that table.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::value::Record;

/// What [`CacheStore::delete`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Only the given key.
    Key,
    /// Every key of the table.
    Table,
}

/// Key-value cache for read results.
pub trait CacheStore: Send + Sync {
    fn get(&self, table: &str, key: &str) -> Option<Vec<Record>>;

    fn set(&self, table: &str, key: &str, value: Vec<Record>, ttl: Duration);

    fn delete(&self, table: &str, key: &str, mode: DeleteMode);
}

#[derive(Debug)]
struct Entry {
    value: Vec<Record>,
    expires_at: Instant,
}

#[derive(Debug)]
struct MemoryCacheInner {
    capacity: usize,
    buckets: HashMap<String, HashMap<String, Entry>>,
    order: VecDeque<(String, String)>,
}

/// In-process [`CacheStore`].
#[derive(Debug)]
pub struct MemoryCache {
    inner: Mutex<MemoryCacheInner>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MemoryCache {
    /// A cache holding at most `capacity` entries across all tables.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryCacheInner {
                capacity,
                buckets: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryCacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().buckets.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MemoryCacheInner {
    fn remove(&mut self, table: &str, key: &str) {
        if let Some(bucket) = self.buckets.get_mut(table) {
            bucket.remove(key);
            if bucket.is_empty() {
                self.buckets.remove(table);
            }
        }
        if let Some(pos) = self.order.iter().position(|(t, k)| t == table && k == key) {
            let _ = self.order.remove(pos);
        }
    }

    fn remove_table(&mut self, table: &str) {
        self.buckets.remove(table);
        self.order.retain(|(t, _)| t != table);
    }

    fn evict_if_needed(&mut self) {
        if self.capacity == 0 {
            self.buckets.clear();
            self.order.clear();
            return;
        }

        while self.order.len() > self.capacity {
            let Some((table, key)) = self.order.pop_front() else {
                break;
            };
            if let Some(bucket) = self.buckets.get_mut(&table) {
                bucket.remove(&key);
                if bucket.is_empty() {
                    self.buckets.remove(&table);
                }
            }
        }
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, table: &str, key: &str) -> Option<Vec<Record>> {
        let mut inner = self.lock();
        let entry = inner.buckets.get(table)?.get(key)?;
        if entry.expires_at > Instant::now() {
            return Some(entry.value.clone());
        }
        inner.remove(table, key);
        None
    }

    fn set(&self, table: &str, key: &str, value: Vec<Record>, ttl: Duration) {
        let mut inner = self.lock();
        inner.remove(table, key);
        inner.buckets.entry(table.to_string()).or_default().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        inner.order.push_back((table.to_string(), key.to_string()));
        inner.evict_if_needed();
    }

    fn delete(&self, table: &str, key: &str, mode: DeleteMode) {
        let mut inner = self.lock();
        match mode {
            DeleteMode::Key => inner.remove(table, key),
            DeleteMode::Table => inner.remove_table(table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{FieldValue, record};

    fn rows(name: &str) -> Vec<Record> {
        vec![record([("name", FieldValue::from(name))])]
    }

    #[test]
    fn set_then_get() {
        let cache = MemoryCache::default();
        cache.set("users", "k1", rows("ada"), Duration::from_secs(60));
        assert_eq!(cache.get("users", "k1"), Some(rows("ada")));
        assert_eq!(cache.get("users", "k2"), None);
        assert_eq!(cache.get("roles", "k1"), None);
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = MemoryCache::default();
        cache.set("users", "k1", rows("ada"), Duration::ZERO);
        assert_eq!(cache.get("users", "k1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn delete_by_key_and_table() {
        let cache = MemoryCache::default();
        cache.set("users", "k1", rows("ada"), Duration::from_secs(60));
        cache.set("users", "k2", rows("bob"), Duration::from_secs(60));
        cache.set("roles", "k1", rows("r"), Duration::from_secs(60));

        cache.delete("users", "k1", DeleteMode::Key);
        assert_eq!(cache.get("users", "k1"), None);
        assert!(cache.get("users", "k2").is_some());

        cache.delete("users", "", DeleteMode::Table);
        assert_eq!(cache.get("users", "k2"), None);
        assert!(cache.get("roles", "k1").is_some());
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let cache = MemoryCache::new(2);
        cache.set("t", "a", rows("a"), Duration::from_secs(60));
        cache.set("t", "b", rows("b"), Duration::from_secs(60));
        cache.set("t", "c", rows("c"), Duration::from_secs(60));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("t", "a"), None);
        assert!(cache.get("t", "c").is_some());
    }

    #[test]
    fn safe_across_threads() {
        let cache = std::sync::Arc::new(MemoryCache::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let key = format!("k{i}");
                    cache.set("t", &key, rows("x"), Duration::from_secs(60));
                    cache.get("t", &key).is_some()
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(cache.len(), 4);
    }
}
