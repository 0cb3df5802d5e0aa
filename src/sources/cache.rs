//! Per-source response cache with absolute TTL.
//!
//! Keys are the canonical JSON form of a parameter object: object keys are
//! sorted recursively and null fields dropped, so two logically identical
//! parameter sets map to the same entry regardless of how they were built.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub stored_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

/// In-memory map owned by one source client. The mutex is never held across
/// an `.await`; reads and writes are single short critical sections.
///
/// Expired entries are dropped when read, and `insert` sweeps the whole map
/// at most once per TTL, so keys that are never asked for again do not pile up.
#[derive(Debug)]
pub struct ResponseCache<T> {
    ttl: Duration,
    inner: Mutex<Entries<T>>,
}

#[derive(Debug)]
struct Entries<T> {
    map: HashMap<String, CacheEntry<T>>,
    last_sweep: Instant,
}

impl<T> Entries<T> {
    fn sweep(&mut self, now: Instant, ttl: Duration) {
        if now.saturating_duration_since(self.last_sweep) < ttl {
            return;
        }
        self.map.retain(|_, entry| entry.is_fresh(now, ttl));
        self.last_sweep = now;
    }
}

impl<T: Clone> ResponseCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Entries {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `key`, if any. Expired entries are evicted on read.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.map.get(key) {
            Some(entry) if entry.is_fresh(now, self.ttl) => Some(entry.data.clone()),
            Some(_) => {
                entries.map.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, data: T) {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.sweep(now, self.ttl);
        entries.map.insert(
            key,
            CacheEntry {
                data,
                stored_at: now,
            },
        );
    }

    /// Stored entries, expired ones included until the next sweep.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().map.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Entries<T>> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

/// Deterministic cache key for a parameter object.
pub fn cache_key<P: Serialize>(params: &P) -> String {
    match serde_json::to_value(params) {
        Ok(v) => canonicalize(v).to_string(),
        // Parameter structs are plain data; fall back to an always-distinct key.
        Err(e) => format!("unserializable:{e}"),
    }
}

fn canonicalize(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
