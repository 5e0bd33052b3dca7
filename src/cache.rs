//! Injected result caching for fleet aggregations.
//!
//! The core functions never see a cache. The service consults one before
//! recomputing and stores what it computed; a hit within the TTL must equal
//! what a miss would produce.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::defaults::RESULT_CACHE_TTL_SECS;

/// Minimal cache contract the service depends on.
pub trait ResultCache<K, V>: Send + Sync {
    /// Cached value, if present and not expired.
    fn get(&self, key: &K) -> Option<V>;

    /// Store a value, replacing any previous entry.
    fn put(&self, key: K, value: V);

    /// Drop every entry (config reload, source refresh).
    fn invalidate_all(&self);
}

/// In-memory cache with a fixed time-to-live per entry.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K, V> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new(Duration::from_secs(RESULT_CACHE_TTL_SECS))
    }
}

impl<K, V> ResultCache<K, V> for TtlCache<K, V>
where
    K: Eq + Hash + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: K, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            // Evict stale entries so the map stays bounded by live queries
            let ttl = self.ttl;
            entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
            entries.insert(key, (Instant::now(), value));
        }
    }

    fn invalidate_all(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl<K, V> ResultCache<K, V> for NoCache {
    fn get(&self, _key: &K) -> Option<V> {
        None
    }

    fn put(&self, _key: K, _value: V) {}

    fn invalidate_all(&self) {}
}
