//! Result cache with per-entry lifetimes and LRU eviction.
//!
//! Each entry carries its own expiry, so a result can be kept for as long as
//! its status warrants. When the cache is full, expired entries are dropped
//! first and then the least recently accessed entry is evicted.

use crate::types::DomainInfo;
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Default interval of the background expiry sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Default maximum number of entries.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Cache of check results keyed by `domain:<name>`.
pub type DomainCache = Cache<DomainInfo>;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

struct CacheInner<V> {
    /// Recency order is kept by the LRU list itself
    entries: LruCache<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

impl<V> CacheInner<V> {
    fn remove_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.pop(key);
        }
        expired.len()
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_items: usize,
    pub expired_items: usize,
    pub valid_items: usize,
    pub hits: u64,
    pub misses: u64,
    /// Hits as a percentage of lookups; 0 when there were none
    pub hit_rate: f64,
    pub capacity: usize,
    pub default_ttl_secs: u64,
}

/// Thread-safe TTL + LRU cache.
pub struct Cache<V> {
    inner: Mutex<CacheInner<V>>,
    capacity: NonZeroUsize,
    default_ttl: Duration,
}

impl<V> std::fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.capacity)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl<V: Clone> Cache<V> {
    /// Create a cache; a capacity of zero is treated as one.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
            capacity,
            default_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store a value for the default lifetime.
    pub fn set(&self, key: &str, value: V) {
        self.set_with_duration(key, value, self.default_ttl);
    }

    /// Store a value for an explicit lifetime, overwriting any existing entry.
    pub fn set_with_duration(&self, key: &str, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut inner = self.lock();

        if !inner.entries.contains(key) && inner.entries.len() >= self.capacity.get() {
            inner.remove_expired(now);
            if inner.entries.len() >= self.capacity.get() {
                if let Some((evicted, _)) = inner.entries.pop_lru() {
                    debug!(key = %evicted, "evicted least recently used cache entry");
                }
            }
        }

        inner.entries.push(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    /// Fetch an unexpired value, refreshing its recency.
    ///
    /// Expired entries are removed on access and count as misses.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;

        let found = inner
            .entries
            .get(key)
            .map(|entry| (!entry.is_expired(now)).then(|| entry.value.clone()));

        match found {
            Some(Some(value)) => {
                inner.hits += 1;
                Some(value)
            }
            Some(None) => {
                inner.entries.pop(key);
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Time left before `key` expires, without touching recency or counters.
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let inner = self.lock();
        inner
            .entries
            .peek(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Remove one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().entries.pop(key).is_some()
    }

    /// Remove every entry and reset the hit/miss counters.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of all stored entries, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        self.lock()
            .entries
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.lock().remove_expired(Instant::now())
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let inner = self.lock();
        let total_items = inner.entries.len();
        let expired_items = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .count();
        let lookups = inner.hits + inner.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            inner.hits as f64 / lookups as f64 * 100.0
        };

        CacheStats {
            total_items,
            expired_items,
            valid_items: total_items - expired_items,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate,
            capacity: self.capacity.get(),
            default_ttl_secs: self.default_ttl.as_secs(),
        }
    }
}

impl<V: Clone + Send + 'static> Cache<V> {
    /// Spawn a task that sweeps expired entries every `period`.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.sweep_expired();
                if removed > 0 {
                    debug!(removed, "swept expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test(start_paused = true)]
    async fn test_get_respects_ttl() {
        let cache: Cache<u32> = Cache::new(10, HOUR);
        cache.set_with_duration("a", 1, Duration::from_secs(60));

        assert_eq!(cache.get("a"), Some(1));
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0, "expired entry is removed on access");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_eviction_evicts_least_recently_accessed() {
        let cache: Cache<u32> = Cache::new(3, HOUR);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        // touch "a" so "b" becomes the least recently accessed
        assert_eq!(cache.get("a"), Some(1));

        cache.set("d", 4);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.get("d"), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_lookup_does_not_refresh_recency() {
        let cache: Cache<u32> = Cache::new(2, HOUR);
        cache.set("a", 1);
        cache.set("b", 2);

        assert!(cache.remaining_ttl("a").is_some());
        let _ = cache.stats();

        cache.set("c", 3);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.keys(), vec!["c".to_string(), "b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_capacity_holds_one_entry() {
        let cache: Cache<u32> = Cache::new(0, HOUR);
        assert_eq!(cache.capacity(), 1);
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_at_capacity_does_not_evict() {
        let cache: Cache<u32> = Cache::new(2, HOUR);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cache_prefers_dropping_expired_entries() {
        let cache: Cache<u32> = Cache::new(2, HOUR);
        cache.set_with_duration("short", 1, Duration::from_secs(5));
        cache.set("long", 2);
        tokio::time::advance(Duration::from_secs(10)).await;

        cache.set("new", 3);
        assert_eq!(cache.get("long"), Some(2));
        assert_eq!(cache.get("new"), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_and_sweep() {
        let cache: Cache<u32> = Cache::new(10, HOUR);
        cache.set_with_duration("a", 1, Duration::from_secs(5));
        cache.set("b", 2);
        tokio::time::advance(Duration::from_secs(6)).await;

        let stats = cache.stats();
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.expired_items, 1);
        assert_eq!(stats.valid_items, 1);
        assert_eq!(stats.capacity, 10);
        assert_eq!(stats.default_ttl_secs, 3600);

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.keys(), vec!["b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper() {
        let cache = Arc::new(Cache::<u32>::new(10, HOUR));
        cache.set_with_duration("a", 1, Duration::from_secs(60));
        let handle = cache.spawn_sweeper(SWEEP_INTERVAL);

        tokio::time::sleep(SWEEP_INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(cache.len(), 0);

        drop(cache);
        tokio::time::sleep(SWEEP_INTERVAL * 2).await;
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_clear_and_remaining_ttl() {
        let cache: Cache<u32> = Cache::new(10, HOUR);
        cache.set_with_duration("a", 1, Duration::from_secs(300));
        assert_eq!(cache.remaining_ttl("a"), Some(Duration::from_secs(300)));
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));

        cache.set("b", 2);
        let _ = cache.get("b");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 0);
    }
}
