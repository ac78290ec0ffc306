//! Result cache for completed detections.
//!
//! Results are stored as JSON text in a [`CacheStore`], so any string
//! key/value store with expiry can back it. Store failures never reach the
//! caller: a failed read is a miss and a failed write is logged and dropped.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use geo_common::GeoBounds;
use lru::LruCache;
use tracing::{debug, warn};

use crate::{error::CacheError, traits::CacheStore, types::ChangeDetectionResult};

/// How long a result stays valid after it is written
pub const CACHE_TTL: Duration = Duration::from_secs(3600);

/// Results kept by a [`MemoryStore`] unless configured otherwise
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// `change:<minX,minY,maxX,maxY>:<beforeDate>:<afterDate>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Exact-match key: bounds that differ by any amount are different keys
    pub fn new(bounds: &GeoBounds, before_date: &str, after_date: &str) -> Self {
        Self(format!("change:{bounds}:{before_date}:{after_date}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Outcome of a cache read; store errors are folded into `Miss`
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(Box<ChangeDetectionResult>),
    Miss,
}

/// Read-through/write-through wrapper over a [`CacheStore`]
#[derive(Debug)]
pub struct ResultCache<S> {
    store: S,
}

impl<S: CacheStore> ResultCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn lookup(&self, key: &CacheKey) -> CacheLookup {
        let payload = match self.store.get(key.as_str()).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return CacheLookup::Miss,
            Err(e) => {
                warn!("Cache read failed for {}, computing instead: {}", key.as_str(), e);
                return CacheLookup::Miss;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(result) => CacheLookup::Hit(Box::new(result)),
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key.as_str(), e);
                CacheLookup::Miss
            }
        }
    }

    /// Best-effort write with [`CACHE_TTL`]
    pub async fn put(&self, key: &CacheKey, result: &ChangeDetectionResult) {
        let payload = match serde_json::to_string(result) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Could not serialize result for {}: {}", key.as_str(), e);
                return;
            }
        };

        match self.store.set_ex(key.as_str(), payload, CACHE_TTL).await {
            Ok(()) => debug!("Cached {}", key.as_str()),
            Err(e) => warn!("Cache write failed for {}: {}", key.as_str(), e),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// In-process [`CacheStore`] with per-entry expiry, bounded by an LRU.
///
/// Concurrent writers to the same key are last-writer-wins. Expired entries
/// are dropped when read, from the least recently used end on every write,
/// and by [`MemoryStore::purge_expired`]. A full store evicts the least
/// recently used entry.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<LruCache<String, Entry>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_capacity_limit(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryStore {
    /// A store holding at most [`DEFAULT_MAX_ENTRIES`] results
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    /// Number of stored entries, expired ones included until reclaimed
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    fn write(&self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.lock();

        while entries
            .peek_lru()
            .is_some_and(|(_, entry)| entry.is_expired(now))
        {
            entries.pop_lru();
        }

        let entry = Entry {
            value,
            expires_at: now + ttl,
        };
        if let Some((evicted, _)) = entries.push(key.to_string(), entry) {
            if evicted != key {
                debug!("Evicted {} to make room for {}", evicted, key);
            }
        }
    }
}

impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.read(key))
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.write(key, value, ttl);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_result() -> ChangeDetectionResult {
        ChangeDetectionResult {
            change_percentage: 12.5,
            changed_areas: Vec::new(),
            before_image: vec![0xAA; 8],
            after_image: vec![0xBB; 8],
            difference_image: vec![0xCC; 8],
            timestamp: Utc::now(),
        }
    }

    /// Store whose backend is always down
    struct UnreachableStore;

    impl CacheStore for UnreachableStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn set_ex(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_key_format() {
        let bounds = GeoBounds::new(0.0, 0.0, 100.0, 100.0).unwrap();
        let key = CacheKey::new(&bounds, "2023-01-01", "2024-01-01");
        assert_eq!(key.as_str(), "change:0,0,100,100:2023-01-01:2024-01-01");

        let bounds = GeoBounds::new(6.95, 50.93, 6.96, 50.94).unwrap();
        let key = CacheKey::new(&bounds, "a", "b");
        assert_eq!(key.as_str(), "change:6.95,50.93,6.96,50.94:a:b");

        let bounds = GeoBounds::new(-0.0, 1e-7, 1.0, 1e21).unwrap();
        let key = CacheKey::new(&bounds, "a", "b");
        assert_eq!(key.as_str(), "change:0,1e-7,1,1e+21:a:b");
    }

    #[test]
    fn test_key_has_no_tolerance() {
        let a = GeoBounds::new(0.0, 0.0, 1.0, 1.0).unwrap();
        let b = GeoBounds::new(0.0, 0.0, 1.0 + f64::EPSILON, 1.0).unwrap();
        assert_ne!(CacheKey::new(&a, "x", "y"), CacheKey::new(&b, "x", "y"));
    }

    #[tokio::test]
    async fn test_round_trip_through_memory_store() {
        let cache = ResultCache::new(MemoryStore::new());
        let key = CacheKey::new(&GeoBounds::new(0.0, 0.0, 1.0, 1.0).unwrap(), "a", "b");

        assert_eq!(cache.lookup(&key).await, CacheLookup::Miss);

        let result = sample_result();
        cache.put(&key, &result).await;
        assert_eq!(cache.lookup(&key).await, CacheLookup::Hit(Box::new(result)));
    }

    #[tokio::test]
    async fn test_unreachable_store_degrades_to_miss() {
        let cache = ResultCache::new(UnreachableStore);
        let key = CacheKey::new(&GeoBounds::new(0.0, 0.0, 1.0, 1.0).unwrap(), "a", "b");

        // Neither call may panic or surface the error
        cache.put(&key, &sample_result()).await;
        assert_eq!(cache.lookup(&key).await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let store = MemoryStore::new();
        store.set_ex("change:k", "{not json".to_string(), CACHE_TTL).await.unwrap();

        let cache = ResultCache::new(store);
        let key = CacheKey("change:k".to_string());
        assert_eq!(cache.lookup(&key).await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemoryStore::new();
        store.set_ex("short", "1".to_string(), Duration::from_millis(20)).await.unwrap();
        store.set_ex("long", "2".to_string(), CACHE_TTL).await.unwrap();

        assert_eq!(store.get("short").await.unwrap().as_deref(), Some("1"));
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.get("long").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store.set_ex("b", "2".to_string(), CACHE_TTL).await.unwrap();
        store.set_ex("a", "1".to_string(), Duration::ZERO).await.unwrap();

        // "a" is the most recently used, so no write has reclaimed it yet
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let store = MemoryStore::new();
        store.set_ex("k", "first".to_string(), CACHE_TTL).await.unwrap();
        store.set_ex("k", "second".to_string(), CACHE_TTL).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_capacity_limit_evicts_least_recently_used() {
        let store = MemoryStore::with_capacity_limit(2);
        store.set_ex("a", "1".to_string(), CACHE_TTL).await.unwrap();
        store.set_ex("b", "2".to_string(), CACHE_TTL).await.unwrap();

        // Reading "a" makes "b" the eviction candidate
        assert!(store.get("a").await.unwrap().is_some());
        store.set_ex("c", "3".to_string(), CACHE_TTL).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("b").await.unwrap(), None);
        assert!(store.get("a").await.unwrap().is_some());
        assert!(store.get("c").await.unwrap().is_some());
    }

    #[test]
    fn test_default_store_is_bounded() {
        assert_eq!(MemoryStore::new().capacity(), DEFAULT_MAX_ENTRIES);
        assert_eq!(MemoryStore::with_capacity_limit(0).capacity(), 1);
    }

    #[tokio::test]
    async fn test_write_reclaims_expired_entries() {
        let store = MemoryStore::with_capacity_limit(2000);
        for i in 0..1000 {
            store
                .set_ex(&format!("stale-{i}"), "x".to_string(), Duration::from_millis(1))
                .await
                .unwrap();
        }
        assert_eq!(store.len(), 1000);

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.set_ex("fresh", "y".to_string(), CACHE_TTL).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("fresh").await.unwrap().as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn test_default_store_never_exceeds_capacity() {
        let store = MemoryStore::new();
        for i in 0..(DEFAULT_MAX_ENTRIES * 3) {
            store.set_ex(&format!("k{i}"), i.to_string(), CACHE_TTL).await.unwrap();
        }
        assert_eq!(store.len(), DEFAULT_MAX_ENTRIES);
        assert!(store.get("k0").await.unwrap().is_none());
    }
}
