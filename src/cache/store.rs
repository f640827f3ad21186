//! Cache Store Module
//!
//! Concurrency-safe TTL cache: a HashMap guarded by a read-write lock.
//!
//! Reads (`get`, `count`, `ttl_remaining`) share the lock and never modify the
//! map: an expired entry is reported as absent but stays stored until
//! `sweep_expired` runs. Writes (`set`, `delete`, `sweep_expired`) are
//! exclusive.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheCounters, CacheEntry, CacheStats};

// == TTL Cache ==
/// In-memory cache with per-entry expiration.
///
/// Share it between tasks with `Arc<TtlCache<K, V>>`; every method takes
/// `&self` and goes through the internal lock.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    /// Key-value storage
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    /// Performance statistics
    counters: CacheCounters,
    /// TTL applied by `set_default`
    default_ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    // == Constructor ==
    /// Creates an empty cache.
    ///
    /// # Arguments
    /// * `default_ttl` - TTL used by [`set_default`](Self::set_default)
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            counters: CacheCounters::new(),
            default_ttl,
        }
    }

    /// Returns the TTL applied by `set_default`.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Set ==
    /// Stores a key-value pair that expires `ttl` from now.
    ///
    /// If the key already exists, the value is overwritten and the TTL reset.
    pub async fn set(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry::new(value, ttl);
        let mut entries = self.entries.write().await;
        entries.insert(key, entry);
    }

    /// Stores a key-value pair using the cache's default TTL.
    pub async fn set_default(&self, key: K, value: V) {
        self.set(key, value, self.default_ttl).await;
    }

    // == Get ==
    /// Retrieves a clone of the value if present and not expired.
    ///
    /// An expired entry is reported as absent but left in place for the
    /// sweeper, so this only ever takes the read lock.
    pub async fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                self.counters.record_expired_read();
                None
            }
            Some(entry) => {
                self.counters.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.counters.record_miss();
                None
            }
        }
    }

    // == Get Or Load ==
    /// Cache-aside lookup: returns the cached value, or awaits `loader`,
    /// stores its result under `ttl` and returns it.
    ///
    /// The lock is not held while `loader` runs, so concurrent misses on the
    /// same key may each call their loader; the last write wins.
    pub async fn get_or_load<F, Fut>(&self, key: K, ttl: Duration, loader: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(&key).await {
            return value;
        }

        let value = loader().await;
        self.set(key, value.clone(), ttl).await;
        value
    }

    // == Delete ==
    /// Removes an entry by key. Deleting an absent key is a no-op.
    ///
    /// Returns whether an entry (live or expired) was removed.
    pub async fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = self.entries.write().await;
        entries.remove(key).is_some()
    }

    // == Count ==
    /// Returns the physical number of entries, which may include expired
    /// entries the sweeper has not removed yet.
    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }

    // == Time To Live ==
    /// Returns the remaining TTL of a live entry.
    pub async fn ttl_remaining<Q>(&self, key: &Q) -> Option<Duration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(CacheEntry::ttl_remaining)
    }

    // == Sweep Expired ==
    /// Removes all expired entries from the cache under a single write lock.
    ///
    /// Returns the number of entries removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let before = entries.len();

        entries.retain(|_, entry| !entry.is_expired_at(now));

        let removed = before - entries.len();
        self.counters.record_swept(removed);
        debug!("Swept {} expired entries, {} remain", removed, entries.len());
        removed
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let total = self.count().await;
        self.counters.snapshot(total)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_secs(300);

    fn new_cache() -> TtlCache<String, String> {
        TtlCache::new(TTL)
    }

    #[tokio::test]
    async fn test_cache_new() {
        let cache = new_cache();
        assert_eq!(cache.count().await, 0);
        assert_eq!(cache.default_ttl(), TTL);
    }

    #[tokio::test]
    async fn test_cache_set_and_get() {
        let cache = new_cache();

        cache.set("key1".to_string(), "value1".to_string(), TTL).await;

        assert_eq!(cache.get("key1").await.as_deref(), Some("value1"));
        assert_eq!(cache.count().await, 1);
    }

    #[tokio::test]
    async fn test_cache_get_nonexistent() {
        let cache = new_cache();
        assert!(cache.get("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_delete() {
        let cache = new_cache();

        cache.set("key1".to_string(), "value1".to_string(), TTL).await;
        assert!(cache.delete("key1").await);

        assert_eq!(cache.count().await, 0);
        assert!(cache.get("key1").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_delete_is_idempotent() {
        let cache = new_cache();

        assert!(!cache.delete("nonexistent").await);
        assert!(!cache.delete("nonexistent").await);
    }

    #[tokio::test]
    async fn test_cache_overwrite() {
        let cache = new_cache();

        cache.set("key1".to_string(), "value1".to_string(), TTL).await;
        cache.set("key1".to_string(), "value2".to_string(), TTL).await;

        assert_eq!(cache.get("key1").await.as_deref(), Some("value2"));
        assert_eq!(cache.count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_ttl() {
        let cache = new_cache();
        let ttl = Duration::from_millis(100);

        cache.set("key1".to_string(), "value1".to_string(), ttl).await;
        advance(Duration::from_millis(80)).await;
        cache.set("key1".to_string(), "value2".to_string(), ttl).await;
        advance(Duration::from_millis(80)).await;

        assert_eq!(cache.get("key1").await.as_deref(), Some("value2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_hidden_but_not_removed() {
        let cache = new_cache();

        cache
            .set("key1".to_string(), "value1".to_string(), Duration::from_millis(100))
            .await;
        advance(Duration::from_millis(100)).await;

        assert!(cache.get("key1").await.is_none());
        assert_eq!(cache.count().await, 1, "Get must not remove the entry");

        let stats = cache.stats().await;
        assert_eq!(stats.expired_reads, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_is_immediately_expired() {
        let cache = new_cache();

        cache.set("key1".to_string(), "value1".to_string(), Duration::ZERO).await;

        assert!(cache.get("key1").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_remaining() {
        let cache = new_cache();

        cache
            .set("key1".to_string(), "value1".to_string(), Duration::from_secs(10))
            .await;
        advance(Duration::from_secs(3)).await;

        assert_eq!(cache.ttl_remaining("key1").await, Some(Duration::from_secs(7)));
        assert_eq!(cache.ttl_remaining("missing").await, None);

        advance(Duration::from_secs(7)).await;
        assert_eq!(cache.ttl_remaining("key1").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_expired() {
        let cache = new_cache();

        cache
            .set("key1".to_string(), "value1".to_string(), Duration::from_secs(1))
            .await;
        cache
            .set("key2".to_string(), "value2".to_string(), Duration::from_secs(10))
            .await;

        advance(Duration::from_millis(1100)).await;

        let removed = cache.sweep_expired().await;
        assert_eq!(removed, 1);
        assert_eq!(cache.count().await, 1);
        assert!(cache.get("key2").await.is_some());
        assert_eq!(cache.stats().await.swept, 1);
    }

    #[tokio::test]
    async fn test_set_default_uses_default_ttl() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));

        cache.set_default("answer", 42).await;

        let remaining = cache.ttl_remaining("answer").await.unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(59));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_load_loads_once_while_live() {
        let cache: TtlCache<String, String> = new_cache();
        let mut loads = 0;

        let first = cache
            .get_or_load("user:1".to_string(), Duration::from_secs(1), || {
                loads += 1;
                async { "Alice".to_string() }
            })
            .await;
        let second = cache
            .get_or_load("user:1".to_string(), Duration::from_secs(1), || {
                loads += 1;
                async { "Bob".to_string() }
            })
            .await;

        assert_eq!(first, "Alice");
        assert_eq!(second, "Alice");
        assert_eq!(loads, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_load_reloads_after_expiry() {
        let cache: TtlCache<String, String> = new_cache();

        cache
            .get_or_load("user:1".to_string(), Duration::from_secs(1), || async {
                "old".to_string()
            })
            .await;
        advance(Duration::from_secs(2)).await;
        let value = cache
            .get_or_load("user:1".to_string(), Duration::from_secs(1), || async {
                "new".to_string()
            })
            .await;

        assert_eq!(value, "new");
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let cache = new_cache();

        cache.set("key1".to_string(), "value1".to_string(), TTL).await;
        cache.get("key1").await; // hit
        cache.get("nonexistent").await; // miss

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }

    #[tokio::test]
    async fn test_set_with_max_ttl_succeeds() {
        let cache = new_cache();

        cache.set("key1".to_string(), "value1".to_string(), Duration::MAX).await;

        assert_eq!(cache.get("key1").await.as_deref(), Some("value1"));
        assert_eq!(cache.sweep_expired().await, 0);
    }
}
