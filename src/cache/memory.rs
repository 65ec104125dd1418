//! In-memory cache implementation using moka
//!
//! Each entry carries its own TTL. Pattern deletion uses moka's invalidation
//! closures, so it is applied lazily but takes effect for reads immediately.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// JSON-serialized value plus the TTL it was stored with
#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
    ttl: Duration,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
            ttl,
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// Expires every entry after the TTL it was inserted with
struct PerEntryTtl;

impl Expiry<String, CacheEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache using moka
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    /// Create a cache holding at most `max_capacity` entries
    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .support_invalidation_closures()
            .build();

        Self { cache, default_ttl }
    }

    /// TTL configured for this cache
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Return the cached value for `key`, or run `load`, cache its result
    /// with the default TTL and return it. Cache failures fall through to
    /// the loader.
    pub async fn get_or_load<T, F, Fut, E>(&self, key: &str, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, E>> + Send,
    {
        if let Ok(Some(hit)) = self.get::<T>(key).await {
            return Ok(hit);
        }
        let value = load().await?;
        if let Err(e) = self.set(key, &value, self.default_ttl).await {
            tracing::warn!(key, error = %e, "Failed to cache value");
        }
        Ok(value)
    }

    /// Glob-style match supporting `*` and `?`
    fn pattern_matches(pattern: &str, key: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        let key: Vec<char> = key.chars().collect();

        // Iterative matcher with single-star backtracking
        let (mut p, mut k) = (0, 0);
        let mut star: Option<(usize, usize)> = None;
        while k < key.len() {
            if p < pattern.len() && (pattern[p] == '?' || pattern[p] == key[k]) {
                p += 1;
                k += 1;
            } else if p < pattern.len() && pattern[p] == '*' {
                star = Some((p, k));
                p += 1;
            } else if let Some((sp, sk)) = star {
                p = sp + 1;
                k = sk + 1;
                star = Some((sp, sk + 1));
            } else {
                return false;
            }
        }
        pattern[p..].iter().all(|&c| c == '*')
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(value, ttl)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let pattern = pattern.to_string();
        self.cache
            .invalidate_entries_if(move |key, _| Self::pattern_matches(&pattern, key))
            .map_err(|e| anyhow::anyhow!("Failed to invalidate cache entries: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> MemoryCache {
        MemoryCache::with_capacity_and_ttl(100, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = cache();
        cache
            .set("categories:all", &vec!["Noticias", "Guías"], Duration::from_secs(60))
            .await
            .expect("set");

        let value: Option<Vec<String>> = cache.get("categories:all").await.expect("get");
        assert_eq!(value, Some(vec!["Noticias".to_string(), "Guías".to_string()]));

        cache.delete("categories:all").await.expect("delete");
        let value: Option<Vec<String>> = cache.get("categories:all").await.expect("get");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_its_ttl() {
        let cache = cache();
        cache
            .set("short", &1u32, Duration::from_millis(50))
            .await
            .expect("set");
        tokio::time::sleep(Duration::from_millis(150)).await;
        let value: Option<u32> = cache.get("short").await.expect("get");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_delete_pattern_only_hits_matching_keys() {
        let cache = cache();
        let ttl = cache.default_ttl();
        cache.set("tags:featured", &1u32, ttl).await.expect("set");
        cache.set("tags:other", &2u32, ttl).await.expect("set");
        cache.set("categories:all", &3u32, ttl).await.expect("set");

        cache.delete_pattern("tags:*").await.expect("delete");

        assert!(cache.get::<u32>("tags:featured").await.expect("get").is_none());
        assert!(cache.get::<u32>("tags:other").await.expect("get").is_none());
        assert_eq!(cache.get::<u32>("categories:all").await.expect("get"), Some(3));
    }

    #[tokio::test]
    async fn test_get_or_load_caches_result() {
        let cache = cache();
        let first: Result<u32, anyhow::Error> = cache.get_or_load("n", || async { Ok(7) }).await;
        assert_eq!(first.expect("load"), 7);

        let second: Result<u32, anyhow::Error> = cache
            .get_or_load("n", || async { Err(anyhow::anyhow!("loader must not run")) })
            .await;
        assert_eq!(second.expect("cached"), 7);
    }

    #[test]
    fn test_pattern_matches() {
        assert!(MemoryCache::pattern_matches("tags:*", "tags:featured"));
        assert!(MemoryCache::pattern_matches("tags:*", "tags:"));
        assert!(MemoryCache::pattern_matches("*:all", "categories:all"));
        assert!(MemoryCache::pattern_matches("user:?:x", "user:1:x"));
        assert!(!MemoryCache::pattern_matches("tags:*", "categories:all"));
        assert!(!MemoryCache::pattern_matches("user:?:x", "user:12:x"));
        assert!(MemoryCache::pattern_matches("*", ""));
    }
}
