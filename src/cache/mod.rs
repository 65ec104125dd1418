//! Cache layer
//!
//! Process-local caching of read-mostly data (category list, featured
//! tags). Values are stored as JSON so any serializable type fits.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bitacora::cache::{create_cache, CacheLayer};
//! use bitacora::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("categories:all", &categories, cache.default_ttl()).await?;
//! cache.delete_pattern("tags:*").await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache layer trait
///
/// The methods are generic over the cached type, so the trait is used
/// through concrete types rather than as `dyn CacheLayer`.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values whose key matches a glob pattern (`*`, `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;
}

/// Shared cache handle stored in application state
pub type SharedCache = Arc<MemoryCache>;

/// Create the cache from configuration
pub fn create_cache(config: &CacheConfig) -> SharedCache {
    Arc::new(MemoryCache::with_capacity_and_ttl(
        config.max_entries,
        Duration::from_secs(config.ttl_seconds),
    ))
}

/// Cache keys used across services
pub mod keys {
    pub const CATEGORIES: &str = "categories:all";
    pub const FEATURED_TAGS: &str = "tags:featured";
    pub const TAGS_PATTERN: &str = "tags:*";
}
