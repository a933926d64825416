//! # Cache
//!
//! Set-if-absent keys with a TTL. Used for two things:
//!
//! - the full-catalog price lock (`woo_price_sync_lock`, 4 h)
//! - debouncing manual item triggers (`woo_price_manual_{item}`, 30 min;
//!   `woo_stock_manual_{item}`, 5 min)
//!
//! ```text
//!   acquire(key, ttl)
//!        │
//!        ├── key absent or expired ──► set, return true
//!        └── key present            ──► return false
//! ```
//!
//! Two backends: [`MemoryCache`] for a single worker process and
//! [`RedisCache`] (`SET key 1 NX EX ttl`) when several workers share keys.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::SyncResult;

/// Advisory, TTL-bounded keys.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Sets `key` unless it is already set. Returns whether this call set it.
    async fn acquire(&self, key: &str, ttl: Duration) -> SyncResult<bool>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn release(&self, key: &str) -> SyncResult<()>;

    /// True while `key` is set and not expired.
    async fn is_set(&self, key: &str) -> SyncResult<bool>;
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local cache. Expired keys are swept on every `acquire`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    /// key → expiry
    entries: Mutex<HashMap<String, Instant>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn acquire(&self, key: &str, ttl: Duration) -> SyncResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, expiry| *expiry > now);

        if entries.contains_key(key) {
            debug!(key, "Cache key already held");
            return Ok(false);
        }

        entries.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    async fn release(&self, key: &str) -> SyncResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn is_set(&self, key: &str) -> SyncResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            Some(expiry) if *expiry > now => Ok(true),
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

// =============================================================================
// Redis
// =============================================================================

/// Cache shared through Redis.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    /// Opens a client. No connection is made until the first call.
    pub fn open(url: &str) -> SyncResult<Self> {
        let client = redis::Client::open(url)?;
        Ok(RedisCache { client })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn acquire(&self, key: &str, ttl: Duration) -> SyncResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // SET NX: only set if the key does not exist
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    async fn release(&self, key: &str) -> SyncResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn is_set(&self, key: &str) -> SyncResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_is_exclusive_until_release() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);

        assert!(cache.acquire("woo_price_sync_lock", ttl).await.unwrap());
        assert!(!cache.acquire("woo_price_sync_lock", ttl).await.unwrap());
        assert!(cache.is_set("woo_price_sync_lock").await.unwrap());

        cache.release("woo_price_sync_lock").await.unwrap();
        assert!(!cache.is_set("woo_price_sync_lock").await.unwrap());
        assert!(cache.acquire("woo_price_sync_lock", ttl).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_expire() {
        let cache = MemoryCache::new();

        assert!(cache.acquire("k", Duration::from_secs(30)).await.unwrap());
        tokio::time::advance(Duration::from_secs(31)).await;

        assert!(!cache.is_set("k").await.unwrap());
        assert!(cache.acquire("k", Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_sweeps_expired_keys() {
        let cache = MemoryCache::new();
        for item in ["A", "B", "C"] {
            let key = format!("woo_stock_manual_{}", item);
            assert!(cache.acquire(&key, Duration::from_secs(300)).await.unwrap());
        }
        tokio::time::advance(Duration::from_secs(301)).await;

        assert!(cache.acquire("woo_stock_manual_D", Duration::from_secs(300)).await.unwrap());
        assert_eq!(cache.entries.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_release_of_absent_key() {
        let cache = MemoryCache::new();
        assert!(cache.release("missing").await.is_ok());
    }
}
