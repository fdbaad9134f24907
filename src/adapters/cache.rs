use crate::domain::ports::CacheStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Redis-backed cache using `GET` / `SETEX`.
#[derive(Clone)]
pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        tracing::info!("Connected to Redis cache");
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut connection = self.connection.clone();
        connection
            .set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await?;
        Ok(())
    }
}

/// Process-local cache with the same expiry semantics, for single-node
/// deployments and tests.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        let expired = match entries.get(key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => {
                return Ok(Some(value.clone()))
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let now = Instant::now();
        let expires_at = now + Duration::from_secs(ttl_seconds);
        let mut entries = self.entries.lock().await;
        // sweep on write so keys that are never read again do not pile up
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new();

        assert_eq!(cache.get("search:drone").await.unwrap(), None);
        cache.set("search:drone", "[]", 600).await.unwrap();
        assert_eq!(
            cache.get("search:drone").await.unwrap(),
            Some("[]".to_string())
        );
    }

    #[tokio::test]
    async fn test_memory_cache_overwrite_replaces_value() {
        let cache = MemoryCache::new();

        cache.set("k", "old", 600).await.unwrap();
        cache.set("k", "new", 600).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_memory_cache_entries_expire() {
        let cache = MemoryCache::new();

        cache.set("k", "v", 0).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_cache_sweeps_expired_keys_on_write() {
        let cache = MemoryCache::new();

        for i in 0..1000 {
            cache
                .set(&format!("search:query-{}", i), "[]", 0)
                .await
                .unwrap();
        }
        cache.set("search:live", "[]", 600).await.unwrap();

        assert_eq!(cache.len().await, 1);
        assert_eq!(
            cache.get("search:live").await.unwrap(),
            Some("[]".to_string())
        );
    }
}
