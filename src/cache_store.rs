use crate::errors::AppError;
use crate::knowledge::Cache;
use async_trait::async_trait;
use moka::Expiry;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CachedValue {
    payload: String,
    ttl: Duration,
}

/// Expiry policy reading the TTL stored with each entry.
struct PerEntryTtl;

impl Expiry<String, CachedValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process fast cache with per-entry expiry.
#[derive(Clone)]
pub struct MokaCache {
    inner: moka::future::Cache<String, CachedValue>,
}

impl MokaCache {
    pub fn new(max_capacity: u64) -> Self {
        let inner = moka::future::Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { inner }
    }
}

#[async_trait]
impl Cache for MokaCache {
    async fn set_with_expiry(
        &self,
        key: &str,
        value: String,
        ttl_seconds: u64,
    ) -> Result<(), AppError> {
        self.inner
            .insert(
                key.to_string(),
                CachedValue {
                    payload: value,
                    ttl: Duration::from_secs(ttl_seconds),
                },
            )
            .await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.inner.get(key).await.map(|v| v.payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MokaCache::new(100);
        cache
            .set_with_expiry("lead:1", "payload".to_string(), 3600)
            .await
            .unwrap();

        assert_eq!(cache.get("lead:1").await.unwrap(), Some("payload".to_string()));
        assert_eq!(cache.get("lead:2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entry_expires_after_its_ttl() {
        let cache = MokaCache::new(100);
        cache
            .set_with_expiry("short", "a".to_string(), 1)
            .await
            .unwrap();
        cache
            .set_with_expiry("long", "b".to_string(), 3600)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get("long").await.unwrap(), Some("b".to_string()));
    }
}
