//! TTL read-through cache
//!
//! 基于 moka future cache。每个条目携带自己的 TTL，由 [`EntryExpiry`] 读取；
//! 同 key 的并发计算通过 `try_get_with` 合并为一次（single-flight），
//! 计算失败不写入缓存。

use std::future::Future;
use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::policy::Expiry;
use tracing::debug;

use crate::errors::Result;

#[derive(Clone)]
struct Entry<V> {
    value: V,
    ttl: Duration,
}

/// 按条目 TTL 过期
struct EntryExpiry;

impl<V> Expiry<String, Entry<V>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

pub struct TtlCache<V> {
    inner: Cache<String, Entry<V>>,
    default_ttl: Duration,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();

        debug!(
            "TtlCache initialized with max capacity: {}, default TTL: {}s",
            max_capacity,
            default_ttl.as_secs()
        );
        Self { inner, default_ttl }
    }

    pub fn from_config(config: &crate::config::CacheConfig) -> Self {
        Self::new(config.max_capacity, Duration::from_secs(config.default_ttl))
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 命中直接返回；未命中时执行 `producer` 并以 `ttl` 缓存结果
    ///
    /// 同 key 的并发调用者共享同一次计算。
    pub async fn get_or_compute<Fut>(&self, key: &str, ttl: Duration, producer: Fut) -> Result<V>
    where
        Fut: Future<Output = Result<V>>,
    {
        self.inner
            .try_get_with(key.to_string(), async move {
                producer.await.map(|value| Entry { value, ttl })
            })
            .await
            .map(|entry| entry.value)
            .map_err(|e| (*e).clone())
    }

    /// 删除旧值后重新计算
    pub async fn refresh<Fut>(&self, key: &str, ttl: Duration, producer: Fut) -> Result<V>
    where
        Fut: Future<Output = Result<V>>,
    {
        self.delete(key).await;
        self.get_or_compute(key, ttl, producer).await
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    pub async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    /// 删除所有以 `prefix` 开头的条目，返回删除数量
    pub async fn invalidate_pattern(&self, prefix: &str) -> usize {
        let keys: Vec<String> = self
            .inner
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.as_ref().clone())
            .collect();

        for key in &keys {
            self.inner.invalidate(key).await;
        }

        if !keys.is_empty() {
            debug!("Invalidated {} cache entries under '{}'", keys.len(), prefix);
        }
        keys.len()
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
