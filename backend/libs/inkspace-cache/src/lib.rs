//! Inkspace caching layer
//!
//! Two concerns share one Redis:
//! - cache-aside entries for content lookups (`article:<id>`, list caches),
//!   which are always optional accelerators in front of PostgreSQL
//! - ranked sorted sets published by the trending jobs (`hot:*`, `rank:*`)
//!
//! Pattern invalidation uses SCAN, never KEYS.

mod error;
mod keys;
mod metrics;

pub mod aside;
pub mod ranked;

pub use error::{CacheError, CacheResult};
pub use keys::{CacheKey, ContentKind, RankWindow};
pub use metrics::CacheMetrics;
pub use ranked::{RankingStore, RedisRankingStore, ScoredEntry};

use redis::{AsyncCommands, Pipeline};
use redis_utils::RedisPool;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

/// Default TTL values (seconds)
pub mod ttl {
    pub const ARTICLE: u64 = 3600; // 1 hour
    pub const WORK: u64 = 3600; // 1 hour
    pub const USER: u64 = 1800; // 30 minutes
    pub const LIST: u64 = 300; // 5 minutes
}

/// Core cache operations trait
///
/// `get` returns `Ok(None)` both for keys that never existed and for keys
/// that expired; callers cannot and must not tell the two apart.
#[async_trait::async_trait]
pub trait CacheOperations: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> CacheResult<Option<T>>;

    /// Set a value in cache with TTL. A TTL of zero stores without expiry.
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> CacheResult<()>;

    /// Delete a key from cache
    async fn del(&self, key: &str) -> CacheResult<()>;

    /// Delete every key matching a glob; returns how many were removed
    async fn scan_del(&self, pattern: &str) -> CacheResult<usize>;
}

/// Redis-backed cache client
#[derive(Clone)]
pub struct InkCache {
    pool: RedisPool,
    metrics: CacheMetrics,
}

impl InkCache {
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            metrics: CacheMetrics::new(),
        }
    }

    /// Add 0-10% jitter to TTL so entries written together do not expire together
    fn add_jitter(ttl_secs: u64) -> u64 {
        let jitter_percent = (rand::random::<u32>() % 10) as f64 / 100.0;
        let jitter = (ttl_secs as f64 * jitter_percent).round() as u64;
        ttl_secs + jitter
    }
}

#[async_trait::async_trait]
impl CacheOperations for InkCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> CacheResult<Option<T>> {
        let mut conn = self.pool.manager();

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(data)) => match serde_json::from_str::<T>(&data) {
                Ok(value) => {
                    debug!(key = %key, "Cache hit");
                    self.metrics.record_hit(key);
                    Ok(Some(value))
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache deserialization failed, dropping entry");
                    self.metrics.record_error(key, "deserialize");
                    let _ = conn.del::<_, ()>(key).await;
                    Ok(None)
                }
            },
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                self.metrics.record_miss(key);
                Ok(None)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Redis get error");
                self.metrics.record_error(key, "redis");
                Err(CacheError::Redis(e))
            }
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> CacheResult<()> {
        let data = serde_json::to_string(value).map_err(|e| {
            self.metrics.record_error(key, "serialize");
            CacheError::Serialization(e)
        })?;

        let mut conn = self.pool.manager();
        if ttl_secs == 0 {
            conn.set::<_, _, ()>(key, data).await?;
            debug!(key = %key, "Cache set without expiry");
        } else {
            let ttl_with_jitter = Self::add_jitter(ttl_secs);
            conn.set_ex::<_, _, ()>(key, data, ttl_with_jitter).await?;
            debug!(key = %key, ttl = ttl_with_jitter, "Cache set");
        }

        self.metrics.record_write(key);
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.pool.manager();
        let removed: usize = conn.del(key).await?;

        debug!(key = %key, removed, "Cache delete");
        self.metrics.record_invalidation(key, removed);
        Ok(())
    }

    async fn scan_del(&self, pattern: &str) -> CacheResult<usize> {
        let mut conn = self.pool.manager();
        let mut cursor: u64 = 0;
        let mut total_deleted = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let mut pipe = Pipeline::new();
                for key in &keys {
                    pipe.del(key).ignore();
                }
                pipe.query_async::<_, ()>(&mut conn).await?;

                total_deleted += keys.len();
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, deleted = total_deleted, "Cache scan delete");
        self.metrics.record_invalidation(pattern, total_deleted);
        Ok(total_deleted)
    }
}
