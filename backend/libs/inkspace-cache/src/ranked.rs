//! Ranked sets stored as Redis sorted sets
//!
//! Members are content ids rendered as decimal strings, scores are the
//! popularity scores. Reads are always by descending score.

use crate::{CacheError, CacheResult};
use redis::AsyncCommands;
use redis_utils::RedisPool;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// One ranked member.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub content_id: i64,
    pub score: f64,
}

impl ScoredEntry {
    pub fn new(content_id: i64, score: f64) -> Self {
        Self { content_id, score }
    }
}

/// Sorted-set operations the ranking jobs and readers need.
///
/// An absent key reads as an empty range. For ranked keys that means "not
/// computed yet", never "nothing is popular".
#[async_trait::async_trait]
pub trait RankingStore: Send + Sync {
    /// Replace the whole set. Old members are dropped, `entries` written, and
    /// the expiry set to `ttl` (`None` leaves the key persistent).
    async fn replace(
        &self,
        key: &str,
        entries: &[ScoredEntry],
        ttl: Option<Duration>,
    ) -> CacheResult<()>;

    /// Members at ranks `start..=stop`, highest score first.
    async fn range(&self, key: &str, start: usize, stop: usize) -> CacheResult<Vec<ScoredEntry>>;

    /// Up to `limit` highest-scored members.
    async fn top(&self, key: &str, limit: usize) -> CacheResult<Vec<ScoredEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.range(key, 0, limit - 1).await
    }

    /// Cardinality; 0 for an absent key.
    async fn len(&self, key: &str) -> CacheResult<u64>;

    async fn score(&self, key: &str, content_id: i64) -> CacheResult<Option<f64>>;
}

/// Redis implementation of [`RankingStore`].
#[derive(Clone)]
pub struct RedisRankingStore {
    pool: RedisPool,
}

impl RedisRankingStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

fn parse_members(key: &str, raw: Vec<(String, f64)>) -> Vec<ScoredEntry> {
    raw.into_iter()
        .filter_map(|(member, score)| match member.parse::<i64>() {
            Ok(content_id) => Some(ScoredEntry { content_id, score }),
            Err(_) => {
                warn!(redis_key = %key, member = %member, "Skipping non-numeric ranked member");
                None
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl RankingStore for RedisRankingStore {
    async fn replace(
        &self,
        key: &str,
        entries: &[ScoredEntry],
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let members: Vec<(f64, String)> = entries
            .iter()
            .map(|e| (e.score, e.content_id.to_string()))
            .collect();

        // DEL + ZADD + EXPIRE in one MULTI so readers see old or new, not a mix.
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !members.is_empty() {
            pipe.zadd_multiple(key, &members).ignore();
            if let Some(ttl) = ttl {
                let secs = i64::try_from(ttl.as_secs().max(1)).map_err(|_| CacheError::OutOfRange {
                    key: key.to_string(),
                    what: "ttl",
                })?;
                pipe.expire(key, secs).ignore();
            }
        }

        let mut conn = self.pool.manager();
        pipe.query_async::<_, ()>(&mut conn).await?;

        debug!(
            redis_key = %key,
            members = members.len(),
            ttl_secs = ttl.map(|t| t.as_secs()),
            "Ranked set replaced"
        );
        Ok(())
    }

    async fn range(&self, key: &str, start: usize, stop: usize) -> CacheResult<Vec<ScoredEntry>> {
        if stop < start {
            return Ok(Vec::new());
        }
        let start = isize::try_from(start).map_err(|_| CacheError::OutOfRange {
            key: key.to_string(),
            what: "range start",
        })?;
        let stop = isize::try_from(stop).unwrap_or(isize::MAX);

        let mut conn = self.pool.manager();
        let raw: Vec<(String, f64)> = conn.zrevrange_withscores(key, start, stop).await?;
        Ok(parse_members(key, raw))
    }

    async fn len(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.pool.manager();
        let len: u64 = conn.zcard(key).await?;
        Ok(len)
    }

    async fn score(&self, key: &str, content_id: i64) -> CacheResult<Option<f64>> {
        let mut conn = self.pool.manager();
        let score: Option<f64> = conn.zscore(key, content_id.to_string()).await?;
        Ok(score)
    }
}
