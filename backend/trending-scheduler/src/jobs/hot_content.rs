//! Hot list generator
//!
//! Reads the counter projection of every published item of one kind, scores
//! it, and replaces `hot:<kind>:zset` with the top K.
//!
//! The key expires at twice the refresh interval, so a missed run or two
//! leaves the previous list readable instead of a gap.

use super::{ScheduledTask, TaskContext};
use crate::clock::Clock;
use crate::db::ContentSource;
use crate::metrics::job_metrics::helpers::record_ranked_entries;
use crate::scoring::{score, select_top_k};
use anyhow::{Context, Result};
use async_trait::async_trait;
use inkspace_cache::{CacheKey, ContentKind, RankWindow, RankingStore, ScoredEntry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct HotContentConfig {
    pub kind: ContentKind,
    pub top_k: usize,
    pub interval: Duration,
}

impl HotContentConfig {
    pub fn articles(top_k: usize, interval: Duration) -> Self {
        Self {
            kind: ContentKind::Article,
            top_k,
            interval,
        }
    }

    pub fn works(top_k: usize, interval: Duration) -> Self {
        Self {
            kind: ContentKind::Work,
            top_k,
            interval,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.interval * 2
    }
}

pub struct HotContentTask {
    config: HotContentConfig,
    name: String,
    key: String,
    source: Arc<dyn ContentSource>,
    store: Arc<dyn RankingStore>,
    clock: Arc<dyn Clock>,
}

impl HotContentTask {
    pub fn new(
        config: HotContentConfig,
        source: Arc<dyn ContentSource>,
        store: Arc<dyn RankingStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: format!("hot_{}", config.kind.plural()),
            key: CacheKey::ranking(config.kind, RankWindow::Hot),
            config,
            source,
            store,
            clock,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Score everything and publish. Returns the number of entries written,
    /// 0 when there was nothing eligible and the existing list was kept.
    pub async fn refresh(&self, ctx: &TaskContext) -> Result<usize> {
        let start = Instant::now();
        let kind = self.config.kind;

        let items = self
            .source
            .published_counters(kind)
            .await
            .with_context(|| format!("failed to load published {kind}"))?;

        if items.is_empty() {
            info!(
                correlation_id = %ctx.correlation_id,
                redis_key = %self.key,
                "No published content, keeping existing hot list"
            );
            return Ok(0);
        }

        let now = self.clock.now();
        let scored: Vec<ScoredEntry> = items
            .iter()
            .map(|item| ScoredEntry::new(item.id, score(kind, item, now)))
            .collect();
        let eligible = scored.len();
        let top = select_top_k(scored, self.config.top_k);

        debug!(
            correlation_id = %ctx.correlation_id,
            eligible,
            selected = top.len(),
            "Scored content"
        );

        self.store
            .replace(&self.key, &top, Some(self.config.ttl()))
            .await
            .with_context(|| format!("failed to publish {}", self.key))?;

        record_ranked_entries(&self.key, top.len());
        info!(
            correlation_id = %ctx.correlation_id,
            redis_key = %self.key,
            eligible,
            published = top.len(),
            ttl_sec = self.config.ttl().as_secs(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Hot list refreshed"
        );

        Ok(top.len())
    }
}

#[async_trait]
impl ScheduledTask for HotContentTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &TaskContext) -> Result<()> {
        self.refresh(ctx).await.map(|_| ())
    }
}
