//! Trending list reads
//!
//! Pages through a ranked set and hydrates the ids from the store. An absent
//! or empty ranked set means "not computed yet", so the reader serves the
//! newest published items instead and says so.

use crate::db::{ContentSource, ContentSummary};
use crate::error::Result;
use inkspace_cache::{CacheKey, ContentKind, RankWindow, RankingStore, ScoredEntry};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSource {
    /// Served from the ranked set
    Ranked,
    /// Ranked set unavailable, served newest-first from the store
    NotReady,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingItem {
    #[serde(flatten)]
    pub content: ContentSummary,
    /// Ranking score; absent on the fallback path
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingPage {
    pub items: Vec<TrendingItem>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub source: PageSource,
}

/// Clamp a 1-based page request into (page, page_size).
pub fn normalize_page(page: u32, page_size: u32) -> (u32, u32) {
    let page = page.max(1);
    let page_size = match page_size {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    };
    (page, page_size)
}

pub struct TrendingReader {
    source: Arc<dyn ContentSource>,
    store: Arc<dyn RankingStore>,
}

impl TrendingReader {
    pub fn new(source: Arc<dyn ContentSource>, store: Arc<dyn RankingStore>) -> Self {
        Self { source, store }
    }

    pub async fn page(
        &self,
        kind: ContentKind,
        window: RankWindow,
        page: u32,
        page_size: u32,
    ) -> Result<TrendingPage> {
        let (page, page_size) = normalize_page(page, page_size);
        let key = CacheKey::ranking(kind, window);
        let start = ((page - 1) as usize) * page_size as usize;
        let stop = start + page_size as usize - 1;

        let total = match self.store.len(&key).await {
            Ok(0) => {
                debug!(redis_key = %key, "Ranked set not ready, serving latest");
                return self.latest(kind, page, page_size).await;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(redis_key = %key, error = %e, "Ranked set unreadable, serving latest");
                return self.latest(kind, page, page_size).await;
            }
        };

        let entries = match self.store.range(&key, start, stop).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(redis_key = %key, error = %e, "Ranked range unreadable, serving latest");
                return self.latest(kind, page, page_size).await;
            }
        };

        let items = self.hydrate(kind, &entries).await?;
        Ok(TrendingPage {
            items,
            total,
            page,
            page_size,
            source: PageSource::Ranked,
        })
    }

    /// Load ranked ids from the store, keep rank order, drop unpublished ones.
    async fn hydrate(&self, kind: ContentKind, entries: &[ScoredEntry]) -> Result<Vec<TrendingItem>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = entries.iter().map(|e| e.content_id).collect();
        let mut by_id: HashMap<i64, ContentSummary> = self
            .source
            .find_published(kind, &ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let items: Vec<TrendingItem> = entries
            .iter()
            .filter_map(|entry| {
                by_id.remove(&entry.content_id).map(|content| TrendingItem {
                    content,
                    score: Some(entry.score),
                })
            })
            .collect();

        if items.len() < entries.len() {
            debug!(
                kind = %kind,
                ranked = entries.len(),
                hydrated = items.len(),
                "Some ranked items are no longer published"
            );
        }
        Ok(items)
    }

    async fn latest(&self, kind: ContentKind, page: u32, page_size: u32) -> Result<TrendingPage> {
        let offset = i64::from(page - 1) * i64::from(page_size);
        let content = self
            .source
            .latest_published(kind, offset, i64::from(page_size))
            .await?;
        let total = self.source.count_published(kind).await?;

        Ok(TrendingPage {
            items: content
                .into_iter()
                .map(|content| TrendingItem {
                    content,
                    score: None,
                })
                .collect(),
            total,
            page,
            page_size,
            source: PageSource::NotReady,
        })
    }
}
