//! Cached content lookups
//!
//! `article:<id>` and `work:<id>` hold [`ContentSummary`] JSON. The store is
//! always the fallback, including when the cache itself is down.

use crate::config::CacheTtlConfig;
use crate::db::{ContentSource, ContentSummary};
use crate::error::Result;
use inkspace_cache::{aside, CacheKey, CacheOperations, ContentKind};
use std::sync::Arc;

pub struct ContentCache<C> {
    cache: C,
    source: Arc<dyn ContentSource>,
    ttls: CacheTtlConfig,
}

impl<C: CacheOperations> ContentCache<C> {
    pub fn new(cache: C, source: Arc<dyn ContentSource>, ttls: CacheTtlConfig) -> Self {
        Self {
            cache,
            source,
            ttls,
        }
    }

    fn ttl_secs(&self, kind: ContentKind) -> u64 {
        match kind {
            ContentKind::Article => self.ttls.article_secs,
            ContentKind::Work => self.ttls.work_secs,
        }
    }

    /// Published item by id; `None` if it does not exist or is not published.
    pub async fn fetch(&self, kind: ContentKind, id: i64) -> Result<Option<ContentSummary>> {
        let key = CacheKey::content(kind, id);
        let source = Arc::clone(&self.source);
        aside::get_or_load(&self.cache, &key, self.ttl_secs(kind), || async move {
            source.find_by_id(kind, id).await
        })
        .await
    }

    /// Drop the entity entry and every cached list of `kind`.
    pub async fn invalidate(&self, kind: ContentKind, id: i64) {
        aside::invalidate_content(&self.cache, kind, id).await;
    }
}
