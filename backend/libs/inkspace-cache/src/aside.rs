//! Cache-aside helpers
//!
//! The cache is never a source of truth here. Every failure talking to it is
//! logged and treated as a miss so the caller falls through to the loader.

use crate::{CacheKey, CacheOperations, ContentKind};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use tracing::warn;

/// Read `key` through the cache, loading and storing on miss.
///
/// A loader result of `None` is returned as-is and not cached, so a later
/// insert becomes visible on the next read. Errors from the loader propagate;
/// errors from the cache never do.
pub async fn get_or_load<C, T, F, Fut, E>(
    cache: &C,
    key: &str,
    ttl_secs: u64,
    loader: F,
) -> Result<Option<T>, E>
where
    C: CacheOperations,
    T: Serialize + DeserializeOwned + Send + Sync,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    match cache.get::<T>(key).await {
        Ok(Some(hit)) => return Ok(Some(hit)),
        Ok(None) => {}
        Err(e) if e.is_unavailable() => {
            warn!(key = %key, error = %e, "Cache unavailable, loading from source")
        }
        Err(e) => {
            // Unreadable entry; drop it so the fill below replaces it.
            warn!(key = %key, error = %e, "Cache read failed, loading from source");
            invalidate(cache, key).await;
        }
    }

    let loaded = loader().await?;
    if let Some(value) = &loaded {
        if let Err(e) = cache.set(key, value, ttl_secs).await {
            warn!(key = %key, error = %e, "Cache fill failed");
        }
    }
    Ok(loaded)
}

/// Remove one key. Failures are logged and swallowed.
pub async fn invalidate<C: CacheOperations>(cache: &C, key: &str) {
    if let Err(e) = cache.del(key).await {
        warn!(key = %key, error = %e, "Cache invalidation failed");
    }
}

/// Remove every key matching `pattern`; returns the number removed, 0 on failure.
pub async fn invalidate_pattern<C: CacheOperations>(cache: &C, pattern: &str) -> usize {
    match cache.scan_del(pattern).await {
        Ok(n) => n,
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Cache pattern invalidation failed");
            0
        }
    }
}

/// Drop the entity entry for a content item and every cached list of its kind.
pub async fn invalidate_content<C: CacheOperations>(
    cache: &C,
    kind: ContentKind,
    content_id: i64,
) {
    invalidate(cache, &CacheKey::content(kind, content_id)).await;
    invalidate_pattern(cache, &CacheKey::content_list_pattern(kind)).await;
}
