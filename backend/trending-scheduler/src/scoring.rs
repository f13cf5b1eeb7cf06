//! Popularity scoring
//!
//! Pure functions: no I/O, deterministic for a given input and reference
//! time. Every counter is dampened with `ln(1 + x)` so one viral item cannot
//! dominate a list on raw magnitude alone.

use chrono::{DateTime, Utc};
use inkspace_cache::{ContentKind, ScoredEntry};

/// Denormalized engagement counters of one content item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub views: u64,
    pub comments: u64,
    pub likes: u64,
    pub favorites: u64,
}

/// The projection the ranking tasks read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentCounters {
    pub id: i64,
    pub counters: Counters,
    pub created_at: DateTime<Utc>,
}

/// Recency bonus decay constant in days (half-life is about 21 days)
const RECENCY_DECAY_DAYS: f64 = 30.0;

fn damp(count: u64) -> f64 {
    (count as f64).ln_1p()
}

pub fn article_score(c: &Counters) -> f64 {
    0.5 * damp(c.views) + 0.2 * damp(c.comments) + 0.15 * damp(c.likes) + 0.15 * damp(c.favorites)
}

/// Work score with a decaying boost for new items.
///
/// Items dated in the future get the full bonus rather than more than it.
pub fn work_score(c: &Counters, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = ((now - created_at).num_seconds() as f64 / 86_400.0).max(0.0);
    0.4 * damp(c.views)
        + 0.25 * damp(c.comments)
        + 0.2 * damp(c.likes)
        + 0.1 * damp(c.favorites)
        + 0.05 * (-days / RECENCY_DECAY_DAYS).exp()
}

pub fn score(kind: ContentKind, item: &ContentCounters, now: DateTime<Utc>) -> f64 {
    match kind {
        ContentKind::Article => article_score(&item.counters),
        ContentKind::Work => work_score(&item.counters, item.created_at, now),
    }
}

/// Highest `k` entries by score, descending.
///
/// The sort is stable, so equal scores keep their input order.
pub fn select_top_k(mut entries: Vec<ScoredEntry>, k: usize) -> Vec<ScoredEntry> {
    entries.sort_by(|a, b| b.score.total_cmp(&a.score));
    entries.truncate(k);
    entries
}
