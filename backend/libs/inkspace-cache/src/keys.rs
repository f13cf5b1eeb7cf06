//! Cache key schema
//!
//! The API layer reads the ranked keys directly, so their formats are part of
//! the contract: `hot:<kind>:zset` and `rank:<kind>:<window>`.

use std::fmt;

/// Content families that are cached and ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Article,
    Work,
}

impl ContentKind {
    pub const ALL: [ContentKind; 2] = [ContentKind::Article, ContentKind::Work];

    /// Plural form used in ranked keys (`articles`, `works`).
    pub fn plural(self) -> &'static str {
        match self {
            ContentKind::Article => "articles",
            ContentKind::Work => "works",
        }
    }

    /// Singular form used in entity keys (`article`, `work`).
    pub fn singular(self) -> &'static str {
        match self {
            ContentKind::Article => "article",
            ContentKind::Work => "work",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

/// Time windows a ranked set can cover, finest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankWindow {
    Hot,
    Week,
    Month,
    Year,
}

impl RankWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            RankWindow::Hot => "hot",
            RankWindow::Week => "week",
            RankWindow::Month => "month",
            RankWindow::Year => "year",
        }
    }

    /// Parse an API-level window name. Unknown names map to `Hot`, which is
    /// what list endpoints default to.
    pub fn parse_or_hot(raw: &str) -> Self {
        match raw {
            "week" => RankWindow::Week,
            "month" => RankWindow::Month,
            "year" => RankWindow::Year,
            _ => RankWindow::Hot,
        }
    }
}

impl fmt::Display for RankWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Single content entity
    /// Format: article:{id} / work:{id}
    pub fn content(kind: ContentKind, id: i64) -> String {
        format!("{}:{}", kind.singular(), id)
    }

    /// Every cached list/filter query shape of a content kind
    /// Format: article:list:*
    pub fn content_list_pattern(kind: ContentKind) -> String {
        format!("{}:list:*", kind.singular())
    }

    /// One cached list query; `shape` is whatever the caller hashes its
    /// filters into.
    pub fn content_list(kind: ContentKind, shape: &str) -> String {
        format!("{}:list:{}", kind.singular(), shape)
    }

    /// Format: user:{id}
    pub fn user(user_id: i64) -> String {
        format!("user:{}", user_id)
    }

    /// Ranked sorted set for a kind and window
    /// Format: hot:articles:zset, rank:articles:week, ...
    pub fn ranking(kind: ContentKind, window: RankWindow) -> String {
        match window {
            RankWindow::Hot => format!("hot:{}:zset", kind.plural()),
            other => format!("rank:{}:{}", kind.plural(), other.as_str()),
        }
    }

    /// Entity label for metrics: the first key segment, or the ranked family.
    pub fn entity_type(key: &str) -> &str {
        match key.split(':').next() {
            Some("") | None => "unknown",
            Some(first) => first,
        }
    }
}
