//! Content rows in PostgreSQL
//!
//! Articles and works share a column layout and live in `articles` and
//! `works`. The ranking path only ever reads the counter projection; the
//! engagement path only ever touches one counter column at a time.

use crate::error::{Result, ServiceError};
use crate::scoring::{ContentCounters, Counters};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inkspace_cache::ContentKind;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;

/// `status` value of published content
pub const PUBLISHED_STATUS: i16 = 1;

/// What the read paths return for one content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContentSummary {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub view_count: i64,
    pub comment_count: i64,
    pub like_count: i64,
    pub favorite_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Denormalized counter columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterColumn {
    Views,
    Comments,
    Likes,
    Favorites,
}

impl CounterColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            CounterColumn::Views => "view_count",
            CounterColumn::Comments => "comment_count",
            CounterColumn::Likes => "like_count",
            CounterColumn::Favorites => "favorite_count",
        }
    }
}

/// Read side used by ranking tasks and read paths.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Counter projection of every published item of `kind`
    async fn published_counters(&self, kind: ContentKind) -> Result<Vec<ContentCounters>>;

    /// Published items among `ids`, in no particular order
    async fn find_published(&self, kind: ContentKind, ids: &[i64]) -> Result<Vec<ContentSummary>>;

    /// Newest published items first
    async fn latest_published(
        &self,
        kind: ContentKind,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ContentSummary>>;

    async fn count_published(&self, kind: ContentKind) -> Result<u64>;

    async fn find_by_id(&self, kind: ContentKind, id: i64) -> Result<Option<ContentSummary>>;
}

/// Write side used by engagement side-effects.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Add `delta` to one counter, never going below zero.
    ///
    /// Returns the item's author, or `None` if no such item exists.
    async fn adjust_counter(
        &self,
        kind: ContentKind,
        id: i64,
        column: CounterColumn,
        delta: i64,
    ) -> Result<Option<i64>>;
}

#[derive(Debug, sqlx::FromRow)]
struct CounterRow {
    id: i64,
    view_count: i64,
    comment_count: i64,
    like_count: i64,
    favorite_count: i64,
    created_at: DateTime<Utc>,
}

fn non_negative(kind: ContentKind, id: i64, column: CounterColumn, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| ServiceError::InvalidCounter {
        kind,
        id,
        column: column.as_str(),
        value,
    })
}

impl CounterRow {
    fn into_counters(self, kind: ContentKind) -> Result<ContentCounters> {
        let id = self.id;
        Ok(ContentCounters {
            id,
            counters: Counters {
                views: non_negative(kind, id, CounterColumn::Views, self.view_count)?,
                comments: non_negative(kind, id, CounterColumn::Comments, self.comment_count)?,
                likes: non_negative(kind, id, CounterColumn::Likes, self.like_count)?,
                favorites: non_negative(kind, id, CounterColumn::Favorites, self.favorite_count)?,
            },
            created_at: self.created_at,
        })
    }
}

fn table(kind: ContentKind) -> &'static str {
    kind.plural()
}

const SUMMARY_COLUMNS: &str = "id::BIGINT AS id, user_id::BIGINT AS author_id, title, \
     view_count::BIGINT AS view_count, comment_count::BIGINT AS comment_count, \
     like_count::BIGINT AS like_count, favorite_count::BIGINT AS favorite_count, created_at";

/// PostgreSQL implementation of both content traits.
#[derive(Clone)]
pub struct PgContentRepository {
    pool: PgPool,
}

impl PgContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentSource for PgContentRepository {
    async fn published_counters(&self, kind: ContentKind) -> Result<Vec<ContentCounters>> {
        let sql = format!(
            r#"
            SELECT id::BIGINT AS id,
                   view_count::BIGINT AS view_count,
                   comment_count::BIGINT AS comment_count,
                   like_count::BIGINT AS like_count,
                   favorite_count::BIGINT AS favorite_count,
                   created_at
            FROM {}
            WHERE status = $1
            "#,
            table(kind)
        );

        let rows = sqlx::query_as::<_, CounterRow>(&sql)
            .bind(PUBLISHED_STATUS)
            .fetch_all(&self.pool)
            .await?;

        debug!(kind = %kind, rows = rows.len(), "Loaded published counters");
        rows.into_iter().map(|row| row.into_counters(kind)).collect()
    }

    async fn find_published(&self, kind: ContentKind, ids: &[i64]) -> Result<Vec<ContentSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM {} WHERE id = ANY($1) AND status = $2",
            table(kind)
        );

        let rows = sqlx::query_as::<_, ContentSummary>(&sql)
            .bind(ids)
            .bind(PUBLISHED_STATUS)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn latest_published(
        &self,
        kind: ContentKind,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ContentSummary>> {
        let sql = format!(
            r#"
            SELECT {SUMMARY_COLUMNS}
            FROM {}
            WHERE status = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            table(kind)
        );

        let rows = sqlx::query_as::<_, ContentSummary>(&sql)
            .bind(PUBLISHED_STATUS)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_published(&self, kind: ContentKind) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE status = $1", table(kind));
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(PUBLISHED_STATUS)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn find_by_id(&self, kind: ContentKind, id: i64) -> Result<Option<ContentSummary>> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM {} WHERE id = $1 AND status = $2",
            table(kind)
        );

        let row = sqlx::query_as::<_, ContentSummary>(&sql)
            .bind(id)
            .bind(PUBLISHED_STATUS)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl ContentRepository for PgContentRepository {
    async fn adjust_counter(
        &self,
        kind: ContentKind,
        id: i64,
        column: CounterColumn,
        delta: i64,
    ) -> Result<Option<i64>> {
        let col = column.as_str();
        let sql = format!(
            r#"
            UPDATE {table}
            SET {col} = GREATEST({col} + $1, 0)
            WHERE id = $2
            RETURNING user_id::BIGINT
            "#,
            table = table(kind),
        );

        let author: Option<i64> = sqlx::query_scalar(&sql)
            .bind(delta)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        debug!(kind = %kind, id, column = col, delta, found = author.is_some(), "Counter adjusted");
        Ok(author)
    }
}
