//! In-memory stand-ins for PostgreSQL and Redis.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use inkspace_cache::{CacheError, CacheOperations, CacheResult, ContentKind, RankingStore, ScoredEntry};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use trending_scheduler::db::{ContentSource, ContentSummary};
use trending_scheduler::scoring::{ContentCounters, Counters};
use trending_scheduler::{Result, ServiceError};

pub fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

pub fn entries(pairs: &[(i64, f64)]) -> Vec<ScoredEntry> {
    pairs.iter().map(|&(id, score)| ScoredEntry::new(id, score)).collect()
}

fn down() -> CacheError {
    CacheError::Unavailable("connection refused".into())
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredSet {
    pub entries: Vec<ScoredEntry>,
    pub ttl: Option<Duration>,
}

/// Sorted sets kept in a map; `replace` with no entries leaves the key absent.
#[derive(Default)]
pub struct MemoryRankingStore {
    sets: Mutex<HashMap<String, StoredSet>>,
    pub broken: AtomicBool,
    /// Reads work, writes fail
    pub read_only: AtomicBool,
    pub replace_calls: AtomicUsize,
    unreadable: Mutex<HashSet<String>>,
}

impl MemoryRankingStore {
    pub fn seed(&self, key: &str, pairs: &[(i64, f64)], ttl: Option<Duration>) {
        let mut sorted = entries(pairs);
        sorted.sort_by(|a, b| b.score.total_cmp(&a.score));
        self.sets.lock().unwrap().insert(
            key.to_string(),
            StoredSet {
                entries: sorted,
                ttl,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredSet> {
        self.sets.lock().unwrap().get(key).cloned()
    }

    /// Make reads of one key fail while the rest of the store works.
    pub fn fail_reads_of(&self, key: &str) {
        self.unreadable.lock().unwrap().insert(key.to_string());
    }

    fn check_read(&self, key: &str) -> CacheResult<()> {
        self.check()?;
        if self.unreadable.lock().unwrap().contains(key) {
            return Err(down());
        }
        Ok(())
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    fn check(&self) -> CacheResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            Err(down())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RankingStore for MemoryRankingStore {
    async fn replace(
        &self,
        key: &str,
        entries: &[ScoredEntry],
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        self.check()?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        let mut sets = self.sets.lock().unwrap();
        sets.remove(key);
        if !entries.is_empty() {
            let mut sorted = entries.to_vec();
            sorted.sort_by(|a, b| b.score.total_cmp(&a.score));
            sets.insert(
                key.to_string(),
                StoredSet {
                    entries: sorted,
                    ttl,
                },
            );
        }
        Ok(())
    }

    async fn range(&self, key: &str, start: usize, stop: usize) -> CacheResult<Vec<ScoredEntry>> {
        self.check_read(key)?;
        let sets = self.sets.lock().unwrap();
        Ok(sets
            .get(key)
            .map(|set| {
                set.entries
                    .iter()
                    .skip(start)
                    .take(stop.saturating_sub(start) + 1)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn len(&self, key: &str) -> CacheResult<u64> {
        self.check_read(key)?;
        Ok(self
            .sets
            .lock()
            .unwrap()
            .get(key)
            .map(|s| s.entries.len() as u64)
            .unwrap_or(0))
    }

    async fn score(&self, key: &str, content_id: i64) -> CacheResult<Option<f64>> {
        self.check_read(key)?;
        Ok(self.sets.lock().unwrap().get(key).and_then(|s| {
            s.entries
                .iter()
                .find(|e| e.content_id == content_id)
                .map(|e| e.score)
        }))
    }
}

/// One stored content row
#[derive(Debug, Clone)]
pub struct Row {
    pub summary: ContentSummary,
    pub published: bool,
}

/// Content rows per kind
#[derive(Default)]
pub struct FakeSource {
    rows: Mutex<HashMap<ContentKind, Vec<Row>>>,
    pub broken: AtomicBool,
    pub lookups: AtomicUsize,
}

impl FakeSource {
    pub fn add(&self, kind: ContentKind, id: i64, counters: Counters, created_at: DateTime<Utc>) {
        self.add_row(kind, id, 1000 + id, counters, created_at, true);
    }

    pub fn add_row(
        &self,
        kind: ContentKind,
        id: i64,
        author_id: i64,
        counters: Counters,
        created_at: DateTime<Utc>,
        published: bool,
    ) {
        let summary = ContentSummary {
            id,
            author_id,
            title: format!("{kind} {id}"),
            view_count: counters.views as i64,
            comment_count: counters.comments as i64,
            like_count: counters.likes as i64,
            favorite_count: counters.favorites as i64,
            created_at,
        };
        self.rows
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(Row { summary, published });
    }

    fn published(&self, kind: ContentKind) -> Vec<ContentSummary> {
        self.rows
            .lock()
            .unwrap()
            .get(&kind)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.published)
                    .map(|r| r.summary.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check(&self) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            Err(ServiceError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn published_counters(&self, kind: ContentKind) -> Result<Vec<ContentCounters>> {
        self.check()?;
        Ok(self
            .published(kind)
            .into_iter()
            .map(|s| ContentCounters {
                id: s.id,
                counters: Counters {
                    views: s.view_count as u64,
                    comments: s.comment_count as u64,
                    likes: s.like_count as u64,
                    favorites: s.favorite_count as u64,
                },
                created_at: s.created_at,
            })
            .collect())
    }

    async fn find_published(&self, kind: ContentKind, ids: &[i64]) -> Result<Vec<ContentSummary>> {
        self.check()?;
        // Reverse order on purpose: callers must not rely on store order.
        let mut found: Vec<ContentSummary> = self
            .published(kind)
            .into_iter()
            .filter(|s| ids.contains(&s.id))
            .collect();
        found.reverse();
        Ok(found)
    }

    async fn latest_published(
        &self,
        kind: ContentKind,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ContentSummary>> {
        self.check()?;
        let mut all = self.published(kind);
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_published(&self, kind: ContentKind) -> Result<u64> {
        self.check()?;
        Ok(self.published(kind).len() as u64)
    }

    async fn find_by_id(&self, kind: ContentKind, id: i64) -> Result<Option<ContentSummary>> {
        self.check()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.published(kind).into_iter().find(|s| s.id == id))
    }
}

/// String cache over a map, with a switch to simulate an outage.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    pub broken: AtomicBool,
}

impl MemoryCache {
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn check(&self) -> CacheResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            Err(down())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheOperations for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> CacheResult<Option<T>> {
        self.check()?;
        let raw = self.entries.lock().unwrap().get(key).cloned();
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        _ttl_secs: u64,
    ) -> CacheResult<()> {
        self.check()?;
        let raw = serde_json::to_string(value)?;
        self.entries.lock().unwrap().insert(key.to_string(), raw);
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.check()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn scan_del(&self, pattern: &str) -> CacheResult<usize> {
        self.check()?;
        let prefix = pattern.trim_end_matches('*');
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok(before - entries.len())
    }
}
