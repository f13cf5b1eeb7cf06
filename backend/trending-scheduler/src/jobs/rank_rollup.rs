//! Week / month / year rollups
//!
//! Coarser tiers are re-slices of finer ones, never rescored from the store:
//!
//! | tier  | due on           | reads              | TTL      |
//! |-------|------------------|--------------------|----------|
//! | week  | Sunday           | hot                | 30 days  |
//! | month | 1st of the month | week, else hot     | 365 days |
//! | year  | January 1st      | month, else hot    | none     |
//!
//! Due dates are calendar days in a fixed UTC offset, checked on every tick.
//! The task should tick at most once a day; a shorter interval republishes
//! the same tier several times on its due day, which is harmless.

use super::{ScheduledTask, TaskContext};
use crate::clock::Clock;
use crate::metrics::job_metrics::helpers::record_ranked_entries;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, FixedOffset, NaiveDate, Weekday};
use inkspace_cache::{CacheKey, ContentKind, RankWindow, RankingStore, ScoredEntry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const DAY_SECS: u64 = 24 * 60 * 60;

/// Rollup tiers in the order they are evaluated
pub const ROLLUP_WINDOWS: [RankWindow; 3] = [RankWindow::Week, RankWindow::Month, RankWindow::Year];

/// Tiers whose boundary falls on `date`.
pub fn due_windows(date: NaiveDate) -> Vec<RankWindow> {
    ROLLUP_WINDOWS
        .into_iter()
        .filter(|window| match window {
            RankWindow::Week => date.weekday() == Weekday::Sun,
            RankWindow::Month => date.day() == 1,
            RankWindow::Year => date.month() == 1 && date.day() == 1,
            RankWindow::Hot => false,
        })
        .collect()
}

/// Tiers to read from, preferred first.
pub fn rollup_sources(window: RankWindow) -> &'static [RankWindow] {
    match window {
        RankWindow::Week => &[RankWindow::Hot],
        RankWindow::Month => &[RankWindow::Week, RankWindow::Hot],
        RankWindow::Year => &[RankWindow::Month, RankWindow::Hot],
        RankWindow::Hot => &[],
    }
}

/// Expiry of a published tier; `None` keeps it forever.
pub fn rollup_ttl(window: RankWindow) -> Option<Duration> {
    match window {
        RankWindow::Week => Some(Duration::from_secs(30 * DAY_SECS)),
        RankWindow::Month => Some(Duration::from_secs(365 * DAY_SECS)),
        RankWindow::Year | RankWindow::Hot => None,
    }
}

pub struct RankRollupTask {
    kind: ContentKind,
    name: String,
    top_k: usize,
    offset: FixedOffset,
    store: Arc<dyn RankingStore>,
    clock: Arc<dyn Clock>,
}

impl RankRollupTask {
    pub fn new(
        kind: ContentKind,
        top_k: usize,
        offset: FixedOffset,
        store: Arc<dyn RankingStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: format!("rank_rollup_{}", kind.plural()),
            kind,
            top_k,
            offset,
            store,
            clock,
        }
    }

    /// Calendar date the triggers are evaluated against
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.offset).date_naive()
    }

    /// Publish one tier from the first non-empty source.
    ///
    /// Returns the number of entries written. When every source is absent or
    /// empty the tier is left as it is and 0 is returned. Failing to read the
    /// last source is an error.
    pub async fn rollup(&self, window: RankWindow, ctx: &TaskContext) -> Result<usize> {
        let target = CacheKey::ranking(self.kind, window);

        let Some((source, entries)) = self.first_populated_source(window, ctx).await? else {
            info!(
                correlation_id = %ctx.correlation_id,
                redis_key = %target,
                "No source tier populated, skipping rollup"
            );
            return Ok(0);
        };

        let ttl = rollup_ttl(window);
        self.store
            .replace(&target, &entries, ttl)
            .await
            .with_context(|| format!("failed to publish {target}"))?;

        record_ranked_entries(&target, entries.len());
        info!(
            correlation_id = %ctx.correlation_id,
            redis_key = %target,
            source = %source,
            published = entries.len(),
            ttl_sec = ttl.map(|t| t.as_secs()),
            "Rollup published"
        );
        Ok(entries.len())
    }

    /// First source tier with members, in preference order.
    ///
    /// Absent or empty tiers fall through. A read error falls through too,
    /// except on the last source, where it fails the rollup.
    async fn first_populated_source(
        &self,
        window: RankWindow,
        ctx: &TaskContext,
    ) -> Result<Option<(RankWindow, Vec<ScoredEntry>)>> {
        let sources = rollup_sources(window);
        for (i, &source) in sources.iter().enumerate() {
            let key = CacheKey::ranking(self.kind, source);
            match self.store.top(&key, self.top_k).await {
                Ok(entries) if !entries.is_empty() => return Ok(Some((source, entries))),
                Ok(_) => {
                    debug!(
                        correlation_id = %ctx.correlation_id,
                        redis_key = %key,
                        "Source tier empty, trying next"
                    );
                }
                Err(e) if i + 1 == sources.len() => {
                    return Err(e).with_context(|| format!("failed to read {key}"));
                }
                Err(e) => {
                    warn!(
                        correlation_id = %ctx.correlation_id,
                        redis_key = %key,
                        error = %e,
                        "Source tier unreadable, trying next"
                    );
                }
            }
        }
        Ok(None)
    }

    /// Roll up every tier due on `date`. All due tiers are attempted; the
    /// first failure is returned.
    pub async fn run_for_date(&self, date: NaiveDate, ctx: &TaskContext) -> Result<()> {
        let due = due_windows(date);
        if due.is_empty() {
            debug!(correlation_id = %ctx.correlation_id, %date, "No rollup due");
            return Ok(());
        }

        let mut first_error = None;
        for window in due {
            if let Err(e) = self.rollup(window, ctx).await {
                warn!(
                    correlation_id = %ctx.correlation_id,
                    window = %window,
                    error = %format!("{e:#}"),
                    "Rollup failed"
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ScheduledTask for RankRollupTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &TaskContext) -> Result<()> {
        self.run_for_date(self.today(), ctx).await
    }
}
