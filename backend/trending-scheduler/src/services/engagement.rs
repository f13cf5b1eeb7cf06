//! Engagement side-effects
//!
//! One user action moves one counter. The order is fixed: store update,
//! cache invalidation, then notification. Only the store update can fail the
//! action.

use super::notifications::{Notification, NotificationKind, NotificationSender};
use crate::db::{ContentRepository, CounterColumn};
use crate::error::{Result, ServiceError};
use inkspace_cache::{aside, CacheOperations, ContentKind};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engagement {
    View,
    Like,
    Unlike,
    Comment { comment_id: i64 },
    /// A comment was removed
    Uncomment,
    Favorite,
    Unfavorite,
}

impl Engagement {
    fn column(self) -> CounterColumn {
        match self {
            Engagement::View => CounterColumn::Views,
            Engagement::Like | Engagement::Unlike => CounterColumn::Likes,
            Engagement::Comment { .. } | Engagement::Uncomment => CounterColumn::Comments,
            Engagement::Favorite | Engagement::Unfavorite => CounterColumn::Favorites,
        }
    }

    fn delta(self) -> i64 {
        match self {
            Engagement::View
            | Engagement::Like
            | Engagement::Comment { .. }
            | Engagement::Favorite => 1,
            Engagement::Unlike | Engagement::Uncomment | Engagement::Unfavorite => -1,
        }
    }

    fn notification_kind(self) -> Option<NotificationKind> {
        match self {
            Engagement::Like => Some(NotificationKind::Like),
            Engagement::Comment { .. } => Some(NotificationKind::Comment),
            Engagement::Favorite => Some(NotificationKind::Favorite),
            _ => None,
        }
    }
}

pub struct EngagementService<C> {
    repo: Arc<dyn ContentRepository>,
    cache: C,
    notifier: NotificationSender,
}

impl<C: CacheOperations> EngagementService<C> {
    pub fn new(repo: Arc<dyn ContentRepository>, cache: C, notifier: NotificationSender) -> Self {
        Self {
            repo,
            cache,
            notifier,
        }
    }

    /// Apply `action` by `actor_id` to a content item.
    pub async fn record(
        &self,
        kind: ContentKind,
        content_id: i64,
        actor_id: i64,
        action: Engagement,
    ) -> Result<()> {
        let author_id = self
            .repo
            .adjust_counter(kind, content_id, action.column(), action.delta())
            .await?
            .ok_or(ServiceError::NotFound {
                kind,
                id: content_id,
            })?;

        aside::invalidate_content(&self.cache, kind, content_id).await;

        if let Some(notification_kind) = action.notification_kind() {
            if actor_id == author_id {
                debug!(kind = %kind, content_id, "Actor is the author, no notification");
            } else {
                let (article_id, work_id) = match kind {
                    ContentKind::Article => (Some(content_id), None),
                    ContentKind::Work => (None, Some(content_id)),
                };
                let comment_id = match action {
                    Engagement::Comment { comment_id } => Some(comment_id),
                    _ => None,
                };
                self.notifier.notify(Notification {
                    user_id: author_id,
                    from_user_id: actor_id,
                    kind: notification_kind,
                    article_id,
                    work_id,
                    comment_id,
                });
            }
        }

        Ok(())
    }
}
