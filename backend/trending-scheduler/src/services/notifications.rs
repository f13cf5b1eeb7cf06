//! Notification queue
//!
//! Producers call [`NotificationSender::notify`], which never waits and never
//! fails; a single [`NotificationWorker`] drains the queue into a
//! [`NotificationSink`]. Losing a notification is acceptable, failing the
//! action that produced it is not.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Favorite,
    Follow,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::Favorite => "favorite",
            NotificationKind::Follow => "follow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient
    pub user_id: i64,
    /// Actor
    pub from_user_id: i64,
    pub kind: NotificationKind,
    pub article_id: Option<i64>,
    pub work_id: Option<i64>,
    pub comment_id: Option<i64>,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Create a bounded queue. Both halves are needed: the sender goes to
/// producers, the receiver to [`NotificationWorker::new`].
pub fn notification_queue(capacity: usize) -> (NotificationSender, mpsc::Receiver<Notification>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (NotificationSender { tx }, rx)
}

#[derive(Clone)]
pub struct NotificationSender {
    tx: mpsc::Sender<Notification>,
}

impl NotificationSender {
    /// Enqueue without waiting. Returns whether the notification was accepted.
    pub fn notify(&self, notification: Notification) -> bool {
        match self.tx.try_send(notification) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!(
                    user_id = n.user_id,
                    kind = n.kind.as_str(),
                    "Notification queue full, dropping notification"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                warn!(
                    user_id = n.user_id,
                    kind = n.kind.as_str(),
                    "Notification worker gone, dropping notification"
                );
                false
            }
        }
    }
}

pub struct NotificationWorker {
    rx: mpsc::Receiver<Notification>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationWorker {
    pub fn new(rx: mpsc::Receiver<Notification>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { rx, sink }
    }

    /// Deliver until every sender is dropped or `shutdown` flips to true.
    /// On shutdown, whatever is already queued is still delivered.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Notification worker started");
        let mut delivered = 0u64;

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.rx.close();
                        while let Some(notification) = self.rx.recv().await {
                            delivered += self.deliver(&notification).await as u64;
                        }
                        break;
                    }
                }
                next = self.rx.recv() => match next {
                    Some(notification) => {
                        delivered += self.deliver(&notification).await as u64;
                    }
                    None => break,
                },
            }
        }

        info!(delivered, "Notification worker stopped");
    }

    async fn deliver(&self, notification: &Notification) -> bool {
        match self.sink.deliver(notification).await {
            Ok(()) => {
                debug!(
                    user_id = notification.user_id,
                    kind = notification.kind.as_str(),
                    "Notification delivered"
                );
                true
            }
            Err(e) => {
                warn!(
                    user_id = notification.user_id,
                    kind = notification.kind.as_str(),
                    error = %e,
                    "Notification delivery failed"
                );
                false
            }
        }
    }
}

/// Writes notifications to the `notifications` table.
#[derive(Clone)]
pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn deliver(&self, n: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications
                (user_id, from_user_id, type, article_id, work_id, comment_id, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW())
            "#,
        )
        .bind(n.user_id)
        .bind(n.from_user_id)
        .bind(n.kind.as_str())
        .bind(n.article_id)
        .bind(n.work_id)
        .bind(n.comment_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
