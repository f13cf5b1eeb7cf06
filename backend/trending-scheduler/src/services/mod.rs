pub mod content_cache;
pub mod engagement;
pub mod notifications;
pub mod trending;

pub use content_cache::ContentCache;
pub use engagement::{Engagement, EngagementService};
pub use notifications::{
    notification_queue, Notification, NotificationKind, NotificationSender, NotificationSink,
    NotificationWorker, PgNotificationSink,
};
pub use trending::{PageSource, TrendingItem, TrendingPage, TrendingReader};
