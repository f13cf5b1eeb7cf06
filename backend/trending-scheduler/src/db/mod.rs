pub mod content_repo;

pub use content_repo::{
    ContentRepository, ContentSource, ContentSummary, CounterColumn, PgContentRepository,
    PUBLISHED_STATUS,
};
