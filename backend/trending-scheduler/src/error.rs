//! Service error types

use inkspace_cache::{CacheError, ContentKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A denormalized counter read back negative. Counters only move through
    /// clamped updates, so this means the row was written by something else.
    #[error("{kind} {id} has negative {column}: {value}")]
    InvalidCounter {
        kind: ContentKind,
        id: i64,
        column: &'static str,
        value: i64,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: ContentKind, id: i64 },
}

pub type Result<T> = std::result::Result<T, ServiceError>;
