//! Cache error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A ranked-set argument Redis cannot represent
    #[error("{what} out of range for {key}")]
    OutOfRange { key: String, what: &'static str },

    /// Backend refused or dropped the request
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

impl CacheError {
    /// True when the failure says nothing about the data, only the backend.
    pub fn is_unavailable(&self) -> bool {
        match self {
            CacheError::Redis(e) => e.is_io_error() || e.is_timeout() || e.is_connection_dropped(),
            CacheError::Unavailable(_) => true,
            _ => false,
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
