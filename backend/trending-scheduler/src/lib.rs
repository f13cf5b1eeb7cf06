//! Trending scheduler
//!
//! Background process that scores published articles and works, publishes
//! the hot lists and their week/month/year rollups into Redis sorted sets,
//! and provides the read paths that consume them.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod scoring;
pub mod services;

pub use error::{Result, ServiceError};
