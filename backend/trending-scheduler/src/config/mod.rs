//! Service configuration
//!
//! Everything comes from environment variables (optionally seeded from a
//! `.env` file by the binary). Missing variables fall back to defaults,
//! malformed ones are rejected.

use crate::error::{Result, ServiceError};
use db_pool::DbConfig;
use redis_utils::RedisConfig;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DbConfig,
    pub redis: RedisConfig,
    pub jobs: JobConfig,
    pub cache: CacheTtlConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
}

/// Ranking task settings
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    /// Hot articles refresh interval (seconds)
    pub hot_articles_interval_sec: u64,

    /// Hot works refresh interval (seconds)
    pub hot_works_interval_sec: u64,

    /// How often the rollup task checks its calendar triggers (seconds)
    pub rank_rollup_interval_sec: u64,

    pub hot_articles_topk: usize,
    pub hot_works_topk: usize,

    /// Entries copied from one tier into the next
    pub rollup_topk: usize,

    /// Fixed offset from UTC of the calendar used for week/month/year boundaries
    pub rank_utc_offset_hours: i32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            hot_articles_interval_sec: 180,
            hot_works_interval_sec: 180,
            rank_rollup_interval_sec: 86_400,
            hot_articles_topk: 20,
            hot_works_topk: 500,
            rollup_topk: 50,
            rank_utc_offset_hours: 0,
        }
    }
}

impl JobConfig {
    pub fn hot_articles_interval(&self) -> Duration {
        Duration::from_secs(self.hot_articles_interval_sec)
    }

    pub fn hot_works_interval(&self) -> Duration {
        Duration::from_secs(self.hot_works_interval_sec)
    }

    pub fn rank_rollup_interval(&self) -> Duration {
        Duration::from_secs(self.rank_rollup_interval_sec)
    }
}

/// Cache-aside TTLs in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtlConfig {
    pub article_secs: u64,
    pub work_secs: u64,
    pub user_secs: u64,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            article_secs: inkspace_cache::ttl::ARTICLE,
            work_secs: inkspace_cache::ttl::WORK,
            user_secs: inkspace_cache::ttl::USER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationConfig {
    pub queue_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

/// Parse `key` if set, otherwise return `default`.
fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ServiceError::Config(format!("{key} has an invalid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database = DbConfig::from_env("trending-scheduler").map_err(ServiceError::Config)?;

        let redis_defaults = RedisConfig::default();
        let redis = RedisConfig {
            url: std::env::var("REDIS_URL").unwrap_or(redis_defaults.url),
            pool_size: env_parse("REDIS_POOL_SIZE", redis_defaults.pool_size)?,
            connect_timeout: Duration::from_secs(env_parse(
                "REDIS_CONNECT_TIMEOUT_SECS",
                redis_defaults.connect_timeout.as_secs(),
            )?),
        };

        let job_defaults = JobConfig::default();
        let jobs = JobConfig {
            hot_articles_interval_sec: env_parse(
                "JOB_HOT_ARTICLES_INTERVAL_SEC",
                job_defaults.hot_articles_interval_sec,
            )?,
            hot_works_interval_sec: env_parse(
                "JOB_HOT_WORKS_INTERVAL_SEC",
                job_defaults.hot_works_interval_sec,
            )?,
            rank_rollup_interval_sec: env_parse(
                "JOB_RANK_ROLLUP_INTERVAL_SEC",
                job_defaults.rank_rollup_interval_sec,
            )?,
            hot_articles_topk: env_parse("JOB_HOT_ARTICLES_TOPK", job_defaults.hot_articles_topk)?,
            hot_works_topk: env_parse("JOB_HOT_WORKS_TOPK", job_defaults.hot_works_topk)?,
            rollup_topk: env_parse("JOB_ROLLUP_TOPK", job_defaults.rollup_topk)?,
            rank_utc_offset_hours: env_parse(
                "RANK_UTC_OFFSET_HOURS",
                job_defaults.rank_utc_offset_hours,
            )?,
        };

        let ttl_defaults = CacheTtlConfig::default();
        let cache = CacheTtlConfig {
            article_secs: env_parse("CACHE_ARTICLE_EXPIRE_SECS", ttl_defaults.article_secs)?,
            work_secs: env_parse("CACHE_WORK_EXPIRE_SECS", ttl_defaults.work_secs)?,
            user_secs: env_parse("CACHE_USER_EXPIRE_SECS", ttl_defaults.user_secs)?,
        };

        let notifications = NotificationConfig {
            queue_capacity: env_parse(
                "NOTIFICATION_QUEUE_CAPACITY",
                NotificationConfig::default().queue_capacity,
            )?,
        };

        let config = Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            database,
            redis,
            jobs,
            cache,
            notifications,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        let jobs = &self.jobs;

        if jobs.hot_articles_interval_sec == 0 {
            return Err(ServiceError::Config(
                "hot_articles_interval_sec must be greater than 0".to_string(),
            ));
        }

        if jobs.hot_works_interval_sec == 0 {
            return Err(ServiceError::Config(
                "hot_works_interval_sec must be greater than 0".to_string(),
            ));
        }

        if jobs.rank_rollup_interval_sec == 0 {
            return Err(ServiceError::Config(
                "rank_rollup_interval_sec must be greater than 0".to_string(),
            ));
        }

        if jobs.hot_articles_topk == 0 || jobs.hot_works_topk == 0 || jobs.rollup_topk == 0 {
            return Err(ServiceError::Config(
                "top-k values must be greater than 0".to_string(),
            ));
        }

        if !(-14..=14).contains(&jobs.rank_utc_offset_hours) {
            return Err(ServiceError::Config(format!(
                "rank_utc_offset_hours must be within -14..=14, got {}",
                jobs.rank_utc_offset_hours
            )));
        }

        if self.redis.pool_size == 0 {
            return Err(ServiceError::Config(
                "redis pool_size must be greater than 0".to_string(),
            ));
        }

        if self.notifications.queue_capacity == 0 {
            return Err(ServiceError::Config(
                "notification queue_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
