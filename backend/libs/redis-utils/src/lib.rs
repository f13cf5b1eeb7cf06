use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{Client, IntoConnectionInfo};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Redis connection settings.
#[derive(Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Number of multiplexed connections kept open.
    pub pool_size: usize,
    pub connect_timeout: Duration,
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &"[REDACTED]")
            .field("pool_size", &self.pool_size)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 10,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Fixed set of multiplexed Redis connections handed out round-robin.
///
/// Each `ConnectionManager` reconnects on its own, so a handle obtained from
/// [`RedisPool::manager`] stays usable across transient outages. Cloning the
/// pool is cheap and shares the underlying connections.
#[derive(Clone)]
pub struct RedisPool {
    managers: Arc<Vec<ConnectionManager>>,
    next: Arc<AtomicUsize>,
}

impl RedisPool {
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let info = config
            .url
            .as_str()
            .into_connection_info()
            .context("failed to parse REDIS_URL connection string")?;
        let client = Client::open(info).context("failed to construct Redis client")?;

        let size = config.pool_size.max(1);
        let mut managers = Vec::with_capacity(size);
        for _ in 0..size {
            let manager = tokio::time::timeout(
                config.connect_timeout,
                ConnectionManager::new(client.clone()),
            )
            .await
            .context("timed out connecting to Redis")?
            .context("failed to initialize Redis connection manager")?;
            managers.push(manager);
        }

        let pool = Self::from_managers(managers);
        pool.ping().await.context("Redis PING failed after connect")?;

        info!(pool_size = size, "Redis pool connected");
        Ok(pool)
    }

    /// Wrap already-established connections.
    ///
    /// # Panics
    /// Panics if `managers` is empty.
    pub fn from_managers(managers: Vec<ConnectionManager>) -> Self {
        assert!(!managers.is_empty(), "RedisPool needs at least one connection");
        Self {
            managers: Arc::new(managers),
            next: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Next connection in rotation.
    pub fn manager(&self) -> ConnectionManager {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.managers.len();
        self.managers[idx].clone()
    }

    pub fn size(&self) -> usize {
        self.managers.len()
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager();
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("PING")?;
        anyhow::ensure!(reply == "PONG", "unexpected PING reply: {reply}");
        Ok(())
    }
}
