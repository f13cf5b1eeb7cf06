use chrono::FixedOffset;
use inkspace_cache::{ContentKind, RankingStore, RedisRankingStore};
use redis_utils::RedisPool;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trending_scheduler::clock::{Clock, SystemClock};
use trending_scheduler::config::Config;
use trending_scheduler::db::{ContentSource, PgContentRepository};
use trending_scheduler::jobs::hot_content::HotContentConfig;
use trending_scheduler::jobs::{HotContentTask, RankRollupTask, Scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_names(true)
                .with_target(true),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting trending-scheduler v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Environment: {}", config.app.env);

    config.database.log_config();
    let pg_pool = db_pool::create_pool(config.database.clone()).await?;
    let redis_pool = RedisPool::connect(&config.redis).await?;

    let source: Arc<dyn ContentSource> = Arc::new(PgContentRepository::new(pg_pool));
    let store: Arc<dyn RankingStore> = Arc::new(RedisRankingStore::new(redis_pool));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let jobs = &config.jobs;
    let offset = FixedOffset::east_opt(jobs.rank_utc_offset_hours * 3600)
        .ok_or_else(|| anyhow::anyhow!("invalid RANK_UTC_OFFSET_HOURS"))?;

    let scheduler = Scheduler::new();
    scheduler
        .register(
            "hot_articles",
            Arc::new(HotContentTask::new(
                HotContentConfig::articles(jobs.hot_articles_topk, jobs.hot_articles_interval()),
                source.clone(),
                store.clone(),
                clock.clone(),
            )),
            jobs.hot_articles_interval(),
        )
        .await?;
    scheduler
        .register(
            "hot_works",
            Arc::new(HotContentTask::new(
                HotContentConfig::works(jobs.hot_works_topk, jobs.hot_works_interval()),
                source.clone(),
                store.clone(),
                clock.clone(),
            )),
            jobs.hot_works_interval(),
        )
        .await?;
    for kind in ContentKind::ALL {
        scheduler
            .register(
                format!("rank_rollup_{}", kind.plural()),
                Arc::new(RankRollupTask::new(
                    kind,
                    jobs.rollup_topk,
                    offset,
                    store.clone(),
                    clock.clone(),
                )),
                jobs.rank_rollup_interval(),
            )
            .await?;
    }

    for task in scheduler.tasks().await {
        info!(
            job_name = %task.name,
            interval_sec = task.interval.as_secs(),
            "Scheduled task"
        );
    }

    scheduler.start().await;

    wait_for_signal().await;
    info!("Shutdown signal received");

    scheduler.stop().await;

    info!("trending-scheduler stopped");
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
