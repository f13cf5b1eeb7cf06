//! Background task framework
//!
//! A task is a plain struct implementing [`ScheduledTask`]. The [`Scheduler`]
//! owns one loop per registered task:
//! - the first run happens immediately, then once per interval
//! - runs of the same task never overlap; different tasks run concurrently
//! - a failed or panicking run is logged and the loop waits for the next tick
//! - shutdown is cooperative: a run in flight finishes, no new run starts

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::metrics::job_metrics::helpers::JobTimer;

pub mod hot_content;
pub mod rank_rollup;
pub mod scheduler;

pub use hot_content::HotContentTask;
pub use rank_rollup::RankRollupTask;
pub use scheduler::{Scheduler, TaskInfo, TaskState};

/// Per-run context handed to a task
#[derive(Clone)]
pub struct TaskContext {
    pub correlation_id: String,
    shutdown: watch::Receiver<bool>,
}

impl TaskContext {
    pub fn new(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            shutdown,
        }
    }

    /// Context that is never cancelled, for running a task by hand.
    pub fn detached() -> Self {
        let (tx, rx) = watch::channel(false);
        // The receiver keeps the last value after the sender is gone.
        drop(tx);
        Self::new(rx)
    }

    /// True once the scheduler has been asked to stop.
    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }
}

#[async_trait]
pub trait ScheduledTask: Send + Sync {
    /// Name used in logs and metrics
    fn name(&self) -> &str;

    async fn run(&self, ctx: &TaskContext) -> Result<()>;
}

/// Drive one task until `shutdown` flips to true or its sender is dropped.
pub(crate) async fn run_task_loop(
    name: String,
    task: Arc<dyn ScheduledTask>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut timer = interval(period);
    // A run that outlasts the interval delays the next tick instead of bursting.
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures = 0u32;

    info!(
        job_name = %name,
        interval_ms = period.as_millis() as u64,
        "Starting task loop"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = timer.tick() => {
                run_once(&name, task.as_ref(), &shutdown, &mut consecutive_failures).await;
            }
        }
    }

    info!(job_name = %name, "Task loop stopped");
}

async fn run_once(
    name: &str,
    task: &dyn ScheduledTask,
    shutdown: &watch::Receiver<bool>,
    consecutive_failures: &mut u32,
) {
    let ctx = TaskContext::new(shutdown.clone());
    let timer = JobTimer::new(name);

    let outcome = AssertUnwindSafe(task.run(&ctx)).catch_unwind().await;
    let elapsed_ms = timer.elapsed_ms();

    match outcome {
        Ok(Ok(())) => {
            timer.observe_success();
            if *consecutive_failures > 0 {
                info!(
                    job_name = %name,
                    correlation_id = %ctx.correlation_id,
                    recovered_after = *consecutive_failures,
                    "Task recovered after failures"
                );
            }
            *consecutive_failures = 0;
        }
        Ok(Err(e)) => {
            *consecutive_failures += 1;
            timer.observe_failure("failed", *consecutive_failures);
            error!(
                job_name = %name,
                correlation_id = %ctx.correlation_id,
                error = %format!("{e:#}"),
                elapsed_ms,
                consecutive_failures = *consecutive_failures,
                "Task run failed, will retry on next interval"
            );
        }
        Err(panic) => {
            *consecutive_failures += 1;
            timer.observe_failure("panicked", *consecutive_failures);
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            warn!(
                job_name = %name,
                correlation_id = %ctx.correlation_id,
                panic = %message,
                consecutive_failures = *consecutive_failures,
                "Task run panicked, will retry on next interval"
            );
        }
    }
}
