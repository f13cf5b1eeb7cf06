//! Task registry and lifecycle

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{run_task_loop, ScheduledTask};
use crate::error::{Result, ServiceError};

/// Lifecycle of a registered task: `Registered -> Running -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Registered,
    Running,
    Stopped,
}

/// Snapshot of one registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub name: String,
    pub interval: Duration,
    pub state: TaskState,
}

struct TaskEntry {
    task: Arc<dyn ScheduledTask>,
    interval: Duration,
    state: TaskState,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl TaskEntry {
    /// Ask the loop to exit and hand back its join handle.
    fn signal_stop(&mut self) -> Option<JoinHandle<()>> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        self.state = TaskState::Stopped;
        self.handle.take()
    }
}

/// Runs named tasks on independent intervals.
///
/// The lock only guards the registry; task runs never hold it.
#[derive(Default)]
pub struct Scheduler {
    tasks: RwLock<HashMap<String, TaskEntry>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `task` to `name`. An existing entry under the same name is
    /// replaced, and its loop (if running) is told to stop.
    pub async fn register(
        &self,
        name: impl Into<String>,
        task: Arc<dyn ScheduledTask>,
        interval: Duration,
    ) -> Result<()> {
        let name = name.into();
        if interval.is_zero() {
            return Err(ServiceError::Config(format!(
                "task {name} needs a non-zero interval"
            )));
        }

        let entry = TaskEntry {
            task,
            interval,
            state: TaskState::Registered,
            shutdown: None,
            handle: None,
        };

        let mut tasks = self.tasks.write().await;
        if let Some(mut previous) = tasks.insert(name.clone(), entry) {
            warn!(job_name = %name, "Task re-registered, replacing previous entry");
            // Detached: the old loop exits after its current run, if any.
            drop(previous.signal_stop());
        }

        info!(job_name = %name, interval_ms = interval.as_millis() as u64, "Task registered");
        Ok(())
    }

    /// Launch every task still in `Registered` state.
    pub async fn start(&self) {
        let mut tasks = self.tasks.write().await;
        let mut started = 0usize;

        for (name, entry) in tasks.iter_mut() {
            if entry.state != TaskState::Registered {
                continue;
            }

            let (tx, rx) = watch::channel(false);
            let handle = tokio::spawn(run_task_loop(
                name.clone(),
                Arc::clone(&entry.task),
                entry.interval,
                rx,
            ));

            entry.shutdown = Some(tx);
            entry.handle = Some(handle);
            entry.state = TaskState::Running;
            started += 1;
        }

        info!(started, total = tasks.len(), "Scheduler started");
    }

    /// Signal every loop to exit and wait for in-flight runs to finish.
    pub async fn stop(&self) {
        let handles: Vec<(String, JoinHandle<()>)> = {
            let mut tasks = self.tasks.write().await;
            tasks
                .iter_mut()
                .filter_map(|(name, entry)| entry.signal_stop().map(|h| (name.clone(), h)))
                .collect()
        };

        for (name, handle) in handles {
            if let Err(e) = handle.await {
                error!(job_name = %name, error = %e, "Task loop terminated abnormally");
            }
        }

        info!("Scheduler stopped");
    }

    /// Registered tasks sorted by name
    pub async fn tasks(&self) -> Vec<TaskInfo> {
        let tasks = self.tasks.read().await;
        let mut infos: Vec<TaskInfo> = tasks
            .iter()
            .map(|(name, entry)| TaskInfo {
                name: name.clone(),
                interval: entry.interval,
                state: entry.state,
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}
