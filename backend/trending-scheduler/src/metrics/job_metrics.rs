//! Job metrics
//!
//! Tracks run outcomes, latency and published list sizes per task.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec_with_registry, register_gauge_vec_with_registry,
    register_histogram_vec_with_registry, CounterVec, GaugeVec, HistogramVec,
};

use super::REGISTRY;

lazy_static! {
    /// Total task runs (labels: job_name, status=success|failed|panicked)
    pub static ref JOB_RUNS_TOTAL: CounterVec = register_counter_vec_with_registry!(
        "inkspace_job_runs_total",
        "Total number of scheduled task runs",
        &["job_name", "status"],
        REGISTRY
    )
    .expect("Failed to register metric");

    /// Task run duration in seconds (labels: job_name)
    pub static ref JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec_with_registry!(
        "inkspace_job_duration_seconds",
        "Time spent running scheduled tasks",
        &["job_name"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
        REGISTRY
    )
    .expect("Failed to register metric");

    /// Unix timestamp of the last successful run (labels: job_name)
    pub static ref JOB_LAST_SUCCESS_TIMESTAMP: GaugeVec = register_gauge_vec_with_registry!(
        "inkspace_job_last_success_timestamp",
        "Unix timestamp of the last successful task run",
        &["job_name"],
        REGISTRY
    )
    .expect("Failed to register metric");

    /// Consecutive failed runs (labels: job_name)
    pub static ref JOB_CONSECUTIVE_FAILURES: GaugeVec = register_gauge_vec_with_registry!(
        "inkspace_job_consecutive_failures",
        "Number of consecutive failures for a task",
        &["job_name"],
        REGISTRY
    )
    .expect("Failed to register metric");

    /// Members written to a ranked set by the last publish (labels: key)
    pub static ref RANKED_ENTRIES: GaugeVec = register_gauge_vec_with_registry!(
        "inkspace_ranked_entries",
        "Number of entries in the last published ranked set",
        &["key"],
        REGISTRY
    )
    .expect("Failed to register metric");
}

pub mod helpers {
    use super::*;
    use std::time::Instant;

    pub fn record_job_success(job_name: &str, duration_ms: u64) {
        JOB_RUNS_TOTAL
            .with_label_values(&[job_name, "success"])
            .inc();

        JOB_DURATION_SECONDS
            .with_label_values(&[job_name])
            .observe(duration_ms as f64 / 1000.0);

        JOB_LAST_SUCCESS_TIMESTAMP
            .with_label_values(&[job_name])
            .set(chrono::Utc::now().timestamp() as f64);

        JOB_CONSECUTIVE_FAILURES
            .with_label_values(&[job_name])
            .set(0.0);
    }

    /// `status` is `failed` for an error return, `panicked` for a caught panic
    pub fn record_job_failure(
        job_name: &str,
        status: &str,
        duration_ms: u64,
        consecutive_failures: u32,
    ) {
        JOB_RUNS_TOTAL
            .with_label_values(&[job_name, status])
            .inc();

        JOB_DURATION_SECONDS
            .with_label_values(&[job_name])
            .observe(duration_ms as f64 / 1000.0);

        JOB_CONSECUTIVE_FAILURES
            .with_label_values(&[job_name])
            .set(consecutive_failures as f64);
    }

    pub fn record_ranked_entries(key: &str, entries: usize) {
        RANKED_ENTRIES.with_label_values(&[key]).set(entries as f64);
    }

    /// Timer guard for run duration tracking
    pub struct JobTimer {
        start: Instant,
        job_name: String,
    }

    impl JobTimer {
        pub fn new(job_name: impl Into<String>) -> Self {
            Self {
                start: Instant::now(),
                job_name: job_name.into(),
            }
        }

        pub fn elapsed_ms(&self) -> u64 {
            self.start.elapsed().as_millis() as u64
        }

        pub fn observe_success(self) {
            record_job_success(&self.job_name, self.elapsed_ms());
        }

        pub fn observe_failure(self, status: &str, consecutive_failures: u32) {
            record_job_failure(&self.job_name, status, self.elapsed_ms(), consecutive_failures);
        }
    }
}
