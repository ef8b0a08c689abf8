//! System jobs: the health-alert scan and data-retention cleanup.
//!
//! Each job keeps its own run counters so the control channel can report
//! name, last run, run count, error count and success rate.

pub mod data_cleanup;
pub mod health_alert;

pub use data_cleanup::DataCleanupJob;
pub use health_alert::HealthAlertJob;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct JobCounters {
    last_run: Option<DateTime<Utc>>,
    run_count: u64,
    error_count: u64,
}

/// Run bookkeeping shared by all system jobs.
pub struct JobTracker {
    name: String,
    counters: Mutex<JobCounters>,
}

impl JobTracker {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            counters: Mutex::new(JobCounters::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wrap one job execution: logs start/finish and updates counters.
    pub async fn run<F>(&self, execute: F) -> bool
    where
        F: std::future::Future<Output = bool>,
    {
        info!("Starting job: {}", self.name);
        let started = Instant::now();

        let success = execute.await;

        let duration = started.elapsed().as_secs_f64();
        let mut counters = self.counters.lock().await;
        counters.last_run = Some(Utc::now());
        counters.run_count += 1;

        if success {
            info!("Job {} completed successfully in {:.2}s", self.name, duration);
        } else {
            counters.error_count += 1;
            warn!("Job {} completed with errors in {:.2}s", self.name, duration);
        }

        success
    }

    pub async fn status(&self) -> Value {
        let counters = self.counters.lock().await;
        let success_rate = if counters.run_count > 0 {
            (counters.run_count - counters.error_count) as f64 / counters.run_count as f64
        } else {
            0.0
        };

        json!({
            "name": self.name,
            "last_run": counters.last_run.map(|t| t.to_rfc3339()),
            "run_count": counters.run_count,
            "error_count": counters.error_count,
            "success_rate": success_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracker_counts_runs_and_errors() {
        let tracker = JobTracker::new("test_job");

        assert!(tracker.run(async { true }).await);
        assert!(!tracker.run(async { false }).await);
        assert!(tracker.run(async { true }).await);

        let status = tracker.status().await;
        assert_eq!(status["name"], "test_job");
        assert_eq!(status["run_count"], 3);
        assert_eq!(status["error_count"], 1);
        assert!(status["last_run"].is_string());
        let rate = status["success_rate"].as_f64().unwrap();
        assert!((rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn fresh_tracker_reports_zero_rate() {
        let tracker = JobTracker::new("idle");
        let status = tracker.status().await;
        assert_eq!(status["run_count"], 0);
        assert_eq!(status["success_rate"], 0.0);
        assert!(status["last_run"].is_null());
    }
}
