//! Monitor scheduler.
//!
//! One repeated job per running monitor plus the system jobs (health-alert
//! scan, retention cleanup) on their own cadences, all on a shared
//! `JobScheduler`. The running-monitor table is keyed by monitor id and
//! guarded by a single mutex; each monitor additionally carries a run mutex
//! so its probe executions never overlap and the previous-result read always
//! pairs with the matching insert.

use anyhow::{anyhow, Result};
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ConfigStore;
use crate::crypto::CryptoBox;
use crate::jobs::{DataCleanupJob, HealthAlertJob};
use crate::models::{Monitor, MonitorStatus, MonitorType};
use crate::notifier::{self, EmailService};
use crate::probes;
use crate::store::Store;

struct RegisteredMonitor {
    monitor: Monitor,
    job_id: Uuid,
}

type RunningMap = Arc<Mutex<HashMap<String, RegisteredMonitor>>>;

struct RunContext {
    store: Arc<Store>,
    crypto: Arc<CryptoBox>,
    email: Arc<EmailService>,
    running: RunningMap,
    monitor_id: String,
    run_lock: Mutex<()>,
}

enum SystemJobEntry {
    HealthAlert(Arc<HealthAlertJob>),
    DataCleanup(Arc<DataCleanupJob>),
}

impl SystemJobEntry {
    async fn run(&self) -> bool {
        match self {
            SystemJobEntry::HealthAlert(job) => job.run().await,
            SystemJobEntry::DataCleanup(job) => job.run().await,
        }
    }

    async fn status(&self) -> Value {
        match self {
            SystemJobEntry::HealthAlert(job) => job.tracker().status().await,
            SystemJobEntry::DataCleanup(job) => job.tracker().status().await,
        }
    }
}

pub struct MonitorScheduler {
    store: Arc<Store>,
    crypto: Arc<CryptoBox>,
    email: Arc<EmailService>,
    scheduler: JobScheduler,
    running: RunningMap,
    system_jobs: BTreeMap<String, SystemJobEntry>,
}

impl MonitorScheduler {
    pub async fn new(
        store: Arc<Store>,
        crypto: Arc<CryptoBox>,
        config: Arc<ConfigStore>,
        email: Arc<EmailService>,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create job scheduler: {}", e))?;

        let mut system_jobs = BTreeMap::new();
        let app_config = config.current().await;

        if app_config.health_alerts.enabled {
            let job = Arc::new(HealthAlertJob::new(
                store.clone(),
                config.clone(),
                email.clone(),
            ));
            let interval_minutes = app_config.health_alerts.check_interval_minutes.max(1);
            let job_clone = job.clone();
            let cron_job = Job::new_repeated_async(
                Duration::from_secs(interval_minutes * 60),
                move |_uuid, _lock| {
                    let job = job_clone.clone();
                    Box::pin(async move {
                        job.run().await;
                    })
                },
            )
            .map_err(|e| anyhow!("Failed to create health alert job: {}", e))?;
            scheduler
                .add(cron_job)
                .await
                .map_err(|e| anyhow!("Failed to add health alert job: {}", e))?;
            system_jobs.insert(
                "health_alert".to_string(),
                SystemJobEntry::HealthAlert(job),
            );
            info!(
                "Health alert job scheduled to run every {} minutes",
                interval_minutes
            );
        }

        if app_config.data_cleanup.enabled {
            let job = Arc::new(DataCleanupJob::new(store.clone(), config.clone()));
            let interval_hours = app_config.data_cleanup.cleanup_interval_hours.max(1);
            let job_clone = job.clone();
            let cron_job = Job::new_repeated_async(
                Duration::from_secs(interval_hours * 3600),
                move |_uuid, _lock| {
                    let job = job_clone.clone();
                    Box::pin(async move {
                        job.run().await;
                    })
                },
            )
            .map_err(|e| anyhow!("Failed to create data cleanup job: {}", e))?;
            scheduler
                .add(cron_job)
                .await
                .map_err(|e| anyhow!("Failed to add data cleanup job: {}", e))?;
            system_jobs.insert(
                "data_cleanup".to_string(),
                SystemJobEntry::DataCleanup(job),
            );
            info!(
                "Data cleanup job scheduled to run every {} hours",
                interval_hours
            );
        }

        scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start job scheduler: {}", e))?;

        Ok(Self {
            store,
            crypto,
            email,
            scheduler,
            running: Arc::new(Mutex::new(HashMap::new())),
            system_jobs,
        })
    }

    /// Register a monitor and run its first check immediately. Returns false
    /// when the monitor is already scheduled.
    pub async fn schedule_monitor(&self, mut monitor: Monitor) -> Result<bool> {
        let ctx;
        {
            let mut running = self.running.lock().await;
            if running.contains_key(&monitor.id) {
                warn!(
                    "Monitor {} ({}) is already scheduled",
                    monitor.name, monitor.id
                );
                return Ok(false);
            }

            monitor.status = MonitorStatus::Unknown;
            monitor.touch();
            self.store.save_monitor(&monitor).await?;

            let (job_id, run_ctx) = self.register_job(&monitor).await?;
            ctx = run_ctx;
            running.insert(
                monitor.id.clone(),
                RegisteredMonitor {
                    monitor: monitor.clone(),
                    job_id,
                },
            );

            info!(
                "Scheduled monitor: {} ({}) - Interval: {}s",
                monitor.name, monitor.id, monitor.check_interval_seconds
            );
        }

        // First check fires right away, outside the registration lock.
        run_monitor_check(&ctx).await;
        Ok(true)
    }

    /// Unregister a monitor and mark it OFFLINE. Returns false when it was
    /// not scheduled.
    pub async fn stop_monitor(&self, monitor_id: &str) -> Result<bool> {
        let entry = {
            let mut running = self.running.lock().await;
            running.remove(monitor_id)
        };

        let entry = match entry {
            Some(entry) => entry,
            None => {
                warn!("Monitor {} is not scheduled", monitor_id);
                return Ok(false);
            }
        };

        if let Err(e) = self.scheduler.remove(&entry.job_id).await {
            warn!("Failed to remove job for monitor {}: {}", monitor_id, e);
        }

        if let Some(mut monitor) = self.store.get_monitor(monitor_id).await? {
            monitor.status = MonitorStatus::Offline;
            monitor.touch();
            self.store.save_monitor(&monitor).await?;
        }

        info!("Stopped monitor: {}", monitor_id);
        Ok(true)
    }

    /// Re-register a running monitor at its (possibly new) interval. The
    /// first check of the new registration waits for the interval; only
    /// initial scheduling probes immediately.
    pub async fn reschedule_monitor(&self, mut monitor: Monitor) -> Result<bool> {
        let mut running = self.running.lock().await;

        let entry = match running.remove(&monitor.id) {
            Some(entry) => entry,
            None => {
                warn!(
                    "Monitor {} ({}) is not scheduled",
                    monitor.name, monitor.id
                );
                return Ok(false);
            }
        };

        if let Err(e) = self.scheduler.remove(&entry.job_id).await {
            warn!("Failed to remove job for monitor {}: {}", monitor.id, e);
        }

        monitor.status = MonitorStatus::Unknown;
        monitor.touch();
        self.store.save_monitor(&monitor).await?;

        let (job_id, _ctx) = self.register_job(&monitor).await?;
        running.insert(
            monitor.id.clone(),
            RegisteredMonitor {
                monitor: monitor.clone(),
                job_id,
            },
        );

        info!(
            "Rescheduled monitor: {} ({}) - Interval: {}s",
            monitor.name, monitor.id, monitor.check_interval_seconds
        );
        Ok(true)
    }

    /// Snapshot of the registered monitors, optionally filtered.
    pub async fn list_running(
        &self,
        space_id: Option<&str>,
        monitor_type: Option<MonitorType>,
    ) -> Vec<Monitor> {
        let running = self.running.lock().await;
        running
            .values()
            .filter(|entry| space_id.map_or(true, |sid| entry.monitor.space_id == sid))
            .filter(|entry| monitor_type.map_or(true, |t| entry.monitor.monitor_type() == t))
            .map(|entry| entry.monitor.clone())
            .collect()
    }

    pub async fn is_monitor_running(&self, monitor_id: &str) -> bool {
        self.running.lock().await.contains_key(monitor_id)
    }

    /// Register every monitor in the space that is not already running.
    pub async fn start_all_monitors_in_space(&self, space_id: &str) -> Result<usize> {
        let monitors = self.store.get_monitors_for_space(space_id).await?;
        info!("Found {} monitors in space: {}", monitors.len(), space_id);

        let to_schedule: Vec<Monitor> = {
            let running = self.running.lock().await;
            monitors
                .into_iter()
                .filter(|monitor| !running.contains_key(&monitor.id))
                .collect()
        };

        // Each registration probes once immediately; run them concurrently
        // so one slow target does not serialize the whole space.
        let outcomes = join_all(
            to_schedule
                .into_iter()
                .map(|monitor| self.schedule_monitor(monitor)),
        )
        .await;

        let mut started = 0usize;
        for outcome in outcomes {
            match outcome {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to schedule monitor in space {}: {}", space_id, e),
            }
        }

        info!("Started {} monitors in space: {}", started, space_id);
        Ok(started)
    }

    pub async fn stop_all_monitors_in_space(&self, space_id: &str) {
        let ids: Vec<String> = {
            let running = self.running.lock().await;
            running
                .values()
                .filter(|entry| entry.monitor.space_id == space_id)
                .map(|entry| entry.monitor.id.clone())
                .collect()
        };

        for monitor_id in ids {
            if let Err(e) = self.stop_monitor(&monitor_id).await {
                error!("Failed to stop monitor {}: {}", monitor_id, e);
            }
        }
        info!("Stopped all monitors in space: {}", space_id);
    }

    pub async fn stop_all_monitors(&self) {
        let ids: Vec<String> = {
            let running = self.running.lock().await;
            running.keys().cloned().collect()
        };

        for monitor_id in ids {
            if let Err(e) = self.stop_monitor(&monitor_id).await {
                error!("Failed to stop monitor {}: {}", monitor_id, e);
            }
        }
        info!("Stopped all monitors");
    }

    /// Counter snapshot of every system job on the schedule.
    pub async fn get_system_job_status(&self) -> Vec<Value> {
        let mut statuses = Vec::new();
        for entry in self.system_jobs.values() {
            let mut status = entry.status().await;
            if let Some(object) = status.as_object_mut() {
                object.insert("enabled".to_string(), json!(true));
            }
            statuses.push(status);
        }
        statuses
    }

    /// Run a system job by canonical name (`health_alert`, `data_cleanup`).
    pub async fn run_system_job_manually(&self, job_name: &str) -> bool {
        match self.system_jobs.get(job_name) {
            Some(entry) => {
                info!("Manually running system job: {}", job_name);
                entry.run().await
            }
            None => {
                warn!("System job not found: {}", job_name);
                false
            }
        }
    }

    /// Unregister everything and tear the tick loop down. In-flight probes
    /// finish up to their own timeouts.
    pub async fn shutdown(&self) -> Result<()> {
        self.stop_all_monitors().await;
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to shut down job scheduler: {}", e))
    }

    async fn register_job(&self, monitor: &Monitor) -> Result<(Uuid, Arc<RunContext>)> {
        let ctx = Arc::new(RunContext {
            store: self.store.clone(),
            crypto: self.crypto.clone(),
            email: self.email.clone(),
            running: self.running.clone(),
            monitor_id: monitor.id.clone(),
            run_lock: Mutex::new(()),
        });

        let job_ctx = ctx.clone();
        let interval = Duration::from_secs(u64::from(monitor.check_interval_seconds.max(1)));
        let job = Job::new_repeated_async(interval, move |_uuid, _lock| {
            let ctx = job_ctx.clone();
            Box::pin(async move {
                run_monitor_check(&ctx).await;
            })
        })
        .map_err(|e| anyhow!("Failed to create job for monitor {}: {}", monitor.id, e))?;

        let job_id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add job for monitor {}: {}", monitor.id, e))?;

        Ok((job_id, ctx))
    }
}

/// One probe execution: probe, update the monitor, persist result + monitor,
/// and apply the notification decision. Non-reentrant per monitor.
async fn run_monitor_check(ctx: &RunContext) {
    let _guard = ctx.run_lock.lock().await;

    // A fire that raced with stop/unregister must not touch the monitor.
    if !ctx.running.lock().await.contains_key(&ctx.monitor_id) {
        return;
    }

    let mut monitor = match ctx.store.get_monitor(&ctx.monitor_id).await {
        Ok(Some(monitor)) => monitor,
        Ok(None) => {
            warn!("Monitor {} no longer exists, skipping check", ctx.monitor_id);
            return;
        }
        Err(e) => {
            warn!("Failed to load monitor {}: {}", ctx.monitor_id, e);
            return;
        }
    };

    info!("Running monitor check: {} ({})", monitor.name, monitor.id);

    let result = probes::run_probe(&monitor, &ctx.crypto).await;

    monitor.status = result.status;
    monitor.mark_checked();
    if result.status == MonitorStatus::Healthy {
        monitor.mark_healthy();
    }

    // The most recent prior result, read before the new one is stored.
    let previous = match ctx.store.get_results_for_monitor(&monitor.id, 1).await {
        Ok(mut results) => results.pop(),
        Err(e) => {
            warn!("Failed to load previous result for {}: {}", monitor.id, e);
            None
        }
    };

    if let Err(e) = ctx.store.save_result(&result).await {
        warn!("Failed to store result for monitor {}: {}", monitor.id, e);
    }
    if let Err(e) = ctx.store.save_monitor(&monitor).await {
        warn!("Failed to store monitor {}: {}", monitor.id, e);
    }

    info!(
        "Monitor check completed: {} ({}) - Status: {}",
        monitor.name,
        monitor.id,
        result.status.as_str()
    );

    // Keep the running-table snapshot in sync for list_running.
    {
        let mut running = ctx.running.lock().await;
        if let Some(entry) = running.get_mut(&ctx.monitor_id) {
            entry.monitor = monitor.clone();
        }
    }

    if notifier::should_notify(&result, previous.as_ref()) {
        match ctx.store.get_space(&monitor.space_id).await {
            Ok(Some(space)) if !space.notification_emails.is_empty() => {
                if ctx.email.send_monitor_result_email(&space, &result).await {
                    info!(
                        "Status change notification sent for monitor: {}",
                        monitor.name
                    );
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to load space {}: {}", monitor.space_id, e),
        }
    }
}
