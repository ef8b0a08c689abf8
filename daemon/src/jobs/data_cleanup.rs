//! Retention cleanup.
//!
//! Deletes results past their status-specific TTL in bounded batches. A run
//! that would remove more than 90% of all stored results aborts without
//! touching anything.

use std::sync::Arc;
use tracing::{error, info, warn};

use super::JobTracker;
use crate::config::ConfigStore;
use crate::store::Store;

pub const DEFAULT_BATCH_SIZE: i64 = 1000;
const MAX_DELETION_PERCENTAGE: f64 = 90.0;

pub struct DataCleanupJob {
    store: Arc<Store>,
    config: Arc<ConfigStore>,
    tracker: JobTracker,
}

impl DataCleanupJob {
    pub fn new(store: Arc<Store>, config: Arc<ConfigStore>) -> Self {
        Self {
            store,
            config,
            tracker: JobTracker::new("data_cleanup"),
        }
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub async fn run(&self) -> bool {
        self.tracker.run(self.execute()).await
    }

    async fn execute(&self) -> bool {
        let config = self.config.current().await;

        if !config.data_cleanup.enabled {
            info!("Data cleanup is disabled");
            return true;
        }

        let mut keep_healthy_days = config.data_cleanup.keep_healthy_results_days;
        let mut keep_unhealthy_days = config.data_cleanup.keep_unhealthy_results_days;

        // Very recent data is never eligible for cleanup.
        if keep_healthy_days < 1 {
            warn!("keep_healthy_results_days must be at least 1, using default of 7");
            keep_healthy_days = 7;
        }
        if keep_unhealthy_days < 1 {
            warn!("keep_unhealthy_results_days must be at least 1, using default of 30");
            keep_unhealthy_days = 30;
        }

        let preview = match self
            .store
            .cleanup_preview(keep_healthy_days, keep_unhealthy_days)
            .await
        {
            Ok(preview) => preview,
            Err(e) => {
                error!("Failed to compute cleanup preview: {}", e);
                return false;
            }
        };

        info!(
            "Cleanup preview: {} results will be deleted ({} healthy >{}d, {} unhealthy >{}d), {} of {} remain",
            preview.total_to_delete,
            preview.healthy_to_delete,
            keep_healthy_days,
            preview.unhealthy_to_delete,
            keep_unhealthy_days,
            preview.retention_after_cleanup,
            preview.total_results,
        );

        if preview.total_to_delete == 0 {
            info!("No old results found to cleanup");
            return true;
        }

        if preview.total_results > 0 {
            let deletion_percentage =
                preview.total_to_delete as f64 / preview.total_results as f64 * 100.0;
            if deletion_percentage > MAX_DELETION_PERCENTAGE {
                error!(
                    "Safety check failed: would delete {:.1}% of all data. Aborting cleanup.",
                    deletion_percentage
                );
                return false;
            }
        }

        info!("Starting data cleanup operation...");
        let stats = match self
            .store
            .cleanup_old_results(keep_healthy_days, keep_unhealthy_days, DEFAULT_BATCH_SIZE)
            .await
        {
            Ok(stats) => stats,
            Err(e) => {
                error!("Data cleanup failed: {}", e);
                return false;
            }
        };

        info!(
            "Data cleanup done: {} healthy + {} unhealthy deleted in {} batches over {:.2}s",
            stats.healthy_deleted,
            stats.unhealthy_deleted,
            stats.batches_processed,
            stats.duration_seconds,
        );
        true
    }
}
