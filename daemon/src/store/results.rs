//! Result history and retention queries.
//!
//! Results are append-only. Retention deletes in bounded batches so a large
//! backlog never holds a long write transaction.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::time::Instant;
use tracing::{debug, error, info};

use super::Store;
use crate::models::{MonitorResult, MonitorStatus, MonitorType};

/// What a cleanup run would remove, without removing anything.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupPreview {
    pub healthy_to_delete: i64,
    pub unhealthy_to_delete: i64,
    pub total_to_delete: i64,
    pub total_results: i64,
    pub retention_after_cleanup: i64,
    pub healthy_cutoff_date: DateTime<Utc>,
    pub unhealthy_cutoff_date: DateTime<Utc>,
}

/// Outcome of one batched cleanup run.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupStats {
    pub healthy_deleted: u64,
    pub unhealthy_deleted: u64,
    pub total_deleted: u64,
    pub batches_processed: u64,
    pub duration_seconds: f64,
}

fn row_to_result(row: &SqliteRow) -> Result<MonitorResult> {
    let status: String = row.try_get("status")?;
    let monitor_type: String = row.try_get("monitor_type")?;
    let check_list: Option<String> = row.try_get("check_list")?;
    let details: Option<String> = row.try_get("details")?;

    Ok(MonitorResult {
        id: row.try_get("id")?,
        monitor_id: row.try_get("monitor_id")?,
        space_id: row.try_get("space_id")?,
        monitor_type: MonitorType::parse(&monitor_type)
            .ok_or_else(|| anyhow!("Unknown monitor type in store: {}", monitor_type))?,
        timestamp: row.try_get("timestamp")?,
        status: MonitorStatus::parse(&status)
            .ok_or_else(|| anyhow!("Unknown result status in store: {}", status))?,
        response_time_ms: row
            .try_get::<Option<f64>, _>("response_time_ms")?
            .unwrap_or(0.0),
        failed_checks: row.try_get::<i64, _>("failed_checks")? as u32,
        check_list: check_list
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default(),
        details: details
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or(serde_json::Value::Null),
    })
}

impl Store {
    /// Insert only; results are never updated.
    pub async fn save_result(&self, result: &MonitorResult) -> Result<()> {
        debug!("Storing result for monitor: {}", result.monitor_id);

        let check_list = serde_json::to_string(&result.check_list)?;
        let details = result.details.to_string();

        match sqlx::query(
            r#"
            INSERT INTO monitor_results (
                id, monitor_id, space_id, monitor_type, timestamp, status,
                response_time_ms, failed_checks, check_list, details
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&result.id)
        .bind(&result.monitor_id)
        .bind(&result.space_id)
        .bind(result.monitor_type.as_str())
        .bind(result.timestamp)
        .bind(result.status.as_str())
        .bind(result.response_time_ms)
        .bind(result.failed_checks as i64)
        .bind(&check_list)
        .bind(&details)
        .execute(&self.pool)
        .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(
                    "Failed to store result for monitor {}: {}",
                    result.monitor_id, e
                );
                Err(e.into())
            }
        }
    }

    pub async fn get_results_for_monitor(
        &self,
        monitor_id: &str,
        limit: i64,
    ) -> Result<Vec<MonitorResult>> {
        let rows = sqlx::query(
            "SELECT * FROM monitor_results WHERE monitor_id = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(monitor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_result).collect()
    }

    pub async fn get_results_for_space(
        &self,
        space_id: &str,
        limit: i64,
    ) -> Result<Vec<MonitorResult>> {
        let rows = sqlx::query(
            "SELECT * FROM monitor_results WHERE space_id = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(space_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_result).collect()
    }

    /// Count what a cleanup with the given TTLs would remove. HEALTHY results
    /// age against the healthy cutoff; UNHEALTHY and UNKNOWN against the
    /// unhealthy one. OFFLINE is never produced by probes.
    pub async fn cleanup_preview(
        &self,
        keep_healthy_days: i64,
        keep_unhealthy_days: i64,
    ) -> Result<CleanupPreview> {
        let now = Utc::now();
        let healthy_cutoff = now - Duration::days(keep_healthy_days);
        let unhealthy_cutoff = now - Duration::days(keep_unhealthy_days);

        let healthy_to_delete: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM monitor_results WHERE status = 'healthy' AND timestamp < ?",
        )
        .bind(healthy_cutoff)
        .fetch_one(&self.pool)
        .await?;

        let unhealthy_to_delete: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM monitor_results WHERE status IN ('unhealthy', 'unknown') AND timestamp < ?",
        )
        .bind(unhealthy_cutoff)
        .fetch_one(&self.pool)
        .await?;

        let total_results: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM monitor_results")
            .fetch_one(&self.pool)
            .await?;

        let total_to_delete = healthy_to_delete + unhealthy_to_delete;
        Ok(CleanupPreview {
            healthy_to_delete,
            unhealthy_to_delete,
            total_to_delete,
            total_results,
            retention_after_cleanup: total_results - total_to_delete,
            healthy_cutoff_date: healthy_cutoff,
            unhealthy_cutoff_date: unhealthy_cutoff,
        })
    }

    /// Delete results past their TTL in batches of `batch_size`, committing
    /// per batch.
    pub async fn cleanup_old_results(
        &self,
        keep_healthy_days: i64,
        keep_unhealthy_days: i64,
        batch_size: i64,
    ) -> Result<CleanupStats> {
        let started = Instant::now();
        let now = Utc::now();
        let healthy_cutoff = now - Duration::days(keep_healthy_days);
        let unhealthy_cutoff = now - Duration::days(keep_unhealthy_days);

        let mut batches_processed = 0u64;

        let healthy_deleted = self
            .cleanup_results_by_status("healthy", healthy_cutoff, batch_size, &mut batches_processed)
            .await?;

        let mut unhealthy_deleted = 0u64;
        for status in ["unhealthy", "unknown"] {
            unhealthy_deleted += self
                .cleanup_results_by_status(status, unhealthy_cutoff, batch_size, &mut batches_processed)
                .await?;
        }

        let stats = CleanupStats {
            healthy_deleted,
            unhealthy_deleted,
            total_deleted: healthy_deleted + unhealthy_deleted,
            batches_processed,
            duration_seconds: started.elapsed().as_secs_f64(),
        };

        info!(
            "Cleanup removed {} results ({} healthy, {} unhealthy/unknown) in {} batches",
            stats.total_deleted, stats.healthy_deleted, stats.unhealthy_deleted, stats.batches_processed
        );
        Ok(stats)
    }

    async fn cleanup_results_by_status(
        &self,
        status: &str,
        cutoff: DateTime<Utc>,
        batch_size: i64,
        batches_processed: &mut u64,
    ) -> Result<u64> {
        let mut total_deleted = 0u64;

        loop {
            let deleted = sqlx::query(
                r#"
                DELETE FROM monitor_results WHERE id IN (
                    SELECT id FROM monitor_results
                    WHERE status = ? AND timestamp < ?
                    LIMIT ?
                )
                "#,
            )
            .bind(status)
            .bind(cutoff)
            .bind(batch_size)
            .execute(&self.pool)
            .await?
            .rows_affected();

            if deleted == 0 {
                break;
            }

            total_deleted += deleted;
            *batches_processed += 1;

            if (deleted as i64) < batch_size {
                break;
            }
        }

        Ok(total_deleted)
    }
}
