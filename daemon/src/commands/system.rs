//! System commands: daemon status, system jobs and the cleanup preview.

use serde_json::{json, Value};

use super::{str_field, CommandRouter};
use crate::errors::CommandError;

/// CLI aliases map onto canonical job names.
fn canonical_job_name(name: &str) -> &str {
    match name {
        "health-alerts" | "health_alert" => "health_alert",
        "data-cleanup" | "data_cleanup" => "data_cleanup",
        other => other,
    }
}

pub(super) async fn get_status(
    router: &CommandRouter,
    _cmd: &Value,
) -> Result<Value, CommandError> {
    let running = router.scheduler.list_running(None, None).await;
    let monitors: Vec<Value> = running
        .iter()
        .map(|monitor| serde_json::to_value(monitor).unwrap_or(Value::Null))
        .collect();

    Ok(json!({
        "status": "success",
        "running": true,
        "total_monitors": monitors.len(),
        "monitors": monitors,
    }))
}

pub(super) async fn get_job_status(
    router: &CommandRouter,
    _cmd: &Value,
) -> Result<Value, CommandError> {
    let jobs = router.scheduler.get_system_job_status().await;
    Ok(json!({ "status": "success", "jobs": jobs }))
}

pub(super) async fn run_job_manually(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let job_name = str_field(cmd, "job_name")
        .ok_or_else(|| CommandError::Validation("Job name required".to_string()))?;

    let canonical = canonical_job_name(job_name);
    if router.scheduler.run_system_job_manually(canonical).await {
        Ok(json!({
            "status": "success",
            "message": format!("Job {} completed successfully", job_name),
        }))
    } else {
        Ok(json!({
            "status": "error",
            "message": format!("Job {} failed or not found", job_name),
        }))
    }
}

pub(super) async fn get_cleanup_preview(
    router: &CommandRouter,
    _cmd: &Value,
) -> Result<Value, CommandError> {
    let config = router.config.current().await;
    let preview = router
        .store
        .cleanup_preview(
            config.data_cleanup.keep_healthy_results_days,
            config.data_cleanup.keep_unhealthy_results_days,
        )
        .await?;

    Ok(json!({
        "status": "success",
        "preview": serde_json::to_value(&preview).unwrap_or(Value::Null),
    }))
}

pub(super) async fn reload_email_config(
    router: &CommandRouter,
    _cmd: &Value,
) -> Result<Value, CommandError> {
    match router.config.reload().await {
        Ok(()) => Ok(json!({
            "status": "success",
            "message": "Email configuration reloaded successfully",
        })),
        Err(e) => Ok(json!({
            "status": "error",
            "message": format!("Failed to reload email configuration: {}", e),
        })),
    }
}
