//! Monitor commands.

use serde_json::{json, Map, Value};

use super::{str_field, CommandRouter};
use crate::errors::CommandError;
use crate::models::{Monitor, MonitorSpec};

fn monitor_value(monitor: &Monitor, running: bool) -> Value {
    let mut value = serde_json::to_value(monitor).unwrap_or(Value::Null);
    if let Some(object) = value.as_object_mut() {
        object.insert("running".to_string(), json!(running));
    }
    value
}

async fn resolve_monitor(router: &CommandRouter, cmd: &Value) -> Result<Monitor, CommandError> {
    let monitor_id = str_field(cmd, "monitor_id");
    let monitor_name = str_field(cmd, "monitor_name");
    let space_id = str_field(cmd, "space_id");
    let space_name = str_field(cmd, "space_name");

    match (monitor_id, monitor_name) {
        (Some(id), _) => router
            .store
            .get_monitor(id)
            .await?
            .ok_or_else(|| CommandError::NotFound("Monitor not found".to_string())),
        (None, Some(name)) => router
            .store
            .get_monitor_by_name(name, space_id, space_name)
            .await?
            .ok_or_else(|| {
                let space_msg = space_id
                    .map(|s| format!(" in space \"{}\"", s))
                    .unwrap_or_default();
                CommandError::NotFound(format!(
                    "Monitor with name \"{}\"{} not found",
                    name, space_msg
                ))
            }),
        (None, None) => Err(CommandError::Validation(
            "Monitor ID or name required".to_string(),
        )),
    }
}

pub(super) async fn start_monitor(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let monitor = resolve_monitor(router, cmd).await?;
    let name = monitor.name.clone();

    if router.scheduler.schedule_monitor(monitor).await? {
        Ok(json!({ "status": "success", "message": format!("Monitor {} started", name) }))
    } else {
        Ok(json!({ "status": "error", "message": "Failed to start monitor" }))
    }
}

pub(super) async fn stop_monitor(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let monitor_id = str_field(cmd, "monitor_id");
    let monitor_name = str_field(cmd, "monitor_name");

    let (monitor_id, display_name) = match (monitor_id, monitor_name) {
        (Some(id), _) => {
            let display = router
                .store
                .get_monitor(id)
                .await?
                .map(|m| m.name)
                .unwrap_or_else(|| id.to_string());
            (id.to_string(), display)
        }
        (None, Some(_)) => {
            let monitor = resolve_monitor(router, cmd).await?;
            (monitor.id.clone(), monitor.name)
        }
        (None, None) => {
            return Err(CommandError::Validation(
                "Monitor ID or name required".to_string(),
            ))
        }
    };

    if router.scheduler.stop_monitor(&monitor_id).await? {
        Ok(json!({ "status": "success", "message": format!("Monitor {} stopped", display_name) }))
    } else {
        Ok(json!({ "status": "error", "message": "Failed to stop monitor" }))
    }
}

pub(super) async fn list_monitors(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let monitors = match str_field(cmd, "space_id") {
        Some(space_id) => router.store.get_monitors_for_space(space_id).await?,
        None => router.store.list_monitors().await?,
    };

    let mut values = Vec::with_capacity(monitors.len());
    for monitor in &monitors {
        let running = router.scheduler.is_monitor_running(&monitor.id).await;
        values.push(monitor_value(monitor, running));
    }

    Ok(json!({ "status": "success", "monitors": values }))
}

pub(super) async fn get_monitor(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let monitor_id = str_field(cmd, "monitor_id")
        .ok_or_else(|| CommandError::Validation("Monitor ID required".to_string()))?;

    let monitor = router
        .store
        .get_monitor(monitor_id)
        .await?
        .ok_or_else(|| CommandError::NotFound("Monitor not found".to_string()))?;

    let running = router.scheduler.is_monitor_running(&monitor.id).await;
    Ok(json!({ "status": "success", "monitor": monitor_value(&monitor, running) }))
}

pub(super) async fn create_monitor(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let monitor_data = cmd
        .get("monitor")
        .and_then(|v| v.as_object())
        .ok_or_else(|| CommandError::Validation("Monitor name and space_id required".to_string()))?;

    let name = monitor_data
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty());
    let space_id = monitor_data
        .get("space_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty());
    let (name, space_id) = match (name, space_id) {
        (Some(name), Some(space_id)) => (name, space_id),
        _ => {
            return Err(CommandError::Validation(
                "Monitor name and space_id required".to_string(),
            ))
        }
    };

    router
        .store
        .get_space(space_id)
        .await?
        .ok_or_else(|| CommandError::NotFound("Space not found".to_string()))?;

    if router
        .store
        .get_monitor_by_name(name, Some(space_id), None)
        .await?
        .is_some()
    {
        return Err(CommandError::Conflict(
            "Monitor name already exists in this space".to_string(),
        ));
    }

    let monitor_type = monitor_data
        .get("monitor_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CommandError::Validation("Monitor type required".to_string()))?;

    match monitor_type {
        "url" => {
            if !monitor_data.contains_key("url") {
                return Err(CommandError::Validation(
                    "URL required for URL monitor".to_string(),
                ));
            }
        }
        "database" => {
            for field in ["db_type", "host", "port", "database", "username"] {
                if !monitor_data.contains_key(field) {
                    return Err(CommandError::Validation(format!(
                        "{} required for database monitor",
                        field
                    )));
                }
            }
        }
        _ => return Err(CommandError::Validation("Invalid monitor type".to_string())),
    }

    // Creation controls identity and runtime state itself; the plaintext
    // password is pulled out for encryption before the definition is parsed.
    let mut data: Map<String, Value> = monitor_data.clone();
    for field in ["id", "status", "created_at", "updated_at", "last_checked_at", "last_healthy_at"] {
        data.remove(field);
    }
    let password = data.remove("password");

    let mut monitor: Monitor = serde_json::from_value(Value::Object(data))
        .map_err(|e| CommandError::Validation(format!("Invalid monitor definition: {}", e)))?;

    if let MonitorSpec::Database(spec) = &mut monitor.spec {
        if let Some(Value::String(password)) = password {
            if !password.is_empty() {
                spec.encrypted_password = router.crypto.encrypt(&password)?;
            }
        }
    }

    router.store.save_monitor(&monitor).await?;

    Ok(json!({
        "status": "success",
        "message": format!("Monitor {} created", monitor.name),
        "monitor": monitor_value(&monitor, false),
    }))
}

pub(super) async fn update_monitor(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let monitor_data = cmd
        .get("monitor")
        .and_then(|v| v.as_object())
        .ok_or_else(|| CommandError::Validation("Monitor ID required".to_string()))?;

    let monitor_id = monitor_data
        .get("id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CommandError::Validation("Monitor ID required".to_string()))?;

    let mut monitor = router
        .store
        .get_monitor(monitor_id)
        .await?
        .ok_or_else(|| CommandError::NotFound("Monitor not found".to_string()))?;

    // Name conflicts are rejected before the monitor is touched.
    if let Some(new_name) = monitor_data.get("name").and_then(|v| v.as_str()) {
        if new_name != monitor.name {
            let existing = router
                .store
                .get_monitor_by_name(new_name, Some(&monitor.space_id), None)
                .await?;
            if existing.map_or(false, |m| m.id != monitor.id) {
                return Err(CommandError::Conflict(
                    "Monitor name already exists in this space".to_string(),
                ));
            }
        }
    }

    let was_running = router.scheduler.is_monitor_running(&monitor.id).await;
    if was_running {
        router.scheduler.stop_monitor(&monitor.id).await?;
    }

    if let Some(new_name) = monitor_data.get("name").and_then(|v| v.as_str()) {
        monitor.name = new_name.to_string();
    }
    if let Some(interval) = monitor_data
        .get("check_interval_seconds")
        .and_then(|v| v.as_u64())
    {
        monitor.check_interval_seconds = interval as u32;
    }

    match &mut monitor.spec {
        MonitorSpec::Url(spec) => {
            if let Some(url) = monitor_data.get("url").and_then(|v| v.as_str()) {
                spec.url = url.to_string();
            }
            if let Some(code) = monitor_data
                .get("expected_status_code")
                .and_then(|v| v.as_u64())
            {
                spec.expected_status_code = code as u16;
            }
            if let Some(timeout) = monitor_data.get("timeout_seconds").and_then(|v| v.as_u64()) {
                spec.timeout_seconds = timeout;
            }
            if let Some(check_ssl) = monitor_data.get("check_ssl").and_then(|v| v.as_bool()) {
                spec.check_ssl = check_ssl;
            }
            if let Some(follow) = monitor_data
                .get("follow_redirects")
                .and_then(|v| v.as_bool())
            {
                spec.follow_redirects = follow;
            }
            if let Some(content) = monitor_data.get("check_content") {
                spec.check_content = content.as_str().map(|s| s.to_string());
            }
        }
        MonitorSpec::Database(spec) => {
            if let Some(host) = monitor_data.get("host").and_then(|v| v.as_str()) {
                spec.host = host.to_string();
            }
            if let Some(port) = monitor_data.get("port").and_then(|v| v.as_u64()) {
                spec.port = port as u16;
            }
            if let Some(database) = monitor_data.get("database").and_then(|v| v.as_str()) {
                spec.database = database.to_string();
            }
            if let Some(username) = monitor_data.get("username").and_then(|v| v.as_str()) {
                spec.username = username.to_string();
            }
            if let Some(password) = monitor_data.get("password").and_then(|v| v.as_str()) {
                if !password.is_empty() {
                    spec.encrypted_password = router.crypto.encrypt(password)?;
                }
            }
            if let Some(timeout) = monitor_data
                .get("connection_timeout_seconds")
                .and_then(|v| v.as_u64())
            {
                spec.connection_timeout_seconds = timeout;
            }
            if let Some(timeout) = monitor_data
                .get("query_timeout_seconds")
                .and_then(|v| v.as_u64())
            {
                spec.query_timeout_seconds = timeout;
            }
            if let Some(query) = monitor_data.get("test_query").and_then(|v| v.as_str()) {
                spec.test_query = query.to_string();
            }
        }
    }

    monitor.touch();
    router.store.save_monitor(&monitor).await?;

    if was_running {
        router.scheduler.schedule_monitor(monitor.clone()).await?;
    }

    let running = router.scheduler.is_monitor_running(&monitor.id).await;
    Ok(json!({
        "status": "success",
        "message": format!("Monitor {} updated", monitor.name),
        "monitor": monitor_value(&monitor, running),
    }))
}

pub(super) async fn delete_monitor(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let monitor_id = str_field(cmd, "monitor_id")
        .ok_or_else(|| CommandError::Validation("Monitor ID required".to_string()))?;

    // Stop it if running; a monitor that was never scheduled is fine too.
    let _ = router.scheduler.stop_monitor(monitor_id).await;

    if !router.store.delete_monitor(monitor_id).await? {
        return Err(CommandError::NotFound(
            "Monitor not found or could not be deleted".to_string(),
        ));
    }

    Ok(json!({ "status": "success", "message": format!("Monitor {} deleted", monitor_id) }))
}
