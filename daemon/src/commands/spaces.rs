//! Space commands.

use serde_json::{json, Value};

use super::{str_field, CommandRouter};
use crate::errors::CommandError;
use crate::models::Space;

async fn resolve_space_id(router: &CommandRouter, cmd: &Value) -> Result<String, CommandError> {
    let space_id = str_field(cmd, "space_id");
    let space_name = str_field(cmd, "space_name");

    match (space_id, space_name) {
        (Some(id), _) => Ok(id.to_string()),
        (None, Some(name)) => router
            .store
            .get_space_by_name(name)
            .await?
            .map(|space| space.id)
            .ok_or_else(|| {
                CommandError::NotFound(format!("Space with name \"{}\" not found", name))
            }),
        (None, None) => Err(CommandError::Validation(
            "Space ID or name required".to_string(),
        )),
    }
}

pub(super) async fn start_space(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let space_id = resolve_space_id(router, cmd).await?;
    router.scheduler.start_all_monitors_in_space(&space_id).await?;
    Ok(json!({
        "status": "success",
        "message": format!("All monitors in space {} started", space_id),
    }))
}

pub(super) async fn stop_space(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let space_id = resolve_space_id(router, cmd).await?;
    router.scheduler.stop_all_monitors_in_space(&space_id).await;
    Ok(json!({
        "status": "success",
        "message": format!("All monitors in space {} stopped", space_id),
    }))
}

pub(super) async fn list_spaces(
    router: &CommandRouter,
    _cmd: &Value,
) -> Result<Value, CommandError> {
    let spaces = router.store.list_spaces().await?;
    let values: Vec<Value> = spaces
        .iter()
        .map(|space| serde_json::to_value(space).unwrap_or(Value::Null))
        .collect();

    Ok(json!({ "status": "success", "spaces": values }))
}

pub(super) async fn get_space(router: &CommandRouter, cmd: &Value) -> Result<Value, CommandError> {
    let space_id = str_field(cmd, "space_id")
        .ok_or_else(|| CommandError::Validation("Space ID required".to_string()))?;

    let space = router
        .store
        .get_space(space_id)
        .await?
        .ok_or_else(|| CommandError::NotFound("Space not found".to_string()))?;

    Ok(json!({ "status": "success", "space": serde_json::to_value(&space).unwrap_or(Value::Null) }))
}

pub(super) async fn create_space(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let space_data = cmd
        .get("space")
        .and_then(|v| v.as_object())
        .ok_or_else(|| CommandError::Validation("Space name required".to_string()))?;

    let name = space_data
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CommandError::Validation("Space name required".to_string()))?;

    if router.store.get_space_by_name(name).await?.is_some() {
        return Err(CommandError::Conflict(
            "Space name already exists".to_string(),
        ));
    }

    let description = space_data
        .get("description")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let notification_emails: Vec<String> = space_data
        .get("notification_emails")
        .and_then(|v| v.as_array())
        .map(|emails| {
            emails
                .iter()
                .filter_map(|e| e.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let mut space = Space::new(name, description, notification_emails);
    if let Some(id) = space_data.get("id").and_then(|v| v.as_str()) {
        space.id = id.to_string();
    }

    router.store.save_space(&space).await?;

    Ok(json!({
        "status": "success",
        "message": format!("Space {} created", space.name),
        "space": serde_json::to_value(&space).unwrap_or(Value::Null),
    }))
}

pub(super) async fn update_space(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let space_data = cmd
        .get("space")
        .and_then(|v| v.as_object())
        .ok_or_else(|| CommandError::Validation("Space ID required".to_string()))?;

    let space_id = space_data
        .get("id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CommandError::Validation("Space ID required".to_string()))?;

    let mut space = router
        .store
        .get_space(space_id)
        .await?
        .ok_or_else(|| CommandError::NotFound("Space not found".to_string()))?;

    if let Some(new_name) = space_data.get("name").and_then(|v| v.as_str()) {
        if new_name != space.name {
            let existing = router.store.get_space_by_name(new_name).await?;
            if existing.map_or(false, |s| s.id != space.id) {
                return Err(CommandError::Conflict(
                    "Space name already exists".to_string(),
                ));
            }
        }
        space.name = new_name.to_string();
    }
    if let Some(description) = space_data.get("description") {
        space.description = description.as_str().map(|s| s.to_string());
    }
    if let Some(emails) = space_data
        .get("notification_emails")
        .and_then(|v| v.as_array())
    {
        space.notification_emails = emails
            .iter()
            .filter_map(|e| e.as_str().map(|s| s.to_string()))
            .collect();
    }

    space.touch();
    router.store.save_space(&space).await?;

    Ok(json!({
        "status": "success",
        "message": format!("Space {} updated", space.name),
        "space": serde_json::to_value(&space).unwrap_or(Value::Null),
    }))
}

pub(super) async fn delete_space(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let space_id = str_field(cmd, "space_id")
        .ok_or_else(|| CommandError::Validation("Space ID required".to_string()))?;

    // Unregister running monitors first; the store cascade removes the
    // space, its monitors and their results in one transaction.
    router.scheduler.stop_all_monitors_in_space(space_id).await;

    if !router.store.delete_space(space_id).await? {
        return Err(CommandError::NotFound(
            "Space not found or could not be deleted".to_string(),
        ));
    }

    Ok(json!({ "status": "success", "message": format!("Space {} deleted", space_id) }))
}
