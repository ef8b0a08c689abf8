//! Result query commands.

use serde_json::{json, Value};

use super::{str_field, CommandRouter};
use crate::errors::CommandError;

const DEFAULT_LIMIT: i64 = 10;

fn limit_of(cmd: &Value) -> i64 {
    cmd.get("limit")
        .and_then(|v| v.as_i64())
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_LIMIT)
}

pub(super) async fn get_monitor_results(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let monitor_id = str_field(cmd, "monitor_id");
    let monitor_name = str_field(cmd, "monitor_name");
    let space_id = str_field(cmd, "space_id");
    let space_name = str_field(cmd, "space_name");

    let monitor_id = match (monitor_id, monitor_name) {
        (Some(id), _) => id.to_string(),
        (None, Some(name)) => router
            .store
            .get_monitor_by_name(name, space_id, space_name)
            .await?
            .map(|monitor| monitor.id)
            .ok_or_else(|| {
                let space_msg = space_id
                    .map(|s| format!(" in space \"{}\"", s))
                    .unwrap_or_default();
                CommandError::NotFound(format!(
                    "Monitor with name \"{}\"{} not found",
                    name, space_msg
                ))
            })?,
        (None, None) => {
            return Err(CommandError::Validation(
                "Monitor ID or name required".to_string(),
            ))
        }
    };

    let results = router
        .store
        .get_results_for_monitor(&monitor_id, limit_of(cmd))
        .await?;
    let values: Vec<Value> = results
        .iter()
        .map(|result| serde_json::to_value(result).unwrap_or(Value::Null))
        .collect();

    Ok(json!({ "status": "success", "results": values }))
}

pub(super) async fn get_space_results(
    router: &CommandRouter,
    cmd: &Value,
) -> Result<Value, CommandError> {
    let space_id = str_field(cmd, "space_id");
    let space_name = str_field(cmd, "space_name");

    let space_id = match (space_id, space_name) {
        (Some(id), _) => id.to_string(),
        (None, Some(name)) => router
            .store
            .get_space_by_name(name)
            .await?
            .map(|space| space.id)
            .ok_or_else(|| {
                CommandError::NotFound(format!("Space with name \"{}\" not found", name))
            })?,
        (None, None) => {
            return Err(CommandError::Validation(
                "Space ID or name required".to_string(),
            ))
        }
    };

    let results = router
        .store
        .get_results_for_space(&space_id, limit_of(cmd))
        .await?;
    let values: Vec<Value> = results
        .iter()
        .map(|result| serde_json::to_value(result).unwrap_or(Value::Null))
        .collect();

    Ok(json!({ "status": "success", "results": values }))
}
