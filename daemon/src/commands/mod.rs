//! Control command routing.
//!
//! One JSON request in, one JSON envelope out. Handlers are grouped by
//! domain (monitors, spaces, results, system); anything they raise is
//! collapsed into `{status: error, message}` here.

mod monitors;
mod results;
mod spaces;
mod system;

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::config::ConfigStore;
use crate::crypto::CryptoBox;
use crate::errors::CommandError;
use crate::scheduler::MonitorScheduler;
use crate::store::Store;

pub struct CommandRouter {
    pub(crate) store: Arc<Store>,
    pub(crate) scheduler: Arc<MonitorScheduler>,
    pub(crate) config: Arc<ConfigStore>,
    pub(crate) crypto: Arc<CryptoBox>,
}

impl CommandRouter {
    pub fn new(
        store: Arc<Store>,
        scheduler: Arc<MonitorScheduler>,
        config: Arc<ConfigStore>,
        crypto: Arc<CryptoBox>,
    ) -> Self {
        Self {
            store,
            scheduler,
            config,
            crypto,
        }
    }

    pub async fn dispatch(&self, request: Value) -> Value {
        let action = request
            .get("action")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let outcome = match action.as_str() {
            // Monitor commands
            "start_monitor" => monitors::start_monitor(self, &request).await,
            "stop_monitor" => monitors::stop_monitor(self, &request).await,
            "list_monitors" => monitors::list_monitors(self, &request).await,
            "get_monitor" => monitors::get_monitor(self, &request).await,
            "create_monitor" => monitors::create_monitor(self, &request).await,
            "update_monitor" => monitors::update_monitor(self, &request).await,
            "delete_monitor" => monitors::delete_monitor(self, &request).await,

            // Space commands
            "start_space" => spaces::start_space(self, &request).await,
            "stop_space" => spaces::stop_space(self, &request).await,
            "list_spaces" => spaces::list_spaces(self, &request).await,
            "get_space" => spaces::get_space(self, &request).await,
            "create_space" => spaces::create_space(self, &request).await,
            "update_space" => spaces::update_space(self, &request).await,
            "delete_space" => spaces::delete_space(self, &request).await,

            // Result commands
            "get_monitor_results" => results::get_monitor_results(self, &request).await,
            "get_space_results" => results::get_space_results(self, &request).await,

            // System commands
            "status" => system::get_status(self, &request).await,
            "get_job_status" => system::get_job_status(self, &request).await,
            "run_job_manually" => system::run_job_manually(self, &request).await,
            "get_cleanup_preview" => system::get_cleanup_preview(self, &request).await,
            "reload_email_config" => system::reload_email_config(self, &request).await,

            _ => Err(CommandError::Validation("Unknown action".to_string())),
        };

        match outcome {
            Ok(response) => response,
            Err(e) => {
                error!("Command '{}' failed: {}", action, e);
                json!({ "status": "error", "message": e.to_string() })
            }
        }
    }
}

/// Non-empty string field of the request payload.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}
