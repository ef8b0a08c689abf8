//! On-disk JSON configuration.
//!
//! Sections: `email` (SMTP settings with the password stored encrypted),
//! `health_alerts`, `data_cleanup` and `security` (the AEAD key). Unknown or
//! absent sections fall back to defaults so a hand-edited file keeps loading.

pub mod store;

pub use store::ConfigStore;

use serde::{Deserialize, Serialize};

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Web Monitor".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_health_interval_minutes() -> u64 {
    60
}

fn default_unhealthy_threshold_hours() -> i64 {
    24
}

fn default_cleanup_interval_hours() -> u64 {
    24
}

fn default_keep_healthy_days() -> i64 {
    7
}

fn default_keep_unhealthy_days() -> i64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default)]
    pub encrypted_password: String,
    /// Transient plaintext password; encrypted and removed on save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            username: String::new(),
            from_name: default_from_name(),
            encrypted_password: String::new(),
            password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthAlertsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_health_interval_minutes")]
    pub check_interval_minutes: u64,
    #[serde(default = "default_unhealthy_threshold_hours")]
    pub unhealthy_threshold_hours: i64,
}

impl Default for HealthAlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_minutes: default_health_interval_minutes(),
            unhealthy_threshold_hours: default_unhealthy_threshold_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCleanupConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cleanup_interval_hours")]
    pub cleanup_interval_hours: u64,
    #[serde(default = "default_keep_healthy_days")]
    pub keep_healthy_results_days: i64,
    #[serde(default = "default_keep_unhealthy_days")]
    pub keep_unhealthy_results_days: i64,
}

impl Default for DataCleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cleanup_interval_hours: default_cleanup_interval_hours(),
            keep_healthy_results_days: default_keep_healthy_days(),
            keep_unhealthy_results_days: default_keep_unhealthy_days(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub encryption_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub health_alerts: HealthAlertsConfig,
    #[serde(default)]
    pub data_cleanup: DataCleanupConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configured_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl AppConfig {
    /// Email is usable once both the account and a stored password exist.
    pub fn is_email_configured(&self) -> bool {
        !self.email.username.is_empty() && !self.email.encrypted_password.is_empty()
    }
}
