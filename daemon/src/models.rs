//! Domain entities: spaces, monitors and probe results.
//!
//! A monitor is a shared header plus a tagged spec (`monitor_type` is the
//! tag), so monitors serialize as flat JSON objects on the control protocol
//! and in stored rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_check_interval() -> u32 {
    300
}

fn default_expected_status() -> u16 {
    200
}

fn default_url_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_query_timeout() -> u64 {
    30
}

fn default_test_query() -> String {
    "SELECT 1".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Healthy,
    Unhealthy,
    Unknown,
    Offline,
}

impl MonitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorStatus::Healthy => "healthy",
            MonitorStatus::Unhealthy => "unhealthy",
            MonitorStatus::Unknown => "unknown",
            MonitorStatus::Offline => "offline",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "healthy" => Some(MonitorStatus::Healthy),
            "unhealthy" => Some(MonitorStatus::Unhealthy),
            "unknown" => Some(MonitorStatus::Unknown),
            "offline" => Some(MonitorStatus::Offline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorType {
    Url,
    Database,
}

impl MonitorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorType::Url => "url",
            MonitorType::Database => "database",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "url" => Some(MonitorType::Url),
            "database" => Some(MonitorType::Database),
            _ => None,
        }
    }
}

/// A logical grouping of monitors sharing a notification list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Space {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notification_emails: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Space {
    pub fn new(name: &str, description: Option<String>, notification_emails: Vec<String>) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            description,
            notification_emails,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// URL monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlSpec {
    pub url: String,
    #[serde(default = "default_expected_status")]
    pub expected_status_code: u16,
    #[serde(default = "default_url_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub check_ssl: bool,
    #[serde(default = "default_true")]
    pub follow_redirects: bool,
    #[serde(default)]
    pub check_content: Option<String>,
}

/// Database monitor settings. The password only ever exists here as
/// ciphertext; plaintext arrives on the control protocol and is encrypted
/// before the monitor is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSpec {
    pub db_type: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub encrypted_password: String,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
    #[serde(default = "default_query_timeout")]
    pub query_timeout_seconds: u64,
    #[serde(default = "default_test_query")]
    pub test_query: String,
}

/// Type-specific half of a monitor. Internally tagged so the flattened
/// monitor object carries a plain `monitor_type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "monitor_type", rename_all = "lowercase")]
pub enum MonitorSpec {
    Url(UrlSpec),
    Database(DatabaseSpec),
}

fn default_status() -> MonitorStatus {
    MonitorStatus::Offline
}

/// A periodic probe configuration targeting one endpoint or database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    pub space_id: String,
    #[serde(default = "default_status")]
    pub status: MonitorStatus,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_healthy_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub spec: MonitorSpec,
}

impl Monitor {
    pub fn monitor_type(&self) -> MonitorType {
        match self.spec {
            MonitorSpec::Url(_) => MonitorType::Url,
            MonitorSpec::Database(_) => MonitorType::Database,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    pub fn mark_checked(&mut self) {
        self.last_checked_at = Some(Utc::now());
        self.touch();
    }

    /// Healthy is observed at check time, so the healthy timestamp never
    /// runs ahead of the checked one.
    pub fn mark_healthy(&mut self) {
        self.last_healthy_at = self.last_checked_at.or_else(|| Some(Utc::now()));
        self.touch();
    }
}

/// Outcome of one probe execution. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorResult {
    #[serde(default = "new_id")]
    pub id: String,
    pub monitor_id: String,
    pub space_id: String,
    pub monitor_type: MonitorType,
    pub timestamp: DateTime<Utc>,
    pub status: MonitorStatus,
    #[serde(default)]
    pub response_time_ms: f64,
    #[serde(default)]
    pub failed_checks: u32,
    #[serde(default)]
    pub check_list: Vec<String>,
    /// Per-check records keyed by check name.
    #[serde(default)]
    pub details: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_monitor_serializes_flat() {
        let monitor = Monitor {
            id: "m-1".to_string(),
            name: "web".to_string(),
            space_id: "s-1".to_string(),
            status: MonitorStatus::Offline,
            check_interval_seconds: 60,
            created_at: Utc::now(),
            updated_at: None,
            last_checked_at: None,
            last_healthy_at: None,
            spec: MonitorSpec::Url(UrlSpec {
                url: "http://example.com/".to_string(),
                expected_status_code: 200,
                timeout_seconds: 30,
                check_ssl: false,
                follow_redirects: true,
                check_content: None,
            }),
        };

        let value = serde_json::to_value(&monitor).unwrap();
        assert_eq!(value["monitor_type"], "url");
        assert_eq!(value["url"], "http://example.com/");
        assert_eq!(value["status"], "offline");
        assert_eq!(value["check_interval_seconds"], 60);
    }

    #[test]
    fn monitor_deserializes_with_defaults() {
        let payload = json!({
            "name": "db",
            "space_id": "s-1",
            "monitor_type": "database",
            "db_type": "postgresql",
            "host": "localhost",
            "port": 5432,
            "database": "app",
            "username": "probe"
        });

        let monitor: Monitor = serde_json::from_value(payload).unwrap();
        assert_eq!(monitor.status, MonitorStatus::Offline);
        assert_eq!(monitor.check_interval_seconds, 300);
        assert!(!monitor.id.is_empty());
        match monitor.spec {
            MonitorSpec::Database(spec) => {
                assert_eq!(spec.test_query, "SELECT 1");
                assert_eq!(spec.connection_timeout_seconds, 10);
                assert_eq!(spec.query_timeout_seconds, 30);
                assert!(spec.encrypted_password.is_empty());
            }
            MonitorSpec::Url(_) => panic!("expected database spec"),
        }
    }

    #[test]
    fn url_monitor_defaults() {
        let payload = json!({
            "name": "web",
            "space_id": "s-1",
            "monitor_type": "url",
            "url": "https://example.com/"
        });

        let monitor: Monitor = serde_json::from_value(payload).unwrap();
        match monitor.spec {
            MonitorSpec::Url(spec) => {
                assert_eq!(spec.expected_status_code, 200);
                assert_eq!(spec.timeout_seconds, 30);
                assert!(spec.check_ssl);
                assert!(spec.follow_redirects);
                assert!(spec.check_content.is_none());
            }
            MonitorSpec::Database(_) => panic!("expected url spec"),
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            MonitorStatus::Healthy,
            MonitorStatus::Unhealthy,
            MonitorStatus::Unknown,
            MonitorStatus::Offline,
        ] {
            assert_eq!(MonitorStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MonitorStatus::parse("bogus"), None);
    }

    #[test]
    fn mark_healthy_updates_timestamps() {
        let mut monitor: Monitor = serde_json::from_value(json!({
            "name": "web",
            "space_id": "s-1",
            "monitor_type": "url",
            "url": "http://example.com/"
        }))
        .unwrap();

        monitor.mark_checked();
        monitor.mark_healthy();

        let checked = monitor.last_checked_at.unwrap();
        let healthy = monitor.last_healthy_at.unwrap();
        assert!(checked >= monitor.created_at);
        assert_eq!(healthy, checked);
        assert!(monitor.updated_at.is_some());
    }
}
