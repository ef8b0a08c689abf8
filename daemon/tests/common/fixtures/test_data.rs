use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use webmond::{Monitor, MonitorResult, MonitorStatus, MonitorType, Space};

pub fn sample_space(name: &str, emails: &[&str]) -> Space {
    Space::new(
        name,
        None,
        emails.iter().map(|e| e.to_string()).collect(),
    )
}

pub fn url_monitor(space_id: &str, name: &str, url: &str) -> Monitor {
    serde_json::from_value(json!({
        "name": name,
        "space_id": space_id,
        "monitor_type": "url",
        "url": url,
        "expected_status_code": 200,
        "timeout_seconds": 1,
        "check_ssl": false,
        "follow_redirects": true,
        "check_interval_seconds": 1
    }))
    .expect("Failed to build url monitor")
}

pub fn database_monitor(space_id: &str, name: &str, db_type: &str) -> Monitor {
    serde_json::from_value(json!({
        "name": name,
        "space_id": space_id,
        "monitor_type": "database",
        "db_type": db_type,
        "host": "127.0.0.1",
        "port": 5432,
        "database": "app",
        "username": "probe",
        "connection_timeout_seconds": 1,
        "check_interval_seconds": 1
    }))
    .expect("Failed to build database monitor")
}

/// A result whose timestamp lies `age_days` in the past.
pub fn aged_result(
    monitor: &Monitor,
    status: MonitorStatus,
    age_days: i64,
) -> MonitorResult {
    result_at(monitor, status, Utc::now() - Duration::days(age_days))
}

pub fn result_at(
    monitor: &Monitor,
    status: MonitorStatus,
    timestamp: DateTime<Utc>,
) -> MonitorResult {
    MonitorResult {
        id: Uuid::new_v4().to_string(),
        monitor_id: monitor.id.clone(),
        space_id: monitor.space_id.clone(),
        monitor_type: MonitorType::Url,
        timestamp,
        status,
        response_time_ms: 5.0,
        failed_checks: u32::from(status != MonitorStatus::Healthy),
        check_list: vec!["connection".to_string(), "status_code".to_string()],
        details: json!({ "connection": { "connected": status == MonitorStatus::Healthy } }),
    }
}

/// A free localhost port with nothing listening on it.
pub fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("No local addr").port();
    drop(listener);
    port
}
