//! HTTP(S) endpoint probe.
//!
//! Checks, in order: connection, status_code, content (iff configured),
//! ssl (iff configured). The check list reflects configuration, so a
//! connection failure still reports the configured downstream checks without
//! re-attempting them; only the connection failure counts.

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

use super::messages;
use super::ssl;
use crate::models::{Monitor, MonitorResult, MonitorStatus, UrlSpec};

pub async fn check_url(monitor: &Monitor, spec: &UrlSpec) -> MonitorResult {
    let started = Instant::now();
    let mut details = Map::new();
    let mut status = MonitorStatus::Healthy;
    let mut failed_checks = 0u32;

    let mut check_list = vec!["connection".to_string(), "status_code".to_string()];
    if spec.check_content.is_some() {
        check_list.push("content".to_string());
    }
    if spec.check_ssl {
        check_list.push("ssl".to_string());
    }

    match send_request(spec).await {
        Ok(response) => {
            details.insert("connection".to_string(), json!({ "connected": true }));

            let actual = response.status().as_u16();
            if actual != spec.expected_status_code {
                status = MonitorStatus::Unhealthy;
                failed_checks += 1;
                details.insert(
                    "status_code".to_string(),
                    json!({
                        "expected": spec.expected_status_code,
                        "actual": actual,
                        "message": messages::status_code_error(spec.expected_status_code, actual),
                    }),
                );
            } else {
                details.insert(
                    "status_code".to_string(),
                    json!({
                        "expected": spec.expected_status_code,
                        "actual": actual,
                    }),
                );
            }

            if let Some(expected_content) = &spec.check_content {
                let body = response.text().await.unwrap_or_default();
                if body.contains(expected_content.as_str()) {
                    details.insert(
                        "content".to_string(),
                        json!({ "expected": expected_content, "found": true }),
                    );
                } else {
                    status = MonitorStatus::Unhealthy;
                    failed_checks += 1;
                    details.insert(
                        "content".to_string(),
                        json!({
                            "expected": expected_content,
                            "found": false,
                            "message": messages::CONTENT_ERROR,
                        }),
                    );
                }
            }

            if spec.check_ssl {
                match ssl::ssl_expiry(&spec.url).await {
                    Ok(info) => {
                        details.insert(
                            "ssl".to_string(),
                            json!({
                                "expiry_date": info.expiry_date,
                                "days_until_expiry": info.days_until_expiry,
                                "issuer": info.issuer,
                            }),
                        );
                    }
                    Err(e) => {
                        status = MonitorStatus::Unhealthy;
                        failed_checks += 1;
                        details.insert(
                            "ssl".to_string(),
                            json!({
                                "message": messages::SSL_ERROR,
                                "error": e.to_string(),
                            }),
                        );
                    }
                }
            }
        }
        Err(e) => {
            status = MonitorStatus::Unhealthy;
            failed_checks += 1;

            let message = if e.is_timeout() {
                messages::timeout_error(spec.timeout_seconds)
            } else if e.is_connect() {
                messages::CONNECTION_ERROR.to_string()
            } else {
                messages::BASE_ERROR.to_string()
            };
            debug!("URL probe for {} failed: {}", spec.url, e);
            details.insert(
                "connection".to_string(),
                json!({ "connected": false, "message": message }),
            );
        }
    }

    let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    MonitorResult {
        id: Uuid::new_v4().to_string(),
        monitor_id: monitor.id.clone(),
        space_id: monitor.space_id.clone(),
        monitor_type: monitor.monitor_type(),
        timestamp: Utc::now(),
        status,
        response_time_ms,
        failed_checks,
        check_list,
        details: Value::Object(details),
    }
}

async fn send_request(spec: &UrlSpec) -> Result<reqwest::Response, reqwest::Error> {
    let redirect_policy = if spec.follow_redirects {
        reqwest::redirect::Policy::limited(10)
    } else {
        reqwest::redirect::Policy::none()
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(spec.timeout_seconds))
        .redirect(redirect_policy)
        .danger_accept_invalid_certs(!spec.check_ssl)
        .build()?;

    client.get(&spec.url).send().await
}
