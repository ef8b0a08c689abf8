//! Notification decision and email dispatch.
//!
//! Per-check notifications are edge-triggered on status transitions; the
//! periodic digest for long-unhealthy monitors lives in the health-alert job
//! and sends through the same service. Sending never raises: failures are
//! logged and reported as `false`.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::ConfigStore;
use crate::crypto::CryptoBox;
use crate::models::{MonitorResult, MonitorStatus, Space};

/// Edge trigger: first result notifies only when unhealthy, afterwards any
/// status change notifies.
pub fn should_notify(result: &MonitorResult, previous: Option<&MonitorResult>) -> bool {
    match previous {
        None => result.status == MonitorStatus::Unhealthy,
        Some(previous) => previous.status != result.status,
    }
}

struct SmtpSettings {
    smtp_host: String,
    smtp_port: u16,
    username: String,
    password: String,
    from_name: String,
}

pub struct EmailService {
    config: Arc<ConfigStore>,
    crypto: Arc<CryptoBox>,
}

impl EmailService {
    pub fn new(config: Arc<ConfigStore>, crypto: Arc<CryptoBox>) -> Self {
        Self { config, crypto }
    }

    pub async fn is_configured(&self) -> bool {
        self.config.current().await.is_email_configured()
    }

    async fn smtp_settings(&self) -> Option<SmtpSettings> {
        let config = self.config.current().await;
        if !config.is_email_configured() {
            return None;
        }

        let password = match self.crypto.decrypt(&config.email.encrypted_password) {
            Ok(password) if !password.is_empty() => password,
            Ok(_) => return None,
            Err(e) => {
                error!("Failed to decrypt email password: {}", e);
                return None;
            }
        };

        Some(SmtpSettings {
            smtp_host: config.email.smtp_host.clone(),
            smtp_port: config.email.smtp_port,
            username: config.email.username.clone(),
            password,
            from_name: config.email.from_name.clone(),
        })
    }

    /// Send an email to the given recipients. Sessions are short-lived: a
    /// fresh STARTTLS transport is built per call and dropped afterwards.
    pub async fn send(&self, recipients: &[String], subject: &str, body: &str, html: bool) -> bool {
        if recipients.is_empty() {
            warn!("Email sending skipped: no recipients");
            return false;
        }

        let settings = match self.smtp_settings().await {
            Some(settings) => settings,
            None => {
                warn!("Email sending failed: missing credentials");
                return false;
            }
        };

        let from: Mailbox = match format!("{} <{}>", settings.from_name, settings.username).parse()
        {
            Ok(mailbox) => mailbox,
            Err(e) => {
                error!("Invalid From address '{}': {}", settings.username, e);
                return false;
            }
        };

        let mut builder = Message::builder().from(from).subject(subject);
        let mut valid_recipients = 0;
        for recipient in recipients {
            match recipient.parse::<Mailbox>() {
                Ok(mailbox) => {
                    builder = builder.to(mailbox);
                    valid_recipients += 1;
                }
                Err(e) => warn!("Skipping invalid recipient '{}': {}", recipient, e),
            }
        }
        if valid_recipients == 0 {
            error!("Email sending failed: no valid recipients");
            return false;
        }

        let content_type = if html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };
        let message = match builder.header(content_type).body(body.to_string()) {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to build email message: {}", e);
                return false;
            }
        };

        let transport = match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(
            &settings.smtp_host,
        ) {
            Ok(builder) => builder
                .port(settings.smtp_port)
                .credentials(Credentials::new(settings.username, settings.password))
                .authentication(vec![Mechanism::Login])
                .build(),
            Err(e) => {
                error!("Failed to build SMTP transport: {}", e);
                return false;
            }
        };

        match transport.send(message).await {
            Ok(_) => {
                info!("Email sent successfully to {} recipients", valid_recipients);
                true
            }
            Err(e) => {
                error!("Failed to send email: {}", e);
                false
            }
        }
    }

    /// Per-check notification for a status transition.
    pub async fn send_monitor_result_email(&self, space: &Space, result: &MonitorResult) -> bool {
        let subject = format!(
            "Update on Space {}: {} is {}",
            space.name,
            result.monitor_type.as_str(),
            result.status.as_str()
        );
        let body = format!(
            r#"<h2>Monitor Update for {}</h2>
<p><strong>Monitor ID:</strong> {}</p>
<p><strong>Status:</strong> {}</p>
<p><strong>Type:</strong> {}</p>
<p><strong>Time:</strong> {}</p>
<p><strong>Response Time:</strong> {:.2} ms</p>
<p><strong>Results:</strong> {}/{} checks failed</p>

<h3>Details:</h3>
<pre>{}</pre>
"#,
            space.name,
            result.monitor_id,
            result.status.as_str(),
            result.monitor_type.as_str(),
            result.timestamp.format("%Y-%m-%d %H:%M:%S"),
            result.response_time_ms,
            result.failed_checks,
            result.check_list.len(),
            format_details(&result.details),
        );

        self.send(&space.notification_emails, &subject, &body, true)
            .await
    }
}

/// Flatten the per-check detail records into readable lines.
fn format_details(details: &Value) -> String {
    let object = match details.as_object() {
        Some(object) if !object.is_empty() => object,
        _ => return "No details available".to_string(),
    };

    let mut lines = Vec::new();
    for (check_name, check_data) in object {
        lines.push(format!("Check: {}", check_name));
        if let Some(fields) = check_data.as_object() {
            for (key, value) in fields {
                let readable_key = readable_key(key);
                let rendered = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                lines.push(format!("  {}: {}", readable_key, rendered));
            }
        }
    }
    lines.join("\n")
}

fn readable_key(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MonitorType;
    use chrono::Utc;
    use serde_json::json;

    fn result_with_status(status: MonitorStatus) -> MonitorResult {
        MonitorResult {
            id: "r-1".to_string(),
            monitor_id: "m-1".to_string(),
            space_id: "s-1".to_string(),
            monitor_type: MonitorType::Url,
            timestamp: Utc::now(),
            status,
            response_time_ms: 12.5,
            failed_checks: 0,
            check_list: vec!["connection".to_string(), "status_code".to_string()],
            details: json!({}),
        }
    }

    #[test]
    fn first_result_notifies_only_when_unhealthy() {
        let healthy = result_with_status(MonitorStatus::Healthy);
        let unhealthy = result_with_status(MonitorStatus::Unhealthy);
        assert!(!should_notify(&healthy, None));
        assert!(should_notify(&unhealthy, None));
    }

    #[test]
    fn notifies_on_any_transition() {
        let healthy = result_with_status(MonitorStatus::Healthy);
        let unhealthy = result_with_status(MonitorStatus::Unhealthy);
        let unknown = result_with_status(MonitorStatus::Unknown);

        assert!(should_notify(&unhealthy, Some(&healthy)));
        assert!(should_notify(&healthy, Some(&unhealthy)));
        assert!(should_notify(&healthy, Some(&unknown)));
        assert!(!should_notify(&healthy, Some(&healthy)));
        assert!(!should_notify(&unhealthy, Some(&unhealthy)));
    }

    #[test]
    fn details_render_as_readable_lines() {
        let details = json!({
            "connection": { "connected": false, "message": "Failed to establish connection" }
        });
        let rendered = format_details(&details);
        assert!(rendered.contains("Check: connection"));
        assert!(rendered.contains("  Connected: false"));
        assert!(rendered.contains("  Message: Failed to establish connection"));
    }

    #[test]
    fn empty_details_render_placeholder() {
        assert_eq!(format_details(&json!({})), "No details available");
        assert_eq!(format_details(&Value::Null), "No details available");
    }
}
