//! Level-triggered health alerts.
//!
//! Scans the store for monitors that have been unhealthy past the configured
//! threshold and sends one digest email per space that carries a notification
//! list. No already-notified state is recorded; operators tune the threshold
//! and interval instead.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::JobTracker;
use crate::config::ConfigStore;
use crate::models::{Monitor, Space};
use crate::notifier::EmailService;
use crate::store::Store;

pub struct HealthAlertJob {
    store: Arc<Store>,
    config: Arc<ConfigStore>,
    email: Arc<EmailService>,
    tracker: JobTracker,
}

impl HealthAlertJob {
    pub fn new(store: Arc<Store>, config: Arc<ConfigStore>, email: Arc<EmailService>) -> Self {
        Self {
            store,
            config,
            email,
            tracker: JobTracker::new("health_alert"),
        }
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub async fn run(&self) -> bool {
        self.tracker.run(self.execute()).await
    }

    async fn execute(&self) -> bool {
        let config = self.config.current().await;

        if !config.health_alerts.enabled {
            info!("Health alerts are disabled");
            return true;
        }

        if !self.email.is_configured().await {
            warn!("Email not configured, skipping health alerts");
            return true;
        }

        let threshold_hours = config.health_alerts.unhealthy_threshold_hours;
        let unhealthy_monitors = match self.store.get_unhealthy_monitors(threshold_hours).await {
            Ok(monitors) => monitors,
            Err(e) => {
                error!("Failed to query unhealthy monitors: {}", e);
                return false;
            }
        };

        if unhealthy_monitors.is_empty() {
            info!("No monitors found that have been unhealthy for extended periods");
            return true;
        }

        let mut by_space: BTreeMap<String, Vec<Monitor>> = BTreeMap::new();
        for monitor in unhealthy_monitors {
            by_space
                .entry(monitor.space_id.clone())
                .or_default()
                .push(monitor);
        }

        let mut alerts_sent = 0usize;
        let mut monitor_count = 0usize;
        for (space_id, monitors) in &by_space {
            monitor_count += monitors.len();

            let space = match self.store.get_space(space_id).await {
                Ok(Some(space)) => space,
                Ok(None) => continue,
                Err(e) => {
                    error!("Failed to load space {}: {}", space_id, e);
                    continue;
                }
            };

            if space.notification_emails.is_empty() {
                continue;
            }

            if self.send_alert(&space, monitors, threshold_hours).await {
                alerts_sent += 1;
            } else {
                error!("Failed to send health alert for space: {}", space.name);
            }
        }

        info!(
            "Health alert job completed. Sent {} alerts for {} unhealthy monitors",
            alerts_sent, monitor_count
        );
        true
    }

    async fn send_alert(&self, space: &Space, monitors: &[Monitor], threshold_hours: i64) -> bool {
        let subject = format!(
            "Health Alert: {} monitor(s) unhealthy in {}",
            monitors.len(),
            space.name
        );
        let body = digest_body(space, monitors, threshold_hours);

        let sent = self
            .email
            .send(&space.notification_emails, &subject, &body, true)
            .await;
        if sent {
            info!(
                "Health alert sent for space '{}' with {} unhealthy monitors",
                space.name,
                monitors.len()
            );
        }
        sent
    }
}

fn digest_body(space: &Space, monitors: &[Monitor], threshold_hours: i64) -> String {
    let now = Utc::now();

    let mut body = format!(
        r#"<html>
<body>
<h2>Health Alert for Space: {}</h2>
<p>The following monitors have been unhealthy for more than {} hours:</p>
"#,
        space.name, threshold_hours
    );

    for monitor in monitors {
        let last_healthy_text = match monitor.last_healthy_at {
            Some(last_healthy) => {
                let unhealthy_hours = (now - last_healthy).num_hours();
                format!(
                    "{} hours ago ({})",
                    unhealthy_hours,
                    last_healthy.format("%Y-%m-%d %H:%M:%S")
                )
            }
            None => "Never been healthy".to_string(),
        };

        let last_checked_text = match monitor.last_checked_at {
            Some(last_checked) => last_checked.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "Never checked".to_string(),
        };

        body.push_str(&format!(
            r#"<div>
<strong>{}</strong><br>
Type: {}<br>
Status: {}<br>
Last Healthy: {}<br>
Last Checked: {}
</div>
"#,
            monitor.name,
            monitor.monitor_type().as_str(),
            monitor.status.as_str(),
            last_healthy_text,
            last_checked_text,
        ));
    }

    body.push_str(&format!(
        r#"<p>This alert was generated at {}.</p>
</body>
</html>
"#,
        now.format("%Y-%m-%d %H:%M:%S")
    ));

    body
}
