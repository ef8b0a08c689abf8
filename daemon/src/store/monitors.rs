//! Monitor persistence and the unhealthy-monitor scan.

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, error, info};

use super::Store;
use crate::models::{DatabaseSpec, Monitor, MonitorSpec, MonitorStatus, UrlSpec};

fn row_to_monitor(row: &SqliteRow) -> Result<Monitor> {
    let monitor_type: String = row.try_get("monitor_type")?;
    let status: String = row.try_get("status")?;

    let spec = match monitor_type.as_str() {
        "url" => MonitorSpec::Url(UrlSpec {
            url: row.try_get::<Option<String>, _>("url")?.unwrap_or_default(),
            expected_status_code: row
                .try_get::<Option<i64>, _>("expected_status_code")?
                .unwrap_or(200) as u16,
            timeout_seconds: row
                .try_get::<Option<i64>, _>("timeout_seconds")?
                .unwrap_or(30) as u64,
            check_ssl: row.try_get::<Option<bool>, _>("check_ssl")?.unwrap_or(true),
            follow_redirects: row
                .try_get::<Option<bool>, _>("follow_redirects")?
                .unwrap_or(true),
            check_content: row.try_get("check_content")?,
        }),
        "database" => MonitorSpec::Database(DatabaseSpec {
            db_type: row
                .try_get::<Option<String>, _>("db_type")?
                .unwrap_or_default(),
            host: row.try_get::<Option<String>, _>("host")?.unwrap_or_default(),
            port: row.try_get::<Option<i64>, _>("port")?.unwrap_or(0) as u16,
            database: row
                .try_get::<Option<String>, _>("database_name")?
                .unwrap_or_default(),
            username: row
                .try_get::<Option<String>, _>("username")?
                .unwrap_or_default(),
            encrypted_password: row
                .try_get::<Option<String>, _>("encrypted_password")?
                .unwrap_or_default(),
            connection_timeout_seconds: row
                .try_get::<Option<i64>, _>("connection_timeout_seconds")?
                .unwrap_or(10) as u64,
            query_timeout_seconds: row
                .try_get::<Option<i64>, _>("query_timeout_seconds")?
                .unwrap_or(30) as u64,
            test_query: row
                .try_get::<Option<String>, _>("test_query")?
                .unwrap_or_else(|| "SELECT 1".to_string()),
        }),
        other => return Err(anyhow!("Unknown monitor type in store: {}", other)),
    };

    Ok(Monitor {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        space_id: row.try_get("space_id")?,
        status: MonitorStatus::parse(&status)
            .ok_or_else(|| anyhow!("Unknown monitor status in store: {}", status))?,
        check_interval_seconds: row.try_get::<i64, _>("check_interval_seconds")? as u32,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_checked_at: row.try_get("last_checked_at")?,
        last_healthy_at: row.try_get("last_healthy_at")?,
        spec,
    })
}

impl Store {
    /// Upsert by id. `created_at` is preserved on update.
    pub async fn save_monitor(&self, monitor: &Monitor) -> Result<()> {
        debug!("Saving monitor: {} ({})", monitor.name, monitor.id);

        let (url, expected_status_code, timeout_seconds, check_ssl, follow_redirects, check_content) =
            match &monitor.spec {
                MonitorSpec::Url(spec) => (
                    Some(spec.url.as_str()),
                    Some(spec.expected_status_code as i64),
                    Some(spec.timeout_seconds as i64),
                    Some(spec.check_ssl),
                    Some(spec.follow_redirects),
                    spec.check_content.as_deref(),
                ),
                MonitorSpec::Database(_) => (None, None, None, None, None, None),
            };

        let (
            db_type,
            host,
            port,
            database_name,
            username,
            encrypted_password,
            connection_timeout_seconds,
            query_timeout_seconds,
            test_query,
        ) = match &monitor.spec {
            MonitorSpec::Database(spec) => (
                Some(spec.db_type.as_str()),
                Some(spec.host.as_str()),
                Some(spec.port as i64),
                Some(spec.database.as_str()),
                Some(spec.username.as_str()),
                Some(spec.encrypted_password.as_str()),
                Some(spec.connection_timeout_seconds as i64),
                Some(spec.query_timeout_seconds as i64),
                Some(spec.test_query.as_str()),
            ),
            MonitorSpec::Url(_) => (None, None, None, None, None, None, None, None, None),
        };

        match sqlx::query(
            r#"
            INSERT INTO monitors (
                id, space_id, name, monitor_type, status, check_interval_seconds,
                created_at, updated_at, last_checked_at, last_healthy_at,
                url, expected_status_code, timeout_seconds, check_ssl, follow_redirects, check_content,
                db_type, host, port, database_name, username, encrypted_password,
                connection_timeout_seconds, query_timeout_seconds, test_query
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                space_id = excluded.space_id,
                name = excluded.name,
                monitor_type = excluded.monitor_type,
                status = excluded.status,
                check_interval_seconds = excluded.check_interval_seconds,
                updated_at = excluded.updated_at,
                last_checked_at = excluded.last_checked_at,
                last_healthy_at = excluded.last_healthy_at,
                url = excluded.url,
                expected_status_code = excluded.expected_status_code,
                timeout_seconds = excluded.timeout_seconds,
                check_ssl = excluded.check_ssl,
                follow_redirects = excluded.follow_redirects,
                check_content = excluded.check_content,
                db_type = excluded.db_type,
                host = excluded.host,
                port = excluded.port,
                database_name = excluded.database_name,
                username = excluded.username,
                encrypted_password = excluded.encrypted_password,
                connection_timeout_seconds = excluded.connection_timeout_seconds,
                query_timeout_seconds = excluded.query_timeout_seconds,
                test_query = excluded.test_query
            "#,
        )
        .bind(&monitor.id)
        .bind(&monitor.space_id)
        .bind(&monitor.name)
        .bind(monitor.monitor_type().as_str())
        .bind(monitor.status.as_str())
        .bind(monitor.check_interval_seconds as i64)
        .bind(monitor.created_at)
        .bind(monitor.updated_at)
        .bind(monitor.last_checked_at)
        .bind(monitor.last_healthy_at)
        .bind(url)
        .bind(expected_status_code)
        .bind(timeout_seconds)
        .bind(check_ssl)
        .bind(follow_redirects)
        .bind(check_content)
        .bind(db_type)
        .bind(host)
        .bind(port)
        .bind(database_name)
        .bind(username)
        .bind(encrypted_password)
        .bind(connection_timeout_seconds)
        .bind(query_timeout_seconds)
        .bind(test_query)
        .execute(&self.pool)
        .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Failed to save monitor {}: {}", monitor.id, e);
                Err(e.into())
            }
        }
    }

    pub async fn get_monitor(&self, monitor_id: &str) -> Result<Option<Monitor>> {
        let row = sqlx::query("SELECT * FROM monitors WHERE id = ?")
            .bind(monitor_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_monitor).transpose()
    }

    /// Look a monitor up by name, optionally scoped to a space by id or name.
    pub async fn get_monitor_by_name(
        &self,
        name: &str,
        space_id: Option<&str>,
        space_name: Option<&str>,
    ) -> Result<Option<Monitor>> {
        let mut sql = String::from("SELECT m.* FROM monitors m");
        if space_name.is_some() {
            sql.push_str(" JOIN spaces s ON s.id = m.space_id");
        }
        sql.push_str(" WHERE m.name = ?");
        if space_id.is_some() {
            sql.push_str(" AND m.space_id = ?");
        }
        if space_name.is_some() {
            sql.push_str(" AND s.name = ?");
        }
        sql.push_str(" LIMIT 1");

        let mut query = sqlx::query(&sql).bind(name);
        if let Some(id) = space_id {
            query = query.bind(id);
        }
        if let Some(sname) = space_name {
            query = query.bind(sname);
        }

        let row = query.fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_monitor).transpose()
    }

    pub async fn list_monitors(&self) -> Result<Vec<Monitor>> {
        let rows = sqlx::query("SELECT * FROM monitors ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_monitor).collect()
    }

    pub async fn get_monitors_for_space(&self, space_id: &str) -> Result<Vec<Monitor>> {
        let rows = sqlx::query("SELECT * FROM monitors WHERE space_id = ? ORDER BY name")
            .bind(space_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_monitor).collect()
    }

    /// Delete a monitor and its results. Returns false when it does not exist.
    pub async fn delete_monitor(&self, monitor_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM monitor_results WHERE monitor_id = ?")
            .bind(monitor_id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM monitors WHERE id = ?")
            .bind(monitor_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if deleted > 0 {
            info!("Deleted monitor {} with its results", monitor_id);
        }
        Ok(deleted > 0)
    }

    /// Monitors that have been checked, are not OFFLINE, and have either
    /// never been healthy or were last healthy before the threshold.
    pub async fn get_unhealthy_monitors(&self, threshold_hours: i64) -> Result<Vec<Monitor>> {
        let threshold_time = Utc::now() - Duration::hours(threshold_hours);

        let rows = sqlx::query(
            r#"
            SELECT * FROM monitors
            WHERE last_checked_at IS NOT NULL
              AND status != 'offline'
              AND (last_healthy_at IS NULL OR last_healthy_at < ?)
            "#,
        )
        .bind(threshold_time)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_monitor).collect()
    }
}
