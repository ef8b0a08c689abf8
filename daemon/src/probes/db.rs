//! Database reachability probe.
//!
//! `check_list` is always `[connection, query]`. A connection failure fails
//! both checks; a reachable server with a failing test query fails only the
//! query check. Dialects: postgresql, mysql (sqlx single connections) and
//! sqlserver (tiberius). Anything else fails both checks without dialing out.

use chrono::Utc;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::{json, Map, Value};
use sqlx::{Connection, MySqlConnection, PgConnection};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::compat::TokioAsyncWriteCompatExt;
use tracing::{error, warn};
use uuid::Uuid;

use super::messages;
use crate::crypto::CryptoBox;
use crate::models::{DatabaseSpec, Monitor, MonitorResult, MonitorStatus};

enum ProbeOutcome {
    /// Could not reach the server; both checks fail.
    ConnectFailed,
    /// Connected; `query` is None when no test query is configured.
    Connected { query: Option<QueryOutcome> },
}

enum QueryOutcome {
    Executed { message: String },
    Failed,
}

pub async fn check_db(monitor: &Monitor, spec: &DatabaseSpec, crypto: &CryptoBox) -> MonitorResult {
    let started = Instant::now();
    let mut details = Map::new();
    let mut status = MonitorStatus::Healthy;
    let mut failed_checks = 0u32;
    let check_list = vec!["connection".to_string(), "query".to_string()];

    let password = if spec.encrypted_password.is_empty() {
        String::new()
    } else {
        match crypto.decrypt(&spec.encrypted_password) {
            Ok(password) => password,
            Err(e) => {
                warn!(
                    "Failed to decrypt password for monitor {}: {}",
                    monitor.name, e
                );
                String::new()
            }
        }
    };

    let dialect = spec.db_type.to_lowercase();
    match dialect.as_str() {
        "postgresql" | "mysql" | "sqlserver" => {
            let outcome = match dialect.as_str() {
                "postgresql" => check_postgres(spec, &password).await,
                "mysql" => check_mysql(spec, &password).await,
                _ => check_sqlserver(spec, &password).await,
            };

            match outcome {
                ProbeOutcome::ConnectFailed => {
                    status = MonitorStatus::Unhealthy;
                    failed_checks += 2;
                    details.insert(
                        "connection".to_string(),
                        json!({ "connected": false, "message": messages::CONNECTION_ERROR }),
                    );
                    details.insert(
                        "query".to_string(),
                        json!({ "executed": false, "message": messages::QUERY_CONNECTION_ERROR }),
                    );
                }
                ProbeOutcome::Connected { query } => {
                    details.insert("connection".to_string(), json!({ "connected": true }));
                    match query {
                        Some(QueryOutcome::Executed { message }) => {
                            details.insert(
                                "query".to_string(),
                                json!({ "executed": true, "message": message }),
                            );
                        }
                        Some(QueryOutcome::Failed) => {
                            status = MonitorStatus::Unhealthy;
                            failed_checks += 1;
                            details.insert(
                                "query".to_string(),
                                json!({ "executed": false, "message": messages::QUERY_EXECUTION_ERROR }),
                            );
                        }
                        None => {}
                    }
                }
            }
        }
        other => {
            error!("Unsupported database type for monitor {}: {}", monitor.name, other);
            status = MonitorStatus::Unhealthy;
            failed_checks += 2;
            let message = messages::unsupported_dialect(&spec.db_type);
            details.insert(
                "connection".to_string(),
                json!({ "connected": false, "message": message }),
            );
            details.insert(
                "query".to_string(),
                json!({ "executed": false, "message": message }),
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

fn encode_password(password: &str) -> String {
    utf8_percent_encode(password, NON_ALPHANUMERIC).to_string()
}

fn has_test_query(spec: &DatabaseSpec) -> bool {
    !spec.test_query.trim().is_empty()
}

fn executed_message(test_query: &str, rows: u64) -> String {
    format!(
        "Query '{}' executed successfully. Rows affected: {}",
        test_query, rows
    )
}

async fn check_postgres(spec: &DatabaseSpec, password: &str) -> ProbeOutcome {
    let dsn = format!(
        "postgres://{}:{}@{}:{}/{}",
        spec.username,
        encode_password(password),
        spec.host,
        spec.port,
        spec.database
    );

    let connect = timeout(
        Duration::from_secs(spec.connection_timeout_seconds),
        PgConnection::connect(&dsn),
    )
    .await;

    let mut conn = match connect {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            error!("postgresql connection to {}:{} failed: {}", spec.host, spec.port, e);
            return ProbeOutcome::ConnectFailed;
        }
        Err(_) => {
            error!("postgresql connection to {}:{} timed out", spec.host, spec.port);
            return ProbeOutcome::ConnectFailed;
        }
    };

    let query = if has_test_query(spec) {
        let timeout_stmt = format!("SET statement_timeout = {}", spec.query_timeout_seconds * 1000);
        let run = async {
            sqlx::query(&timeout_stmt).execute(&mut conn).await?;
            sqlx::query(&spec.test_query).execute(&mut conn).await
        }
        .await;

        Some(match run {
            Ok(result) => QueryOutcome::Executed {
                message: executed_message(&spec.test_query, result.rows_affected()),
            },
            Err(e) => {
                error!("postgresql test query failed on {}: {}", spec.host, e);
                QueryOutcome::Failed
            }
        })
    } else {
        None
    };

    let _ = conn.close().await;
    ProbeOutcome::Connected { query }
}

async fn check_mysql(spec: &DatabaseSpec, password: &str) -> ProbeOutcome {
    let dsn = format!(
        "mysql://{}:{}@{}:{}/{}",
        spec.username,
        encode_password(password),
        spec.host,
        spec.port,
        spec.database
    );

    let connect = timeout(
        Duration::from_secs(spec.connection_timeout_seconds),
        MySqlConnection::connect(&dsn),
    )
    .await;

    let mut conn = match connect {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            error!("mysql connection to {}:{} failed: {}", spec.host, spec.port, e);
            return ProbeOutcome::ConnectFailed;
        }
        Err(_) => {
            error!("mysql connection to {}:{} timed out", spec.host, spec.port);
            return ProbeOutcome::ConnectFailed;
        }
    };

    let query = if has_test_query(spec) {
        let timeout_stmt = format!("SET max_execution_time = {}", spec.query_timeout_seconds * 1000);
        let run = async {
            sqlx::query(&timeout_stmt).execute(&mut conn).await?;
            sqlx::query(&spec.test_query).execute(&mut conn).await
        }
        .await;

        Some(match run {
            Ok(result) => QueryOutcome::Executed {
                message: executed_message(&spec.test_query, result.rows_affected()),
            },
            Err(e) => {
                error!("mysql test query failed on {}: {}", spec.host, e);
                QueryOutcome::Failed
            }
        })
    } else {
        None
    };

    let _ = conn.close().await;
    ProbeOutcome::Connected { query }
}

async fn check_sqlserver(spec: &DatabaseSpec, password: &str) -> ProbeOutcome {
    let mut config = tiberius::Config::new();
    config.host(&spec.host);
    config.port(spec.port);
    config.database(&spec.database);
    config.authentication(tiberius::AuthMethod::sql_server(&spec.username, password));
    config.trust_cert();

    let connect = async {
        let tcp = TcpStream::connect((spec.host.as_str(), spec.port)).await?;
        tcp.set_nodelay(true)?;
        let client = tiberius::Client::connect(config, tcp.compat_write()).await?;
        Ok::<_, anyhow::Error>(client)
    };

    let mut client = match timeout(
        Duration::from_secs(spec.connection_timeout_seconds),
        connect,
    )
    .await
    {
        Ok(Ok(client)) => client,
        Ok(Err(e)) => {
            error!("sqlserver connection to {}:{} failed: {}", spec.host, spec.port, e);
            return ProbeOutcome::ConnectFailed;
        }
        Err(_) => {
            error!("sqlserver connection to {}:{} timed out", spec.host, spec.port);
            return ProbeOutcome::ConnectFailed;
        }
    };

    let query = if has_test_query(spec) {
        let timeout_stmt = format!("SET LOCK_TIMEOUT {}", spec.query_timeout_seconds * 1000);
        let run = async {
            client.simple_query(timeout_stmt).await?.into_results().await?;
            let results = client
                .simple_query(spec.test_query.clone())
                .await?
                .into_results()
                .await?;
            Ok::<_, tiberius::error::Error>(results)
        }
        .await;

        Some(match run {
            Ok(results) => {
                let rows: usize = results.iter().map(|set| set.len()).sum();
                QueryOutcome::Executed {
                    message: executed_message(&spec.test_query, rows as u64),
                }
            }
            Err(e) => {
                error!("sqlserver test query failed on {}: {}", spec.host, e);
                QueryOutcome::Failed
            }
        })
    } else {
        None
    };

    ProbeOutcome::Connected { query }
}
