//! Probe engines.
//!
//! A probe never fails out: every execution produces a `MonitorResult`, with
//! failures materialized into the per-check details and counted in
//! `failed_checks`.

pub mod db;
pub mod http;
pub mod ssl;

use crate::crypto::CryptoBox;
use crate::models::{Monitor, MonitorResult, MonitorSpec};

/// Check failure message constants, shared by both probe engines.
pub mod messages {
    pub const BASE_ERROR: &str = "An unexpected error occurred during monitoring";
    pub const CONNECTION_ERROR: &str = "Failed to establish connection";
    pub const CONTENT_ERROR: &str = "Required content not found in response";
    pub const SSL_ERROR: &str = "SSL/TLS verification failed";
    pub const QUERY_CONNECTION_ERROR: &str = "Failed to execute query due to connection error";
    pub const QUERY_EXECUTION_ERROR: &str = "Failed to execute query";

    pub fn timeout_error(timeout_seconds: u64) -> String {
        format!("Request timed out after {} seconds", timeout_seconds)
    }

    pub fn status_code_error(expected: u16, actual: u16) -> String {
        format!("Expected status code {}, got {}", expected, actual)
    }

    pub fn unsupported_dialect(db_type: &str) -> String {
        format!("Unsupported database type: {}", db_type)
    }
}

/// Dispatch to the engine matching the monitor variant.
pub async fn run_probe(monitor: &Monitor, crypto: &CryptoBox) -> MonitorResult {
    match &monitor.spec {
        MonitorSpec::Url(spec) => http::check_url(monitor, spec).await,
        MonitorSpec::Database(spec) => db::check_db(monitor, spec, crypto).await,
    }
}
