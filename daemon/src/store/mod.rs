//! SQLite persistence for spaces, monitors and probe results.
//!
//! The module is organized into submodules:
//! - `spaces` - space CRUD with cascading delete
//! - `monitors` - monitor CRUD and the unhealthy-monitor scan
//! - `results` - append-only result history and retention queries
//!
//! The store is the only component that mutates persisted state. Every
//! timestamp comparison binds a Rust-side `DateTime<Utc>` so stored and
//! compared values share one encoding.

mod monitors;
mod results;
mod spaces;

pub use results::{CleanupPreview, CleanupStats};

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;
use tracing::{error, info};

pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Expose pool for integration test queries
    #[allow(dead_code)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn new(database_path: &str) -> Result<Self> {
        info!("Opening database at {}", database_path);

        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!("Failed to create database directory {:?}: {}", parent, e);
                    return Err(e.into());
                }
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path);
        let pool = match SqlitePool::connect(&database_url).await {
            Ok(pool) => pool,
            Err(e) => {
                error!("Failed to connect to database {}: {}", database_url, e);
                return Err(e.into());
            }
        };

        let store = Self { pool };
        store.initialize_tables().await?;
        info!("Database initialized");
        Ok(store)
    }

    /// In-memory store for tests. A single connection keeps every query on
    /// the same database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.initialize_tables().await?;
        Ok(store)
    }

    async fn initialize_tables(&self) -> Result<()> {
        let spaces_sql = r#"
            CREATE TABLE IF NOT EXISTS spaces (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                description TEXT,
                notification_emails TEXT NOT NULL DEFAULT '[]',
                created_at DATETIME NOT NULL,
                updated_at DATETIME
            )
        "#;
        if let Err(e) = sqlx::query(spaces_sql).execute(&self.pool).await {
            error!("Failed to create spaces table: {}", e);
            return Err(e.into());
        }

        let monitors_sql = r#"
            CREATE TABLE IF NOT EXISTS monitors (
                id TEXT PRIMARY KEY,
                space_id TEXT NOT NULL,
                name TEXT NOT NULL,
                monitor_type TEXT NOT NULL,
                status TEXT NOT NULL,
                check_interval_seconds INTEGER NOT NULL DEFAULT 300,
                created_at DATETIME NOT NULL,
                updated_at DATETIME,
                last_checked_at DATETIME,
                last_healthy_at DATETIME,
                url TEXT,
                expected_status_code INTEGER,
                timeout_seconds INTEGER,
                check_ssl BOOLEAN,
                follow_redirects BOOLEAN,
                check_content TEXT,
                db_type TEXT,
                host TEXT,
                port INTEGER,
                database_name TEXT,
                username TEXT,
                encrypted_password TEXT,
                connection_timeout_seconds INTEGER,
                query_timeout_seconds INTEGER,
                test_query TEXT,
                UNIQUE(space_id, name)
            )
        "#;
        if let Err(e) = sqlx::query(monitors_sql).execute(&self.pool).await {
            error!("Failed to create monitors table: {}", e);
            return Err(e.into());
        }

        let results_sql = r#"
            CREATE TABLE IF NOT EXISTS monitor_results (
                id TEXT PRIMARY KEY,
                monitor_id TEXT NOT NULL,
                space_id TEXT NOT NULL,
                monitor_type TEXT NOT NULL,
                timestamp DATETIME NOT NULL,
                status TEXT NOT NULL,
                response_time_ms REAL,
                failed_checks INTEGER NOT NULL DEFAULT 0,
                check_list TEXT,
                details TEXT
            )
        "#;
        if let Err(e) = sqlx::query(results_sql).execute(&self.pool).await {
            error!("Failed to create monitor_results table: {}", e);
            return Err(e.into());
        }

        for index_sql in [
            "CREATE INDEX IF NOT EXISTS idx_monitors_space ON monitors(space_id)",
            "CREATE INDEX IF NOT EXISTS idx_results_monitor_ts ON monitor_results(monitor_id, timestamp DESC)",
            "CREATE INDEX IF NOT EXISTS idx_results_space_ts ON monitor_results(space_id, timestamp DESC)",
            "CREATE INDEX IF NOT EXISTS idx_results_status_ts ON monitor_results(status, timestamp)",
        ] {
            if let Err(e) = sqlx::query(index_sql).execute(&self.pool).await {
                error!("Failed to create index: {}", e);
                return Err(e.into());
            }
        }

        Ok(())
    }
}
