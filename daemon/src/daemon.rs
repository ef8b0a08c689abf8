//! Daemon wiring and process lifecycle.
//!
//! All components are constructed here once and passed around as explicit
//! `Arc` dependencies. Signals: SIGINT/SIGTERM shut down gracefully, SIGHUP
//! reloads the config file. A PID file is written at startup and removed on
//! the way out.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::commands::CommandRouter;
use crate::config::ConfigStore;
use crate::crypto::CryptoBox;
use crate::notifier::EmailService;
use crate::scheduler::MonitorScheduler;
use crate::server::ControlServer;
use crate::store::Store;

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

/// Filesystem locations, overridable through the environment.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub config_file: PathBuf,
    pub database_path: PathBuf,
    pub socket_path: PathBuf,
    pub pid_file: PathBuf,
    pub log_dir: PathBuf,
}

impl DaemonPaths {
    pub fn from_env() -> Self {
        Self {
            config_file: env_path("WEBMOND_CONFIG", "data/webmond_config.json"),
            database_path: env_path("WEBMOND_DB", "data/webmond.db"),
            socket_path: env_path("WEBMOND_SOCKET", "/tmp/webmond.sock"),
            pid_file: env_path("WEBMOND_PID_FILE", "data/webmond.pid"),
            log_dir: env_path("WEBMOND_LOG_DIR", "logs"),
        }
    }
}

pub struct Daemon {
    paths: DaemonPaths,
    config: Arc<ConfigStore>,
    scheduler: Arc<MonitorScheduler>,
    router: Arc<CommandRouter>,
}

impl Daemon {
    pub async fn new(paths: DaemonPaths) -> Result<Self> {
        let config = Arc::new(ConfigStore::load_or_init(&paths.config_file).await?);

        let key = config.current().await.security.encryption_key.clone();
        let crypto = Arc::new(
            CryptoBox::from_base64_key(&key)
                .map_err(|e| anyhow::anyhow!("Bad encryption key in config: {}", e))?,
        );

        let store = Arc::new(
            Store::new(
                paths
                    .database_path
                    .to_str()
                    .context("Database path is not valid UTF-8")?,
            )
            .await?,
        );

        let email = Arc::new(EmailService::new(config.clone(), crypto.clone()));
        if email.is_configured().await {
            info!("Email service configured and ready");
        } else {
            warn!("Email service not configured - notifications will be disabled");
        }

        let scheduler = Arc::new(
            MonitorScheduler::new(store.clone(), crypto.clone(), config.clone(), email.clone())
                .await?,
        );
        info!("Monitor scheduler initialized");

        let router = Arc::new(CommandRouter::new(
            store,
            scheduler.clone(),
            config.clone(),
            crypto,
        ));

        Ok(Self {
            paths,
            config,
            scheduler,
            router,
        })
    }

    pub async fn run(&self) -> Result<()> {
        self.write_pid_file().await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = ControlServer::new(self.paths.socket_path.clone(), self.router.clone());
        let server_handle = tokio::spawn(async move {
            if let Err(e) = server.run(shutdown_rx).await {
                error!("Control server failed: {}", e);
            }
        });

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sighup = signal(SignalKind::hangup())?;

        info!("webmond daemon started (PID: {})", std::process::id());

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, reloading configuration...");
                    match self.config.reload().await {
                        Ok(()) => info!("Configuration reloaded successfully"),
                        Err(e) => error!("Failed to reload configuration: {}", e),
                    }
                }
            }
        }

        let _ = shutdown_tx.send(true);
        if let Err(e) = self.scheduler.shutdown().await {
            warn!("Scheduler shutdown reported an error: {}", e);
        }
        let _ = server_handle.await;
        self.remove_pid_file().await;
        info!("Cleanup completed");
        Ok(())
    }

    async fn write_pid_file(&self) {
        if let Some(parent) = self.paths.pid_file.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
        }
        if let Err(e) =
            tokio::fs::write(&self.paths.pid_file, std::process::id().to_string()).await
        {
            warn!(
                "Could not write PID file {}: {}",
                self.paths.pid_file.display(),
                e
            );
        }
    }

    async fn remove_pid_file(&self) {
        if tokio::fs::try_exists(&self.paths.pid_file).await.unwrap_or(false) {
            if let Err(e) = tokio::fs::remove_file(&self.paths.pid_file).await {
                warn!(
                    "Could not remove PID file {}: {}",
                    self.paths.pid_file.display(),
                    e
                );
            }
        }
    }
}
