//! Config file persistence with snapshot reads.
//!
//! Readers take a cheap `Arc<AppConfig>` snapshot; writers rewrite the file
//! and swap the snapshot under the lock. SIGHUP reload goes through
//! [`ConfigStore::reload`].

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::AppConfig;
use crate::crypto::CryptoBox;

pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<AppConfig>>,
}

impl ConfigStore {
    /// Load the config file, creating a default one (with a freshly generated
    /// encryption key) when it does not exist yet. A file that predates the
    /// key also gets one generated and persisted.
    pub async fn load_or_init(path: &Path) -> Result<Self> {
        let config = if fs::try_exists(path).await.unwrap_or(false) {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let mut config: AppConfig = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;

            if config.security.encryption_key.trim().is_empty() {
                info!("Config file has no encryption key, generating one");
                config.security.encryption_key = CryptoBox::generate_key_b64();
                Self::write_file(path, &mut config).await?;
            }
            config
        } else {
            info!(
                "Configuration file not found at {}, creating default config",
                path.display()
            );
            let mut config = AppConfig::default();
            config.security.encryption_key = CryptoBox::generate_key_b64();
            Self::write_file(path, &mut config).await?;
            config
        };

        info!("Configuration loaded from {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// Current snapshot. Cheap to call from probes and jobs.
    pub async fn current(&self) -> Arc<AppConfig> {
        self.current.read().await.clone()
    }

    /// Persist a new configuration. A plaintext `email.password` is encrypted
    /// into `encrypted_password` and dropped before anything touches disk.
    pub async fn save(&self, mut config: AppConfig, crypto: &CryptoBox) -> Result<()> {
        if let Some(password) = config.email.password.take() {
            if !password.is_empty() {
                config.email.encrypted_password = crypto
                    .encrypt(&password)
                    .map_err(|e| anyhow!("Failed to encrypt email password: {}", e))?;
            }
        }

        let mut guard = self.current.write().await;
        Self::write_file(&self.path, &mut config).await?;
        *guard = Arc::new(config);
        info!("Configuration saved to {}", self.path.display());
        Ok(())
    }

    /// Re-read the file from disk, replacing the in-memory snapshot.
    pub async fn reload(&self) -> Result<()> {
        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read config file {}", self.path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", self.path.display()))?;

        if config.email.password.is_some() {
            warn!("Config file contains a plaintext email password; it will be ignored until saved");
        }

        let mut guard = self.current.write().await;
        *guard = Arc::new(config);
        info!("Configuration reloaded from {}", self.path.display());
        Ok(())
    }

    async fn write_file(path: &Path, config: &mut AppConfig) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        config.last_updated = Some(now.clone());
        if config.configured_at.is_none() {
            config.configured_at = Some(now);
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create config directory {}", parent.display())
                })?;
            }
        }

        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }
}
