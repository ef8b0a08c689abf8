use std::sync::Arc;
use tempfile::TempDir;

use webmond::{
    CommandRouter, ConfigStore, CryptoBox, EmailService, MonitorScheduler, Store,
};

/// In-memory store on a single connection.
pub async fn test_store() -> Arc<Store> {
    Arc::new(Store::in_memory().await.expect("Failed to create test store"))
}

/// A fully wired daemon environment backed by an in-memory store and a
/// throwaway config directory.
pub struct TestEnv {
    pub store: Arc<Store>,
    pub crypto: Arc<CryptoBox>,
    pub config: Arc<ConfigStore>,
    pub email: Arc<EmailService>,
    pub scheduler: Arc<MonitorScheduler>,
    pub router: Arc<CommandRouter>,
    _config_dir: TempDir,
}

pub async fn test_env() -> TestEnv {
    let config_dir = TempDir::new().expect("Failed to create temp config dir");
    let config = Arc::new(
        ConfigStore::load_or_init(&config_dir.path().join("config.json"))
            .await
            .expect("Failed to init test config"),
    );
    let crypto = Arc::new(
        CryptoBox::from_base64_key(&config.current().await.security.encryption_key)
            .expect("Failed to build test crypto box"),
    );
    let store = test_store().await;
    let email = Arc::new(EmailService::new(config.clone(), crypto.clone()));
    let scheduler = Arc::new(
        MonitorScheduler::new(store.clone(), crypto.clone(), config.clone(), email.clone())
            .await
            .expect("Failed to build test scheduler"),
    );
    let router = Arc::new(CommandRouter::new(
        store.clone(),
        scheduler.clone(),
        config.clone(),
        crypto.clone(),
    ));

    TestEnv {
        store,
        crypto,
        config,
        email,
        scheduler,
        router,
        _config_dir: config_dir,
    }
}
