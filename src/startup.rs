//! Startup sequence for sessiond
//!
//! Wires configuration into a ready [`SessionService`]:
//! - observability (tracing subscriber, optional Prometheus exporter)
//! - the configured session store backend, with migrations for SQLite
//! - the transaction runner

use std::sync::Arc;

use tracing::info;

use crate::config::{AppConfig, StorageBackend};
use crate::errors::Result;
use crate::observability;
use crate::services::SessionService;
use crate::storage::{
    check_connection, create_pool, InMemorySessionStore, SessionStore, SqliteSessionStore,
};

/// Initialize logging and metrics from the loaded configuration
pub async fn init_observability(config: &AppConfig) -> Result<()> {
    observability::init_observability(&config.observability).await?;
    observability::log_config_info(config);
    Ok(())
}

/// Build the session store selected by `storage.backend`
pub async fn build_session_store(config: &AppConfig) -> Result<Arc<dyn SessionStore>> {
    let store: Arc<dyn SessionStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(InMemorySessionStore::new()),
        StorageBackend::Sqlite => {
            let pool = create_pool(&config.database).await?;
            check_connection(&pool).await?;
            Arc::new(SqliteSessionStore::new(pool))
        }
    };

    info!(backend = ?config.storage.backend, "Session store ready");
    Ok(store)
}

/// Build a [`SessionService`] from validated configuration
pub async fn build_session_service(config: &AppConfig) -> Result<SessionService> {
    config.validate()?;

    let store = build_session_store(config).await?;
    let service = SessionService::from_config(store, &config.transaction);

    info!(
        app_name = crate::APP_NAME,
        version = crate::VERSION,
        commit_max_attempts = service.runner().config().commit_max_attempts,
        "Session service initialized"
    );
    Ok(service)
}
