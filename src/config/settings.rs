//! # Configuration Settings
//!
//! Defines the configuration structure for sessiond.

use crate::errors::{Result, SessiondError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::Validate;

/// Environment variable prefix for layered configuration (`SESSIOND__SECTION__KEY`)
pub const ENV_PREFIX: &str = "SESSIOND";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// Session store selection
    #[validate(nested)]
    pub storage: StorageConfig,

    /// Database configuration (SQLite backend)
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,

    /// Transaction runner configuration
    #[validate(nested)]
    pub transaction: TransactionConfig,
}

impl AppConfig {
    /// Load configuration from defaults, an optional file, then the environment.
    ///
    /// A `.env` file in the working directory is read first when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(SessiondError::from)?;

        self.validate_custom()?;

        Ok(())
    }

    /// Custom validation logic that goes beyond what the validator crate can do
    fn validate_custom(&self) -> Result<()> {
        if self.storage.backend == StorageBackend::Sqlite && !self.database.is_sqlite() {
            return Err(SessiondError::validation_field(
                "Database URL must start with 'sqlite://' for the sqlite backend",
                "database.url",
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(SessiondError::validation(
                "min_connections cannot be greater than max_connections",
            ));
        }

        Ok(())
    }
}

/// Which session store implementation backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[validate(range(min = 0, max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,

    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/sessiond.db".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600, // 10 minutes
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    /// Check if this is a SQLite configuration
    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    /// In-memory SQLite lives only as long as its connection
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// Single-connection in-memory database, for tests and demos
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            idle_timeout_seconds: 0,
            auto_migrate: true,
            ..Default::default()
        }
    }
}

/// Observability configuration for metrics and logging
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Enable metrics collection
    pub enable_metrics: bool,

    /// Metrics server port (0 = disabled)
    pub metrics_port: u16,

    /// Service name attached to logs and metrics
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            metrics_port: 9090,
            service_name: "sessiond".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

impl ObservabilityConfig {
    /// Get metrics bind address (None if disabled)
    pub fn metrics_bind_address(&self) -> Option<String> {
        if self.metrics_port == 0 {
            None
        } else {
            Some(format!("0.0.0.0:{}", self.metrics_port))
        }
    }
}

/// What `postcondition` does when the user has no active session left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmptySnapshotPolicy {
    /// Prepare an empty snapshot; commit is a no-op success
    #[default]
    Succeed,
    /// Fail with `NotFound`
    NotFound,
}

/// Transaction runner configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransactionConfig {
    /// Policy for an empty session snapshot
    pub empty_snapshot_policy: EmptySnapshotPolicy,

    /// Commit attempts on the same transaction before giving up
    #[validate(range(min = 1, max = 10, message = "Commit attempts must be between 1 and 10"))]
    pub commit_max_attempts: u32,

    /// Initial delay between commit attempts, doubled after each failure
    #[validate(range(
        min = 1,
        max = 10000,
        message = "Commit retry backoff must be between 1 and 10000 milliseconds"
    ))]
    pub commit_retry_backoff_ms: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            empty_snapshot_policy: EmptySnapshotPolicy::Succeed,
            commit_max_attempts: 3,
            commit_retry_backoff_ms: 50,
        }
    }
}

impl TransactionConfig {
    /// Get the initial commit retry backoff as Duration
    pub fn commit_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.commit_retry_backoff_ms)
    }
}
