//! # Database Connection Pool Management
//!
//! SQLite pool creation for the persistent session store.

use crate::config::DatabaseConfig;
use crate::errors::{Result, SessiondError};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::{str::FromStr, time::Duration};

/// Type alias for the database connection pool
pub type DbPool = Pool<Sqlite>;

const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a SQLite connection pool, running migrations when `auto_migrate` is set
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    validate_config(config)?;

    let pool_options = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout())
        .test_before_acquire(true);

    // an in-memory database is dropped with its connection, so never recycle it
    let pool_options = if config.is_in_memory() {
        pool_options.idle_timeout(None::<Duration>).max_lifetime(None::<Duration>)
    } else {
        match config.idle_timeout() {
            Some(idle_timeout) => pool_options.idle_timeout(idle_timeout),
            None => pool_options,
        }
    };

    let connect_options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| SessiondError::Database {
            source: e,
            context: format!("Invalid SQLite connection string: {}", sanitize_url(&config.url)),
        })?
        .create_if_missing(true)
        .busy_timeout(SQLITE_BUSY_TIMEOUT)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = pool_options.connect_with(connect_options).await.map_err(|e| {
        tracing::error!(
            error = %e,
            url = %sanitize_url(&config.url),
            busy_timeout_ms = SQLITE_BUSY_TIMEOUT.as_millis(),
            "Failed to create SQLite database pool"
        );
        SessiondError::Database {
            source: e,
            context: format!("Failed to connect to database: {}", sanitize_url(&config.url)),
        }
    })?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connect_timeout_ms = config.connect_timeout().as_millis(),
        idle_timeout_ms = config.idle_timeout().map(|d| d.as_millis()),
        "Database connection pool created"
    );

    if config.auto_migrate {
        tracing::info!("Auto-migration enabled, running database migrations");
        crate::storage::migrations::run_migrations(&pool).await?;
    }

    Ok(pool)
}

fn validate_config(config: &DatabaseConfig) -> Result<()> {
    if config.max_connections == 0 {
        return Err(SessiondError::validation("max_connections must be greater than 0"));
    }

    if config.min_connections > config.max_connections {
        return Err(SessiondError::validation(
            "min_connections cannot be greater than max_connections",
        ));
    }

    if config.url.is_empty() {
        return Err(SessiondError::validation("database URL cannot be empty"));
    }

    if !config.is_sqlite() {
        return Err(SessiondError::validation_field(
            "database URL must start with 'sqlite:'",
            "database.url",
        ));
    }

    if config.is_in_memory() && config.max_connections > 1 {
        return Err(SessiondError::validation_field(
            "in-memory SQLite requires max_connections = 1",
            "database.max_connections",
        ));
    }

    Ok(())
}

/// Strip credentials from a URL before it reaches the logs
fn sanitize_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.password().is_some() || !parsed.username().is_empty() => format!(
            "{}://***:***@{}{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or("unknown"),
            parsed.path()
        ),
        _ => url.to_string(),
    }
}
