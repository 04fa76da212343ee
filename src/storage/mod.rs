//! # Session Storage
//!
//! The [`SessionStore`] capability consumed by transactions, plus the
//! in-memory and SQLite implementations.
//!
//! Stores implement delete as "revoke if active": the record stays for
//! auditing, never becomes active again, and drops out of `list_sessions`.
//! A single-ID delete is atomic, which is the only concurrency guarantee
//! transactions rely on.

pub mod memory;
pub mod migrations;
pub mod pool;
pub mod sqlite;

#[cfg(test)]
pub mod test_helpers;

use async_trait::async_trait;

use crate::domain::{Session, SessionId, UserId};
use crate::errors::{Result, SessiondError};

pub use crate::config::DatabaseConfig;
pub use memory::InMemorySessionStore;
pub use migrations::run_migrations;
pub use pool::{create_pool, DbPool};
pub use sqlite::SqliteSessionStore;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Active sessions owned by `user_id`, oldest first (ties broken by ID)
    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<SessionId>>;

    /// Revoke one session if it is still active.
    ///
    /// Returns `true` when this call revoked it and `false` when it was already
    /// revoked or never existed. Never fails for an absent ID.
    async fn delete_session(&self, id: &SessionId) -> Result<bool>;

    /// Look up a session record, revoked or not
    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>>;

    /// Store a new session record. Fails with `InvalidState` if the ID is taken.
    async fn insert_session(&self, session: Session) -> Result<()>;
}

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        SessiondError::unavailable_with_source("Database connectivity check failed", Box::new(e))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_sqlite_pool() {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        check_connection(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_database_url() {
        let config = DatabaseConfig { url: "invalid://url".to_string(), ..Default::default() };

        let result = create_pool(&config).await;
        assert!(result.is_err());
    }
}
