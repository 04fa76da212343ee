//! SQLite-backed session store.
//!
//! Revocation is a conditional `UPDATE ... WHERE revoked = 0`; the affected
//! row count tells whether this call was the one that revoked the session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

use super::{DbPool, SessionStore};
use crate::domain::{Session, SessionId, UserId};
use crate::errors::{Result, SessiondError};

#[derive(Debug, Clone, FromRow)]
struct SessionRow {
    pub id: SessionId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
            last_active_at: row.last_active_at,
            revoked: row.revoked,
            revoked_at: row.revoked_at,
        }
    }
}

/// Store failures are surfaced as `Unavailable` so callers may retry
fn unavailable(context: &'static str) -> impl FnOnce(sqlx::Error) -> SessiondError {
    move |err| {
        tracing::error!(error = %err, "{}", context);
        SessiondError::unavailable_with_source(context, Box::new(err))
    }
}

#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: DbPool,
}

impl SqliteSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self), fields(user_id = %user_id), name = "db_list_sessions")]
    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<SessionId>> {
        let ids: Vec<SessionId> = sqlx::query_scalar(
            "SELECT id FROM sessions WHERE user_id = $1 AND revoked = 0 ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("Failed to list sessions"))?;

        Ok(ids)
    }

    #[instrument(skip(self), fields(session_id = %id), name = "db_delete_session")]
    async fn delete_session(&self, id: &SessionId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked = 1, revoked_at = $1 WHERE id = $2 AND revoked = 0",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(unavailable("Failed to revoke session"))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(session_id = %id), name = "db_get_session")]
    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, user_id, created_at, last_active_at, revoked, revoked_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable("Failed to get session"))?;

        Ok(row.map(Session::from))
    }

    #[instrument(skip(self, session), fields(session_id = %session.id), name = "db_insert_session")]
    async fn insert_session(&self, session: Session) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO sessions (id, user_id, created_at, last_active_at, revoked, revoked_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(session.created_at)
        .bind(session.last_active_at)
        .bind(session.revoked)
        .bind(session.revoked_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(SessiondError::invalid_state(format!(
                    "session '{}' already exists",
                    session.id
                )))
            }
            Err(err) => Err(unavailable("Failed to insert session")(err)),
        }
    }
}
