//! In-memory session store backed by `DashMap`.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, instrument};

use super::SessionStore;
use crate::domain::{Session, SessionId, UserId};
use crate::errors::{Result, SessiondError};

/// Session store for tests and single-node deployments.
///
/// Every per-ID operation holds the entry's shard lock, which makes
/// delete-if-active atomic.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, revoked ones included
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<SessionId>> {
        let mut active: Vec<(chrono::DateTime<Utc>, SessionId)> = self
            .sessions
            .iter()
            .filter(|entry| entry.is_owned_by(user_id) && entry.is_active())
            .map(|entry| (entry.created_at, entry.id.clone()))
            .collect();
        active.sort();

        Ok(active.into_iter().map(|(_, id)| id).collect())
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn delete_session(&self, id: &SessionId) -> Result<bool> {
        let revoked = match self.sessions.get_mut(id) {
            Some(mut session) => session.revoke(Utc::now()),
            None => false,
        };
        debug!(revoked, "delete_session");
        Ok(revoked)
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.value().clone()))
    }

    #[instrument(skip(self, session), fields(session_id = %session.id, user_id = %session.user_id))]
    async fn insert_session(&self, session: Session) -> Result<()> {
        match self.sessions.entry(session.id.clone()) {
            Entry::Occupied(_) => Err(SessiondError::invalid_state(format!(
                "session '{}' already exists",
                session.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }
}
