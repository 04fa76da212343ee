//! Session store doubles wrapping the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sessiond::storage::{InMemorySessionStore, SessionStore};
use sessiond::{Result, Session, SessionId, SessiondError, UserId};

/// Counts delete calls so tests can prove a path performed no writes
#[derive(Debug, Default)]
pub struct CountingSessionStore {
    inner: InMemorySessionStore,
    writes: AtomicUsize,
}

impl CountingSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete calls, whether or not they revoked anything
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for CountingSessionStore {
    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<SessionId>> {
        self.inner.list_sessions(user_id).await
    }

    async fn delete_session(&self, id: &SessionId) -> Result<bool> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_session(id).await
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        self.inner.get_session(id).await
    }

    /// Seeding is not counted
    async fn insert_session(&self, session: Session) -> Result<()> {
        self.inner.insert_session(session).await
    }
}

/// Fails the first `failures` deletes with `Unavailable`, then behaves
#[derive(Debug, Default)]
pub struct FlakySessionStore {
    inner: InMemorySessionStore,
    failures_left: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl FlakySessionStore {
    pub fn failing_first(failures: usize) -> Self {
        Self { failures_left: AtomicUsize::new(failures), ..Default::default() }
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for FlakySessionStore {
    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<SessionId>> {
        self.inner.list_sessions(user_id).await
    }

    async fn delete_session(&self, id: &SessionId) -> Result<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SessiondError::unavailable("session store write failed"));
        }
        self.inner.delete_session(id).await
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        self.inner.get_session(id).await
    }

    async fn insert_session(&self, session: Session) -> Result<()> {
        self.inner.insert_session(session).await
    }
}
