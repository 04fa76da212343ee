//! Common test utilities for all integration tests.
//!
//! Provides session store doubles and seeding helpers.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

pub mod stores;

use std::sync::Arc;

use chrono::{Duration, Utc};
use sessiond::storage::{InMemorySessionStore, SessionStore};
use sessiond::{AuthContext, Session, SessionId, SessionService, UserId};

/// Insert `count` active sessions for `user`, one millisecond apart, returning
/// their IDs in creation order.
pub async fn seed_sessions(
    store: &dyn SessionStore,
    user: &UserId,
    count: usize,
) -> Vec<SessionId> {
    let base = Utc::now();
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        let mut session = Session::new(SessionId::new(), user.clone());
        session.created_at = base + Duration::milliseconds(n as i64);
        ids.push(session.id.clone());
        store.insert_session(session).await.expect("seed session");
    }
    ids
}

/// Simulate a login that lands after earlier sessions
pub async fn login(store: &dyn SessionStore, user: &UserId) -> SessionId {
    let mut session = Session::new(SessionId::new(), user.clone());
    session.created_at = Utc::now() + Duration::seconds(1);
    let id = session.id.clone();
    store.insert_session(session).await.expect("login session");
    id
}

pub fn memory_store() -> Arc<InMemorySessionStore> {
    Arc::new(InMemorySessionStore::new())
}

pub fn self_auth(user: &UserId) -> AuthContext {
    AuthContext::for_user(user.clone())
}

pub fn service_over(store: Arc<dyn SessionStore>) -> SessionService {
    SessionService::from_config(store, &sessiond::config::TransactionConfig {
        commit_retry_backoff_ms: 1,
        ..Default::default()
    })
}
