//! Session store doubles for in-library tests.
//!
//! This module is only available in test builds (`#[cfg(test)]`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use tokio_util::sync::CancellationToken;

use super::{InMemorySessionStore, SessionStore};
use crate::domain::{Session, SessionId, UserId};
use crate::errors::{Result, SessiondError};

/// Insert `count` active sessions for `user`, one millisecond apart, returning
/// their IDs in creation order.
pub async fn seed_sessions(
    store: &dyn SessionStore,
    user: &UserId,
    count: usize,
) -> Vec<SessionId> {
    let base = chrono::Utc::now();
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        let mut session = Session::new(SessionId::new(), user.clone());
        session.created_at = base + Duration::milliseconds(n as i64);
        ids.push(session.id.clone());
        store.insert_session(session).await.expect("seed session");
    }
    ids
}

#[derive(Debug, Default)]
struct Faults {
    fail_lists: bool,
    /// Deletes left to fail before they start succeeding again
    failing_deletes: usize,
    /// Deletes left to succeed before every further delete fails
    deletes_before_outage: Option<usize>,
    /// Token cancelled during the given list call (1-based), after which the
    /// call still succeeds
    cancel_on_list: Option<(usize, CancellationToken)>,
}

/// In-memory store that counts calls and injects `Unavailable` failures
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: InMemorySessionStore,
    faults: Mutex<Faults>,
    delete_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_deletes(&self, count: usize) {
        self.faults.lock().unwrap().failing_deletes = count;
    }

    pub fn outage_after_deletes(&self, successes: usize) {
        self.faults.lock().unwrap().deletes_before_outage = Some(successes);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.faults.lock().unwrap().fail_lists = fail;
    }

    pub fn cancel_on_list(&self, call: usize, token: CancellationToken) {
        self.faults.lock().unwrap().cancel_on_list = Some((call, token));
    }

    pub fn heal(&self) {
        *self.faults.lock().unwrap() = Faults::default();
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn delete_should_fail(&self) -> bool {
        let mut faults = self.faults.lock().unwrap();
        if faults.failing_deletes > 0 {
            faults.failing_deletes -= 1;
            return true;
        }
        match faults.deletes_before_outage {
            Some(0) => true,
            Some(ref mut left) => {
                *left -= 1;
                false
            }
            None => false,
        }
    }
}

#[async_trait]
impl SessionStore for FaultyStore {
    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<SessionId>> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let faults = self.faults.lock().unwrap();
            if faults.fail_lists {
                return Err(SessiondError::unavailable("injected list failure"));
            }
            if let Some((at, token)) = &faults.cancel_on_list {
                if *at == call {
                    token.cancel();
                }
            }
        }
        self.inner.list_sessions(user_id).await
    }

    async fn delete_session(&self, id: &SessionId) -> Result<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.delete_should_fail() {
            return Err(SessiondError::unavailable("injected delete failure"));
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
