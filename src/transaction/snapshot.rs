//! Revocation snapshots and the commit/rollback machinery shared by every
//! session transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn, Instrument, Span};

use super::{RollbackOutcome, TransactionKind, TxState};
use crate::config::EmptySnapshotPolicy;
use crate::domain::{SessionId, UserId};
use crate::errors::{Result, SessiondError};
use crate::storage::SessionStore;

/// The fixed set of sessions a transaction will revoke.
///
/// Captured once in `postcondition`; commit revokes exactly these IDs and
/// never re-queries the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationSnapshot {
    user_id: UserId,
    session_ids: Vec<SessionId>,
    taken_at: DateTime<Utc>,
}

impl RevocationSnapshot {
    pub fn new(user_id: UserId, session_ids: Vec<SessionId>) -> Self {
        Self { user_id, session_ids, taken_at: Utc::now() }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn session_ids(&self) -> &[SessionId] {
        &self.session_ids
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn len(&self) -> usize {
        self.session_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.session_ids.is_empty()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.session_ids.contains(id)
    }
}

/// Which snapshot IDs commit has processed so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitProgress {
    revoked: Vec<SessionId>,
    already_absent: Vec<SessionId>,
}

impl CommitProgress {
    /// Sessions this transaction revoked
    pub fn revoked(&self) -> &[SessionId] {
        &self.revoked
    }

    /// Snapshot sessions that were gone before this transaction reached them
    pub fn already_absent(&self) -> &[SessionId] {
        &self.already_absent
    }

    pub fn processed(&self) -> usize {
        self.revoked.len() + self.already_absent.len()
    }
}

/// State, snapshot and progress of one revocation transaction.
///
/// Owns the state machine so the transaction types only supply their
/// precondition and the session list for their snapshot.
pub(crate) struct RevocationCore {
    kind: TransactionKind,
    store: Arc<dyn SessionStore>,
    span: Span,
    policy: EmptySnapshotPolicy,
    state: TxState,
    snapshot: Option<RevocationSnapshot>,
    progress: CommitProgress,
}

impl std::fmt::Debug for RevocationCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationCore")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("snapshot", &self.snapshot)
            .field("progress", &self.progress)
            .finish()
    }
}

impl RevocationCore {
    pub(crate) fn new(
        kind: TransactionKind,
        store: Arc<dyn SessionStore>,
        span: Span,
        policy: EmptySnapshotPolicy,
    ) -> Self {
        span.record("state", TxState::Created.as_str());
        Self {
            kind,
            store,
            span,
            policy,
            state: TxState::Created,
            snapshot: None,
            progress: CommitProgress::default(),
        }
    }

    pub(crate) fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub(crate) fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    pub(crate) fn state(&self) -> TxState {
        self.state
    }

    pub(crate) fn set_policy(&mut self, policy: EmptySnapshotPolicy) {
        self.policy = policy;
    }

    pub(crate) fn snapshot(&self) -> Option<&RevocationSnapshot> {
        self.snapshot.as_ref()
    }

    pub(crate) fn progress(&self) -> &CommitProgress {
        &self.progress
    }

    /// Fail with `InvalidState` unless the transaction is in `expected`
    pub(crate) fn require(&self, expected: TxState, phase: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessiondError::invalid_state(format!(
                "{} {} called in state '{}', expected '{}'",
                self.kind, phase, self.state, expected
            )))
        }
    }

    fn transition(&mut self, next: TxState) {
        self.state = next;
        self.span.record("state", next.as_str());
    }

    pub(crate) fn mark_validated(&mut self) {
        self.transition(TxState::Validated);
    }

    /// Fix the snapshot and move to `Prepared`, applying the empty-snapshot policy
    pub(crate) fn prepare(
        &mut self,
        user_id: UserId,
        session_ids: Vec<SessionId>,
    ) -> Result<RevocationSnapshot> {
        if session_ids.is_empty() && self.policy == EmptySnapshotPolicy::NotFound {
            return Err(SessiondError::not_found("active sessions for user", user_id.as_str()));
        }

        let snapshot = RevocationSnapshot::new(user_id, session_ids);
        self.span.in_scope(|| {
            debug!(snapshot_size = snapshot.len(), "snapshot captured");
        });
        self.snapshot = Some(snapshot.clone());
        self.transition(TxState::Prepared);
        Ok(snapshot)
    }

    /// Revoke every snapshot ID not yet processed.
    ///
    /// A failure leaves the transaction in `Prepared` with progress kept, so
    /// calling again resumes at the first unprocessed ID.
    pub(crate) async fn commit(&mut self) -> Result<()> {
        match self.state {
            TxState::Committed => return Ok(()),
            TxState::Prepared => {}
            _ => {
                return Err(SessiondError::invalid_state(format!(
                    "{} commit called in state '{}', expected '{}'",
                    self.kind,
                    self.state,
                    TxState::Prepared
                )))
            }
        }

        let span = self.span.clone();
        let pending: Vec<SessionId> = self
            .snapshot
            .as_ref()
            .map(|s| s.session_ids[self.progress.processed()..].to_vec())
            .unwrap_or_default();

        for id in pending {
            let deleted = self
                .store
                .delete_session(&id)
                .instrument(crate::store_span!("delete_session", session_id = %id))
                .await;

            match deleted {
                Ok(true) => self.progress.revoked.push(id),
                Ok(false) => {
                    span.in_scope(|| debug!(session_id = %id, "session already absent"));
                    self.progress.already_absent.push(id);
                }
                Err(err) => {
                    span.in_scope(|| {
                        warn!(
                            session_id = %id,
                            processed = self.progress.processed(),
                            error = %err,
                            "commit interrupted; progress kept for retry"
                        )
                    });
                    return Err(err);
                }
            }
        }

        self.transition(TxState::Committed);
        span.in_scope(|| {
            info!(
                revoked = self.progress.revoked.len(),
                already_absent = self.progress.already_absent.len(),
                "sessions revoked"
            )
        });
        Ok(())
    }

    pub(crate) fn rollback(&mut self) -> RollbackOutcome {
        let span = self.span.clone();
        let _entered = span.enter();
        match self.state {
            TxState::Created | TxState::Validated => {
                self.transition(TxState::RolledBack);
                debug!("rolled back before any effect was prepared");
                RollbackOutcome::NothingToDiscard
            }
            TxState::Prepared if self.progress.revoked.is_empty() => {
                self.transition(TxState::RolledBack);
                debug!("prepared snapshot discarded");
                RollbackOutcome::Discarded
            }
            TxState::Prepared => {
                self.transition(TxState::RolledBack);
                warn!(
                    still_revoked = self.progress.revoked.len(),
                    "rollback after partial commit; revoked sessions cannot be restored"
                );
                RollbackOutcome::Partial { still_revoked: self.progress.revoked.clone() }
            }
            TxState::Committed => {
                warn!(
                    still_revoked = self.progress.revoked.len(),
                    "rollback requested after commit; revoked sessions cannot be restored"
                );
                RollbackOutcome::Partial { still_revoked: self.progress.revoked.clone() }
            }
            TxState::RolledBack => RollbackOutcome::NothingToDiscard,
        }
    }
}
