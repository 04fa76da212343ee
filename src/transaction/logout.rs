//! Logout: revoke every active session of one user.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, field, warn, Instrument};

use super::snapshot::RevocationCore;
use super::{
    CommitProgress, RevocationSnapshot, RevocationTransaction, RollbackOutcome, Transaction,
    TransactionKind, TxContext, TxState,
};
use crate::auth::AuthContext;
use crate::config::EmptySnapshotPolicy;
use crate::domain::{SessionId, UserId};
use crate::errors::{Result, SessiondError};
use crate::storage::SessionStore;

/// Invalidates all sessions belonging to `target_user`.
///
/// Sessions created after `postcondition` took its snapshot are left alone.
#[derive(Debug)]
pub struct LogoutTransaction {
    auth: AuthContext,
    target_user: UserId,
    origin_session: Option<SessionId>,
    core: RevocationCore,
}

impl LogoutTransaction {
    pub fn new(
        store: Arc<dyn SessionStore>,
        auth: AuthContext,
        target_user: UserId,
        ctx: &TxContext,
    ) -> Self {
        let span = crate::tx_span!(
            ctx.span(),
            TransactionKind::Logout,
            user_id = %target_user,
            requested_by = %auth.subject,
            correlation_id = %ctx.correlation_id(),
            origin_session = field::Empty
        );

        Self {
            auth,
            target_user,
            origin_session: None,
            core: RevocationCore::new(
                TransactionKind::Logout,
                store,
                span,
                EmptySnapshotPolicy::default(),
            ),
        }
    }

    /// The session the logout request arrived on; it must be active and owned
    /// by the target user for the precondition to pass
    pub fn with_origin_session(mut self, session_id: SessionId) -> Self {
        self.core.span().record("origin_session", field::display(&session_id));
        self.origin_session = Some(session_id);
        self
    }

    pub fn with_empty_snapshot_policy(mut self, policy: EmptySnapshotPolicy) -> Self {
        self.core.set_policy(policy);
        self
    }

    pub fn target_user(&self) -> &UserId {
        &self.target_user
    }

    pub fn snapshot(&self) -> Option<&RevocationSnapshot> {
        self.core.snapshot()
    }

    pub fn progress(&self) -> &CommitProgress {
        self.core.progress()
    }

    async fn check_origin_session(&self, origin: &SessionId) -> Result<()> {
        match self.core.store().get_session(origin).await? {
            None => Err(SessiondError::invalid_state(format!(
                "origin session '{}' does not exist",
                origin
            ))),
            Some(session) if !session.is_owned_by(&self.target_user) => {
                Err(SessiondError::invalid_state(format!(
                    "origin session '{}' does not belong to user '{}'",
                    origin, self.target_user
                )))
            }
            Some(session) if !session.is_active() => Err(SessiondError::invalid_state(format!(
                "origin session '{}' is already revoked",
                origin
            ))),
            Some(_) => Ok(()),
        }
    }

    async fn check_precondition(&self) -> Result<()> {
        if !self.auth.can_revoke_sessions_of(&self.target_user) {
            warn!(requested_by = %self.auth.subject, "logout denied");
            return Err(SessiondError::permission_denied(format!(
                "'{}' may not revoke sessions of '{}'",
                self.auth.subject, self.target_user
            )));
        }

        if let Some(origin) = &self.origin_session {
            self.check_origin_session(origin).await?;
        }

        let active = self.core.store().list_sessions(&self.target_user).await?;
        if active.is_empty() {
            return Err(SessiondError::invalid_state(format!(
                "user '{}' has no active sessions",
                self.target_user
            )));
        }

        debug!(active_sessions = active.len(), "logout precondition satisfied");
        Ok(())
    }
}

#[async_trait]
impl Transaction for LogoutTransaction {
    type Effect = RevocationSnapshot;

    fn kind(&self) -> TransactionKind {
        self.core.kind()
    }

    fn state(&self) -> TxState {
        self.core.state()
    }

    async fn precondition(&mut self) -> Result<()> {
        self.core.require(TxState::Created, "precondition")?;

        let span = self.core.span().clone();
        self.check_precondition().instrument(span).await?;

        self.core.mark_validated();
        Ok(())
    }

    async fn postcondition(&mut self, ctx: &TxContext) -> Result<RevocationSnapshot> {
        self.core.require(TxState::Validated, "postcondition")?;

        let span = self.core.span().clone();
        let listed = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(SessiondError::cancelled("postcondition")),
            listed = self.core.store().list_sessions(&self.target_user).instrument(span) => listed,
        };

        self.core.prepare(self.target_user.clone(), listed?)
    }

    async fn commit(&mut self) -> Result<()> {
        self.core.commit().await
    }

    fn rollback(&mut self) -> RollbackOutcome {
        self.core.rollback()
    }
}

impl RevocationTransaction for LogoutTransaction {
    fn progress(&self) -> &CommitProgress {
        self.core.progress()
    }
}
