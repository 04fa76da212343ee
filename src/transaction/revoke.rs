//! Single-session revocation (sign out one device).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, field, Instrument};

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

#[derive(Debug)]
pub struct RevokeSessionTransaction {
    auth: AuthContext,
    session_id: SessionId,
    /// Learned in precondition
    owner: Option<UserId>,
    core: RevocationCore,
}

impl RevokeSessionTransaction {
    pub fn new(
        store: Arc<dyn SessionStore>,
        auth: AuthContext,
        session_id: SessionId,
        ctx: &TxContext,
    ) -> Self {
        let span = crate::tx_span!(
            ctx.span(),
            TransactionKind::RevokeSession,
            session_id = %session_id,
            requested_by = %auth.subject,
            correlation_id = %ctx.correlation_id(),
            user_id = field::Empty
        );

        Self {
            auth,
            session_id,
            owner: None,
            core: RevocationCore::new(
                TransactionKind::RevokeSession,
                store,
                span,
                EmptySnapshotPolicy::default(),
            ),
        }
    }

    pub fn with_empty_snapshot_policy(mut self, policy: EmptySnapshotPolicy) -> Self {
        self.core.set_policy(policy);
        self
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    pub fn snapshot(&self) -> Option<&RevocationSnapshot> {
        self.core.snapshot()
    }

    pub fn progress(&self) -> &CommitProgress {
        self.core.progress()
    }

    async fn load_owner(&self) -> Result<UserId> {
        let session = self.core.store().get_session(&self.session_id).await?.ok_or_else(|| {
            SessiondError::invalid_state(format!("session '{}' does not exist", self.session_id))
        })?;

        if !self.auth.can_revoke_sessions_of(&session.user_id) {
            return Err(SessiondError::permission_denied(format!(
                "'{}' may not revoke session '{}'",
                self.auth.subject, self.session_id
            )));
        }

        if !session.is_active() {
            return Err(SessiondError::invalid_state(format!(
                "session '{}' is already revoked",
                self.session_id
            )));
        }

        debug!(user_id = %session.user_id, "revoke precondition satisfied");
        Ok(session.user_id)
    }
}

#[async_trait]
impl Transaction for RevokeSessionTransaction {
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
        let owner = self.load_owner().instrument(span).await?;

        self.core.span().record("user_id", field::display(&owner));
        self.owner = Some(owner);
        self.core.mark_validated();
        Ok(())
    }

    async fn postcondition(&mut self, ctx: &TxContext) -> Result<RevocationSnapshot> {
        self.core.require(TxState::Validated, "postcondition")?;
        let owner = self
            .owner
            .clone()
            .ok_or_else(|| SessiondError::internal("validated revoke without an owner"))?;

        let span = self.core.span().clone();
        let current = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(SessiondError::cancelled("postcondition")),
            current = self.core.store().get_session(&self.session_id).instrument(span) => current,
        };

        let session_ids = match current? {
            Some(session) if session.is_active() => vec![self.session_id.clone()],
            _ => Vec::new(),
        };
        self.core.prepare(owner, session_ids)
    }

    async fn commit(&mut self) -> Result<()> {
        self.core.commit().await
    }

    fn rollback(&mut self) -> RollbackOutcome {
        self.core.rollback()
    }
}

impl RevocationTransaction for RevokeSessionTransaction {
    fn progress(&self) -> &CommitProgress {
        self.core.progress()
    }
}
