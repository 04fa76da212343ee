//! Session invalidation service.
//!
//! Builds the transaction for each request from the caller's auth context and
//! hands it to the runner.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::auth::AuthContext;
use crate::config::{EmptySnapshotPolicy, TransactionConfig};
use crate::domain::{SessionId, UserId};
use crate::errors::Result;
use crate::storage::SessionStore;
use crate::transaction::{
    LogoutTransaction, RevokeSessionTransaction, RunReport, SessionTransaction,
    TransactionRunner, TxContext,
};

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    runner: TransactionRunner,
    empty_snapshot_policy: EmptySnapshotPolicy,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        runner: TransactionRunner,
        empty_snapshot_policy: EmptySnapshotPolicy,
    ) -> Self {
        Self { store, runner, empty_snapshot_policy }
    }

    pub fn from_config(store: Arc<dyn SessionStore>, config: &TransactionConfig) -> Self {
        Self::new(store, TransactionRunner::from_config(config), config.empty_snapshot_policy)
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn runner(&self) -> &TransactionRunner {
        &self.runner
    }

    /// Revoke every active session of `target_user`.
    ///
    /// `origin_session` is the session the request arrived on, when there is
    /// one; it must be active and belong to `target_user`.
    #[instrument(
        skip(self, auth, ctx),
        fields(requested_by = %auth.subject, correlation_id = %ctx.correlation_id())
    )]
    pub async fn logout(
        &self,
        auth: &AuthContext,
        target_user: &UserId,
        origin_session: Option<SessionId>,
        ctx: &TxContext,
    ) -> Result<RunReport> {
        let mut logout =
            LogoutTransaction::new(self.store.clone(), auth.clone(), target_user.clone(), ctx)
                .with_empty_snapshot_policy(self.empty_snapshot_policy);
        if let Some(origin) = origin_session {
            logout = logout.with_origin_session(origin);
        }

        let mut tx = SessionTransaction::from(logout);
        let report = self.runner.run(&mut tx, ctx).await?;

        info!(
            user_id = %report.user_id,
            revoked = report.revoked,
            already_absent = report.already_absent,
            "User logged out"
        );
        Ok(report)
    }

    /// Revoke a single session (sign out one device)
    #[instrument(
        skip(self, auth, ctx),
        fields(requested_by = %auth.subject, correlation_id = %ctx.correlation_id())
    )]
    pub async fn revoke_session(
        &self,
        auth: &AuthContext,
        session_id: &SessionId,
        ctx: &TxContext,
    ) -> Result<RunReport> {
        let revoke =
            RevokeSessionTransaction::new(self.store.clone(), auth.clone(), session_id.clone(), ctx)
                .with_empty_snapshot_policy(self.empty_snapshot_policy);

        let mut tx = SessionTransaction::from(revoke);
        let report = self.runner.run(&mut tx, ctx).await?;

        info!(user_id = %report.user_id, revoked = report.revoked, "Session revoked");
        Ok(report)
    }

    /// Active sessions of `user`, oldest first
    pub async fn list_active_sessions(&self, user: &UserId) -> Result<Vec<SessionId>> {
        self.store.list_sessions(user).await
    }
}
