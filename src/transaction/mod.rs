//! # Session Transactions
//!
//! Four-phase units of work over the session store:
//!
//! 1. `precondition` checks the operation is legal, read-only
//! 2. `postcondition` captures the effect (a [`RevocationSnapshot`]) without applying it
//! 3. `commit` makes the effect durable, idempotently
//! 4. `rollback` discards an uncommitted effect and reports what could not be undone
//!
//! Every transaction moves strictly forward through [`TxState`]. Out-of-order
//! calls fail with `InvalidState` before touching the store.
//!
//! Operation types are variants of [`SessionTransaction`], which the
//! [`TransactionRunner`] drives through the [`Transaction`] trait.

pub mod logout;
pub mod revoke;
pub mod runner;
pub mod snapshot;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Span;
use uuid::Uuid;

use crate::domain::SessionId;
use crate::errors::{Result, SessiondError};

pub use logout::LogoutTransaction;
pub use revoke::RevokeSessionTransaction;
pub use runner::{RunReport, RunnerConfig, TransactionRunner};
pub use snapshot::{CommitProgress, RevocationSnapshot};

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    Created,
    Validated,
    Prepared,
    Committed,
    RolledBack,
}

impl TxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxState::Created => "created",
            TxState::Validated => "validated",
            TxState::Prepared => "prepared",
            TxState::Committed => "committed",
            TxState::RolledBack => "rolled_back",
        }
    }

    /// Committed or rolled back
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Committed | TxState::RolledBack)
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation type, used as the `kind` label on spans and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Logout,
    RevokeSession,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Logout => "logout",
            TransactionKind::RevokeSession => "revoke_session",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request context handed to transactions at construction and to the runner.
///
/// Carries the correlation ID, the request's cancellation token, and the parent
/// span under which transactions open their own spans.
#[derive(Debug, Clone)]
pub struct TxContext {
    correlation_id: Uuid,
    cancellation: CancellationToken,
    span: Span,
}

impl TxContext {
    pub fn new(span: Span) -> Self {
        Self { correlation_id: Uuid::new_v4(), cancellation: CancellationToken::new(), span }
    }

    /// Context whose spans are not attached to any parent
    pub fn detached() -> Self {
        Self::new(Span::none())
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the request is cancelled
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }
}

impl Default for TxContext {
    fn default() -> Self {
        Self::new(Span::current())
    }
}

/// What a rollback managed to discard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RollbackOutcome {
    /// No effect had been prepared
    NothingToDiscard,
    /// The prepared effect was dropped without any store write
    Discarded,
    /// Some sessions were already revoked and stay revoked
    Partial { still_revoked: Vec<SessionId> },
}

impl RollbackOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollbackOutcome::NothingToDiscard => "nothing_to_discard",
            RollbackOutcome::Discarded => "discarded",
            RollbackOutcome::Partial { .. } => "partial",
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, RollbackOutcome::Partial { .. })
    }

    /// `PartialRollback` error for callers that surface the limitation as an error
    pub fn as_error(&self) -> Option<SessiondError> {
        match self {
            RollbackOutcome::Partial { still_revoked } => {
                Some(SessiondError::partial_rollback(still_revoked.len()))
            }
            _ => None,
        }
    }
}

/// The four-phase transaction contract
#[async_trait]
pub trait Transaction: Send {
    /// Effect descriptor computed by `postcondition`
    type Effect: Send;

    fn kind(&self) -> TransactionKind;

    fn state(&self) -> TxState;

    /// Read-only legality check. Moves `Created` to `Validated`.
    async fn precondition(&mut self) -> Result<()>;

    /// Compute the effect without applying it. Moves `Validated` to `Prepared`.
    async fn postcondition(&mut self, ctx: &TxContext) -> Result<Self::Effect>;

    /// Apply the prepared effect. Idempotent once `Committed`.
    async fn commit(&mut self) -> Result<()>;

    /// Discard the effect. Never fails and never touches the store.
    fn rollback(&mut self) -> RollbackOutcome;
}

/// Transactions whose effect is a set of session revocations
pub trait RevocationTransaction: Transaction<Effect = RevocationSnapshot> {
    /// Per-ID commit progress so far
    fn progress(&self) -> &CommitProgress;
}

/// Every session transaction the service can run
#[derive(Debug)]
pub enum SessionTransaction {
    Logout(LogoutTransaction),
    RevokeSession(RevokeSessionTransaction),
}

impl From<LogoutTransaction> for SessionTransaction {
    fn from(tx: LogoutTransaction) -> Self {
        SessionTransaction::Logout(tx)
    }
}

impl From<RevokeSessionTransaction> for SessionTransaction {
    fn from(tx: RevokeSessionTransaction) -> Self {
        SessionTransaction::RevokeSession(tx)
    }
}

#[async_trait]
impl Transaction for SessionTransaction {
    type Effect = RevocationSnapshot;

    fn kind(&self) -> TransactionKind {
        match self {
            SessionTransaction::Logout(tx) => tx.kind(),
            SessionTransaction::RevokeSession(tx) => tx.kind(),
        }
    }

    fn state(&self) -> TxState {
        match self {
            SessionTransaction::Logout(tx) => tx.state(),
            SessionTransaction::RevokeSession(tx) => tx.state(),
        }
    }

    async fn precondition(&mut self) -> Result<()> {
        match self {
            SessionTransaction::Logout(tx) => tx.precondition().await,
            SessionTransaction::RevokeSession(tx) => tx.precondition().await,
        }
    }

    async fn postcondition(&mut self, ctx: &TxContext) -> Result<RevocationSnapshot> {
        match self {
            SessionTransaction::Logout(tx) => tx.postcondition(ctx).await,
            SessionTransaction::RevokeSession(tx) => tx.postcondition(ctx).await,
        }
    }

    async fn commit(&mut self) -> Result<()> {
        match self {
            SessionTransaction::Logout(tx) => tx.commit().await,
            SessionTransaction::RevokeSession(tx) => tx.commit().await,
        }
    }

    fn rollback(&mut self) -> RollbackOutcome {
        match self {
            SessionTransaction::Logout(tx) => tx.rollback(),
            SessionTransaction::RevokeSession(tx) => tx.rollback(),
        }
    }
}

impl RevocationTransaction for SessionTransaction {
    fn progress(&self) -> &CommitProgress {
        match self {
            SessionTransaction::Logout(tx) => tx.progress(),
            SessionTransaction::RevokeSession(tx) => tx.progress(),
        }
    }
}
