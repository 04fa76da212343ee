//! # Transaction Runner
//!
//! Drives a transaction through precondition, postcondition, then commit or
//! rollback. Retryable commit failures are retried on the same instance so
//! per-ID progress is kept; every other failure ends in a rollback.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use super::{
    RevocationSnapshot, RevocationTransaction, RollbackOutcome, TransactionKind, TxContext,
};
use crate::config::TransactionConfig;
use crate::domain::UserId;
use crate::errors::{Result, SessiondError};
use crate::observability::metrics;

/// Commit retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    pub commit_max_attempts: u32,
    pub commit_retry_backoff: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from(&TransactionConfig::default())
    }
}

impl From<&TransactionConfig> for RunnerConfig {
    fn from(config: &TransactionConfig) -> Self {
        Self {
            commit_max_attempts: config.commit_max_attempts.max(1),
            commit_retry_backoff: config.commit_retry_backoff(),
        }
    }
}

/// Summary of a committed transaction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub kind: TransactionKind,
    pub correlation_id: Uuid,
    pub user_id: UserId,
    pub snapshot: RevocationSnapshot,
    /// Sessions revoked by this transaction
    pub revoked: usize,
    /// Snapshot sessions another request revoked first
    pub already_absent: usize,
    pub commit_attempts: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionRunner {
    config: RunnerConfig,
}

impl TransactionRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &TransactionConfig) -> Self {
        Self::new(RunnerConfig::from(config))
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run `tx` to completion.
    ///
    /// On success the transaction is `Committed`. On any error it has been
    /// rolled back, so it is never left `Prepared`.
    pub async fn run<T>(&self, tx: &mut T, ctx: &TxContext) -> Result<RunReport>
    where
        T: RevocationTransaction,
    {
        let kind = tx.kind();
        let started = Instant::now();

        let result = self.drive(tx, ctx).instrument(ctx.span().clone()).await;

        metrics::record_transaction_duration(
            kind.as_str(),
            started.elapsed().as_secs_f64(),
            result.is_ok(),
        )
        .await;
        result
    }

    async fn drive<T>(&self, tx: &mut T, ctx: &TxContext) -> Result<RunReport>
    where
        T: RevocationTransaction,
    {
        let kind = tx.kind();

        if let Err(err) = tx.precondition().await {
            metrics::record_phase(kind.as_str(), "precondition", err.code()).await;
            info!(%kind, error = %err, "precondition failed");
            abort(tx).await;
            return Err(err);
        }
        metrics::record_phase(kind.as_str(), "precondition", "ok").await;

        let snapshot = match tx.postcondition(ctx).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                metrics::record_phase(kind.as_str(), "postcondition", err.code()).await;
                info!(%kind, error = %err, "postcondition failed");
                abort(tx).await;
                return Err(err);
            }
        };
        metrics::record_phase(kind.as_str(), "postcondition", "ok").await;

        if ctx.is_cancelled() {
            metrics::record_phase(kind.as_str(), "commit", "cancelled").await;
            abort(tx).await;
            return Err(SessiondError::cancelled("commit"));
        }

        let commit_attempts = self.commit_with_retry(tx, ctx).await?;
        metrics::record_phase(kind.as_str(), "commit", "ok").await;

        let progress = tx.progress();
        let report = RunReport {
            kind,
            correlation_id: ctx.correlation_id(),
            user_id: snapshot.user_id().clone(),
            revoked: progress.revoked().len(),
            already_absent: progress.already_absent().len(),
            snapshot,
            commit_attempts,
        };
        metrics::record_sessions_revoked(kind.as_str(), report.revoked, report.already_absent)
            .await;

        info!(
            %kind,
            user_id = %report.user_id,
            revoked = report.revoked,
            already_absent = report.already_absent,
            commit_attempts,
            "transaction committed"
        );
        Ok(report)
    }

    /// Commit, retrying retryable failures with exponential backoff.
    /// Returns the number of attempts made.
    async fn commit_with_retry<T>(&self, tx: &mut T, ctx: &TxContext) -> Result<u32>
    where
        T: RevocationTransaction,
    {
        let kind = tx.kind();
        let mut backoff = self.config.commit_retry_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match tx.commit().await {
                Ok(()) => return Ok(attempt),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.config.commit_max_attempts {
                metrics::record_phase(kind.as_str(), "commit", err.code()).await;
                error!(%kind, attempt, error = %err, "commit failed; rolling back");
                abort(tx).await;
                return Err(err);
            }

            warn!(
                %kind,
                attempt,
                processed = tx.progress().processed(),
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "commit failed; retrying"
            );
            metrics::record_commit_retry(kind.as_str()).await;

            tokio::select! {
                _ = ctx.cancelled() => {
                    metrics::record_phase(kind.as_str(), "commit", "cancelled").await;
                    abort(tx).await;
                    return Err(SessiondError::cancelled("commit"));
                }
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = backoff.saturating_mul(2);
        }
    }
}

async fn abort<T>(tx: &mut T) -> RollbackOutcome
where
    T: RevocationTransaction,
{
    let outcome = tx.rollback();
    metrics::record_rollback(tx.kind().as_str(), outcome.as_str()).await;
    if let RollbackOutcome::Partial { still_revoked } = &outcome {
        warn!(kind = %tx.kind(), still_revoked = still_revoked.len(), "rollback was partial");
    }
    outcome
}
