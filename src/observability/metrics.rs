//! # Metrics Collection
//!
//! Prometheus metrics for session transactions.

use crate::config::ObservabilityConfig;
use crate::errors::{Result, SessiondError};
use ::tracing::{info, warn};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Metrics recorder that tracks session transaction metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record the outcome of one transaction phase (`ok` or an error code)
    pub fn record_phase(&self, kind: &str, phase: &str, outcome: &str) {
        let labels = [
            ("kind", kind.to_string()),
            ("phase", phase.to_string()),
            ("outcome", outcome.to_string()),
        ];
        counter!("session_tx_phase_total", &labels).increment(1);
    }

    /// Record sessions revoked by a committed transaction
    pub fn record_sessions_revoked(&self, kind: &str, revoked: usize, already_absent: usize) {
        let labels = [("kind", kind.to_string())];
        counter!("session_tx_sessions_revoked_total", &labels).increment(revoked as u64);
        counter!("session_tx_sessions_already_absent_total", &labels)
            .increment(already_absent as u64);
    }

    /// Record a retried commit attempt
    pub fn record_commit_retry(&self, kind: &str) {
        let labels = [("kind", kind.to_string())];
        counter!("session_tx_commit_retries_total", &labels).increment(1);
    }

    /// Record a rollback and whether it was partial
    pub fn record_rollback(&self, kind: &str, outcome: &str) {
        let labels = [("kind", kind.to_string()), ("outcome", outcome.to_string())];
        counter!("session_tx_rollbacks_total", &labels).increment(1);
    }

    /// Record end-to-end transaction duration in seconds
    pub fn record_transaction_duration(&self, kind: &str, duration: f64, success: bool) {
        let status = if success { "success" } else { "error" };
        let labels = [("kind", kind.to_string()), ("status", status.to_string())];
        histogram!("session_tx_duration_seconds", &labels).record(duration);
    }

    /// Register descriptions for all session transaction metrics
    pub fn register_session_tx_metrics(&self) {
        describe_counter!(
            "session_tx_phase_total",
            Unit::Count,
            "Session transaction phases by kind, phase and outcome"
        );
        describe_counter!(
            "session_tx_sessions_revoked_total",
            Unit::Count,
            "Sessions revoked by committed transactions"
        );
        describe_counter!(
            "session_tx_sessions_already_absent_total",
            Unit::Count,
            "Snapshot sessions that were already gone at commit time"
        );
        describe_counter!(
            "session_tx_commit_retries_total",
            Unit::Count,
            "Commit attempts retried on the same transaction"
        );
        describe_counter!(
            "session_tx_rollbacks_total",
            Unit::Count,
            "Rollbacks by kind and outcome"
        );
        describe_histogram!(
            "session_tx_duration_seconds",
            Unit::Seconds,
            "End-to-end session transaction duration"
        );
    }
}

/// Global metrics recorder instance
static METRICS: once_cell::sync::Lazy<Arc<RwLock<Option<MetricsRecorder>>>> =
    once_cell::sync::Lazy::new(|| Arc::new(RwLock::new(None)));

/// Initialize metrics collection and Prometheus exporter
pub async fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.enable_metrics {
        return Ok(());
    }

    let metrics_addr = match config.metrics_bind_address() {
        Some(addr) => addr,
        None => {
            warn!("Metrics disabled: no bind address configured");
            return Ok(());
        }
    };

    let socket_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
        SessiondError::config(format!("Invalid metrics bind address '{}': {}", metrics_addr, e))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| {
            SessiondError::config(format!("Failed to initialize metrics exporter: {}", e))
        })?;

    let recorder = MetricsRecorder::new();
    {
        let mut metrics = METRICS.write().await;
        *metrics = Some(recorder.clone());
    }

    recorder.register_session_tx_metrics();

    info!(
        metrics_addr = %metrics_addr,
        service_name = %config.service_name,
        "Metrics collection initialized"
    );

    Ok(())
}

/// Get the global metrics recorder
pub async fn get_metrics() -> Option<MetricsRecorder> {
    METRICS.read().await.clone()
}

/// Record a phase outcome via the global recorder
pub async fn record_phase(kind: &str, phase: &str, outcome: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_phase(kind, phase, outcome);
    }
}

/// Record revoked sessions via the global recorder
pub async fn record_sessions_revoked(kind: &str, revoked: usize, already_absent: usize) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_sessions_revoked(kind, revoked, already_absent);
    }
}

/// Record a commit retry via the global recorder
pub async fn record_commit_retry(kind: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_commit_retry(kind);
    }
}

/// Record a rollback via the global recorder
pub async fn record_rollback(kind: &str, outcome: &str) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_rollback(kind, outcome);
    }
}

/// Record transaction duration via the global recorder
pub async fn record_transaction_duration(kind: &str, duration: f64, success: bool) {
    if let Some(metrics) = get_metrics().await {
        metrics.record_transaction_duration(kind, duration, success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_without_exporter_is_noop() {
        let recorder = MetricsRecorder::new();
        recorder.register_session_tx_metrics();
        recorder.record_phase("logout", "commit", "ok");
        recorder.record_sessions_revoked("logout", 2, 1);
        recorder.record_commit_retry("logout");
        recorder.record_rollback("logout", "discarded");
        recorder.record_transaction_duration("logout", 0.01, true);
    }

    #[tokio::test]
    async fn test_init_metrics_disabled() {
        let config = ObservabilityConfig { enable_metrics: false, ..Default::default() };
        assert!(init_metrics(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_init_metrics_no_port() {
        let config =
            ObservabilityConfig { enable_metrics: true, metrics_port: 0, ..Default::default() };
        assert!(init_metrics(&config).await.is_ok());
        assert!(get_metrics().await.is_none());
    }

    #[tokio::test]
    async fn test_global_helpers_without_recorder() {
        record_phase("logout", "precondition", "ok").await;
        record_rollback("logout", "partial").await;
    }
}
