//! # Structured Logging
//!
//! Span macros and startup logging built on the tracing ecosystem.
//!
//! Transactions never log through a process-wide handle of their own; they
//! receive a parent span from their `TxContext` and open their own span under
//! it with [`tx_span!`].

/// Create a tracing span for one session transaction.
///
/// ```rust,ignore
/// let span = tx_span!(
///     ctx.span(),
///     "logout",
///     user_id = %user,
///     correlation_id = %ctx.correlation_id()
/// );
/// ```
#[macro_export]
macro_rules! tx_span {
    ($parent:expr, $kind:expr) => {
        tracing::info_span!(
            parent: $parent,
            "session_tx",
            kind = %$kind,
            state = tracing::field::Empty
        )
    };
    ($parent:expr, $kind:expr, $($field:tt)*) => {
        tracing::info_span!(
            parent: $parent,
            "session_tx",
            kind = %$kind,
            state = tracing::field::Empty,
            $($field)*
        )
    };
}

/// Create a tracing span for session store operations.
#[macro_export]
macro_rules! store_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "store_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "store_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        storage_backend = ?config.storage.backend,
        empty_snapshot_policy = ?config.transaction.empty_snapshot_policy,
        commit_max_attempts = config.transaction.commit_max_attempts,
        commit_retry_backoff_ms = config.transaction.commit_retry_backoff_ms,
        metrics_enabled = %config.observability.enable_metrics,
        "sessiond configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let root = tracing::Span::none();
        let _span = tx_span!(&root, "logout");
        let _span = tx_span!(&root, "logout", user_id = "u1");
        let _span = store_span!("list_sessions");
        let _span = store_span!("delete_session", session_id = "s1");
    }

    #[test]
    fn test_log_config_info() {
        let config = crate::config::AppConfig::default();

        // This should not panic
        log_config_info(&config);
    }
}
