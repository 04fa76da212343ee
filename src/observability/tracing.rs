//! # Tracing Subscriber Setup
//!
//! Installs the global `tracing-subscriber` formatter with an `EnvFilter`,
//! optionally emitting JSON.

use tracing_subscriber::EnvFilter;

use crate::config::ObservabilityConfig;
use crate::errors::{Result, SessiondError};

/// Build the filter from `RUST_LOG` when set, otherwise from the configured level
fn build_filter(config: &ObservabilityConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            SessiondError::config(format!("Invalid log level '{}': {}", config.log_level, e))
        }),
    }
}

/// Initialize the global tracing subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed (e.g. by a test
/// harness); that is not an error.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<bool> {
    let filter = build_filter(config)?;

    let installed = if config.json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
    };

    if installed {
        tracing::info!(
            service_name = %config.service_name,
            log_level = %config.log_level,
            json_logging = config.json_logging,
            "Tracing initialized"
        );
    }

    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_log_level() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config =
            ObservabilityConfig { log_level: "sessiond=verbose".to_string(), ..Default::default() };
        assert!(build_filter(&config).is_err());
    }
}
