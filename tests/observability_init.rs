//! Integration tests for observability setup
//!
//! These install the global tracing subscriber, so they live in their own
//! test binary.

use sessiond::config::{AppConfig, ObservabilityConfig};
use sessiond::observability::{init_observability, init_tracing};

#[test]
fn test_init_tracing_twice_is_harmless() {
    let config = ObservabilityConfig::default();
    let first = init_tracing(&config);
    let second = init_tracing(&config).unwrap();
    assert!(first.is_ok());
    assert!(!second);
}

#[tokio::test]
async fn test_init_observability() {
    let config = ObservabilityConfig { enable_metrics: false, ..Default::default() };

    let result = init_observability(&config).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_startup_init_observability() {
    let mut config = AppConfig::default();
    config.observability.enable_metrics = false;

    assert!(sessiond::startup::init_observability(&config).await.is_ok());
}
