//! # Configuration Management
//!
//! Layered configuration for sessiond: built-in defaults, an optional file,
//! and `SESSIOND__*` environment variables.

pub mod settings;

pub use settings::{
    AppConfig, DatabaseConfig, EmptySnapshotPolicy, ObservabilityConfig, StorageBackend,
    StorageConfig, TransactionConfig, ENV_PREFIX,
};
