//! # Error Handling
//!
//! Error types shared by the session store, the transactions, and the ambient
//! configuration and observability layers.

pub mod types;

pub use types::{Result, SessiondError};

/// Short alias used throughout the crate
pub type Error = SessiondError;
