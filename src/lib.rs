//! # sessiond
//!
//! Transactional session invalidation for a session service.
//!
//! A logout terminates every session of a user even while other requests keep
//! mutating the store (new logins, token refreshes, concurrent logouts). Each
//! operation is a four-phase transaction:
//!
//! ```text
//! precondition → postcondition (snapshot) → commit | rollback
//! ```
//!
//! The snapshot is fixed at postcondition time, so sessions created by a
//! concurrent login survive the commit. Deletes are idempotent per session,
//! which lets concurrent logouts for the same user converge without a lock.
//!
//! ## Core Components
//!
//! - **Session Store**: [`storage::SessionStore`], in memory or SQLite via SQLx
//! - **Transactions**: [`transaction::LogoutTransaction`] and
//!   [`transaction::RevokeSessionTransaction`]
//! - **Runner**: [`transaction::TransactionRunner`], commit retry and rollback
//! - **Service**: [`services::SessionService`], the entry point for callers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sessiond::{startup, AppConfig, AuthContext, Result, TxContext, UserId};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load(None)?;
//!     startup::init_observability(&config).await?;
//!     let service = startup::build_session_service(&config).await?;
//!
//!     let user = UserId::from_str_unchecked("u1");
//!     let report = service
//!         .logout(&AuthContext::for_user(user.clone()), &user, None, &TxContext::default())
//!         .await?;
//!     println!("revoked {} sessions", report.revoked);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod services;
pub mod startup;
pub mod storage;
pub mod transaction;

// Re-export commonly used types and traits
pub use auth::AuthContext;
pub use config::AppConfig;
pub use domain::{Session, SessionId, UserId};
pub use errors::{Error, Result, SessiondError};
pub use services::SessionService;
pub use storage::SessionStore;
pub use transaction::{
    RollbackOutcome, RunReport, SessionTransaction, Transaction, TransactionRunner, TxContext,
    TxState,
};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
