//! Authentication context consumed by session transactions.
//!
//! Authentication itself happens upstream; this module only carries the
//! verified subject and its scopes.

pub mod models;

pub use models::{AuthContext, SESSIONS_REVOKE_SCOPE};
