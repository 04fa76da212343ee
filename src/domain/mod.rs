//! Domain layer
//!
//! Pure session-service entities with no transport dependencies.
//!
//! ## Module Organization
//!
//! - `id`: Type-safe identifiers with the NewType pattern
//! - `session`: Session records and their one-way revocation

pub mod id;
pub mod session;

pub use id::{SessionId, UserId};
pub use session::Session;
