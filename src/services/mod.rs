//! Business logic services
//!
//! Service layer components that turn authenticated requests into session
//! transactions, separated from any transport concerns.

pub mod session_service;

pub use session_service::SessionService;
