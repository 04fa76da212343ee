//! Request-scoped authentication data handed to transactions by the upstream layer.

use std::collections::HashSet;

use crate::domain::UserId;

/// Scope that lets a caller revoke sessions owned by other users.
pub const SESSIONS_REVOKE_SCOPE: &str = "sessions:revoke";

/// Request-scoped authentication context, already verified upstream.
///
/// Transactions trust `subject` without re-verifying identity.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: UserId,
    scopes: HashSet<String>,
}

impl AuthContext {
    pub fn new(subject: UserId, scopes: Vec<String>) -> Self {
        Self { subject, scopes: scopes.into_iter().collect() }
    }

    /// Context for a user acting on their own sessions only
    pub fn for_user(subject: UserId) -> Self {
        Self::new(subject, Vec::new())
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &String> {
        self.scopes.iter()
    }

    /// Whether this caller may revoke sessions owned by `owner`
    pub fn can_revoke_sessions_of(&self, owner: &UserId) -> bool {
        &self.subject == owner || self.has_scope(SESSIONS_REVOKE_SCOPE)
    }
}
