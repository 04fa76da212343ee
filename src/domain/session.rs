//! Session records as held by a session store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SessionId, UserId};

/// One authenticated device/client binding.
///
/// A revoked session never becomes active again; a returning user gets a new
/// record with a new ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Build an active session record for `user_id`, stamped now
    pub fn new(id: SessionId, user_id: UserId) -> Self {
        let now = Utc::now();
        Self { id, user_id, created_at: now, last_active_at: now, revoked: false, revoked_at: None }
    }

    pub fn is_active(&self) -> bool {
        !self.revoked
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    /// Mark the record revoked. Returns `false` if it already was.
    pub fn revoke(&mut self, when: DateTime<Utc>) -> bool {
        if self.revoked {
            return false;
        }
        self.revoked = true;
        self.revoked_at = Some(when);
        true
    }
}
