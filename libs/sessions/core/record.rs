use pulsesocket::SessionUpdate;
use serde::{Deserialize, Serialize};

/// One locally tracked session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    /// Creation time, ms since epoch
    pub start_time: i64,
    pub is_active: bool,
    /// Absolute expiry, ms since epoch
    pub auto_delete_at: i64,
    #[serde(default)]
    pub generated_music_count: u32,
}

impl SessionRecord {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.auto_delete_at <= now_ms
    }

    pub fn time_until_expiry(&self, now_ms: i64) -> i64 {
        (self.auto_delete_at - now_ms).max(0)
    }

    /// Apply the fields set in `patch`
    pub fn merge(&mut self, patch: &SessionPatch) {
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        if let Some(count) = patch.generated_music_count {
            self.generated_music_count = count;
        }
        if let Some(at) = patch.auto_delete_at {
            self.auto_delete_at = at;
        }
    }

    /// Wire form announced to the server
    pub fn to_update(&self) -> SessionUpdate {
        SessionUpdate {
            is_active: Some(self.is_active),
            generated_music_count: Some(self.generated_music_count),
            auto_delete_at: Some(self.auto_delete_at),
        }
    }
}

/// Partial update for [`SessionManager::update_session`](crate::SessionManager::update_session)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPatch {
    pub is_active: Option<bool>,
    pub generated_music_count: Option<u32>,
    pub auto_delete_at: Option<i64>,
}
