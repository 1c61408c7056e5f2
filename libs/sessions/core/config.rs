use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of a new session
    pub auto_delete_hours: u64,
    /// Expiry check cadence for the active session
    pub tick_interval_ms: u64,
    /// Purge cadence for other expired records
    pub sweep_interval_secs: u64,
    /// JSON file holding the session list; in-memory when unset
    pub storage_path: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_delete_hours: 24,
            tick_interval_ms: 1_000,
            sweep_interval_secs: 60,
            storage_path: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.auto_delete_hours == 0 {
            return Err(SessionError::Configuration(
                "auto_delete_hours must be greater than 0".into(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(SessionError::Configuration(
                "tick_interval_ms must be greater than 0".into(),
            ));
        }
        if self.sweep_interval().as_millis() < u128::from(self.tick_interval_ms) {
            return Err(SessionError::Configuration(
                "sweep_interval_secs must not be shorter than the tick interval".into(),
            ));
        }
        Ok(())
    }

    pub fn lifetime_ms(&self) -> i64 {
        (self.auto_delete_hours as i64).saturating_mul(3_600_000)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
