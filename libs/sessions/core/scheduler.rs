//! Session scheduler
//!
//! One periodic task drives the whole lifecycle: every tick checks the active
//! session for expiry, every `sweep_interval / tick_interval` ticks the other
//! expired records are purged.

use crate::core::manager::SessionManager;
use pulsesocket::spawn_ticker;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Start the scheduler; it stops once the manager is dropped
pub fn spawn_scheduler(manager: &Arc<SessionManager>) -> JoinHandle<()> {
    let config = manager.config();
    let tick_ms = config.tick_interval_ms.max(1);
    let sweep_every = (config.sweep_interval().as_millis() as u64 / tick_ms).max(1);
    let weak = Arc::downgrade(manager);
    let mut ticks: u64 = 0;

    spawn_ticker("Session scheduler", config.tick_interval(), move || {
        let Some(manager) = weak.upgrade() else {
            return false;
        };

        manager.tick();
        ticks += 1;
        if ticks % sweep_every == 0 {
            manager.sweep();
        }
        true
    })
}

impl SessionManager {
    /// See [`spawn_scheduler`]
    pub fn spawn_scheduler(self: &Arc<Self>) -> JoinHandle<()> {
        spawn_scheduler(self)
    }
}
