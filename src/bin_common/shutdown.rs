//! Graceful shutdown management

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;

/// Shutdown flag flipped by Ctrl+C or by [`ShutdownManager::trigger`]
pub struct ShutdownManager {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(true)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Spawn a Ctrl+C signal handler that triggers shutdown
    pub fn spawn_signal_handler(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal (Ctrl+C)");
                this.trigger();
            }
        });
    }

    pub fn trigger(&self) {
        if self.flag.swap(false, Ordering::AcqRel) {
            info!("Shutting down gracefully...");
        }
        self.notify.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Resolve once shutdown has been triggered
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for a duration, but wake early if shutdown is triggered
    pub async fn interruptible_sleep(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.wait() => {}
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_trigger_wakes_waiters() {
        let shutdown = Arc::new(ShutdownManager::new());
        assert!(shutdown.is_running());

        let waiter = {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move { shutdown.wait().await })
        };
        tokio::task::yield_now().await;

        shutdown.trigger();
        waiter.await.unwrap();
        assert!(!shutdown.is_running());

        // Already triggered: returns at once
        shutdown.interruptible_sleep(Duration::from_secs(3600)).await;
    }
}
