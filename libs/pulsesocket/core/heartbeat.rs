//! Connection timers
//!
//! Each open connection owns up to two periodic tasks:
//!
//! ```text
//! ┌──────────────────┐
//! │  Heartbeat task  │  every heartbeat_interval_ms:
//! │                  │    pong overdue? ──> force unclean close
//! │                  │    else          ──> send ping (priority 10)
//! └──────────────────┘
//! ┌──────────────────┐
//! │  Flush task      │  every flush_interval_ms: flush the outbound queue
//! └──────────────────┘
//! ```
//!
//! The tasks keep no strong reference to the client. The client aborts them
//! on every close, so a task never outlives the connection that started it.

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Run `on_tick` every `interval` until it returns `false`
///
/// The first tick fires one full interval after spawning.
pub fn spawn_ticker<F>(name: &'static str, interval: Duration, mut on_tick: F) -> JoinHandle<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the first immediate tick - wait for the first interval
        ticker.tick().await;
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        debug!("{} task started with interval: {:?}", name, interval);

        loop {
            ticker.tick().await;
            if !on_tick() {
                break;
            }
        }

        debug!("{} task exiting", name);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_ticker_skips_immediate_tick_and_stops() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let t = Arc::clone(&ticks);

        let handle = spawn_ticker("test", Duration::from_millis(100), move || {
            t.fetch_add(1, Ordering::SeqCst) + 1 < 3
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        handle.await.unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}
