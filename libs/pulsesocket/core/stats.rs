//! Connection statistics
//!
//! Counters are plain fields updated under the client lock; callers always get
//! a copy.

use crate::core::client::RealtimeClient;
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    /// Set when a connection opens, cleared when it closes
    pub connected_at: Option<i64>,
    pub reconnect_count: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    /// Frame bytes in both directions
    pub bytes_transferred: u64,
    /// Mean of the recent round-trip samples
    pub latency_ms: f64,
    pub error_count: u64,
}

/// Log statistics and queue pressure every `interval`
///
/// The task holds only a weak reference and ends once every handle to the
/// client is gone.
pub fn spawn_stats_reporter(client: &RealtimeClient, interval: Duration) -> JoinHandle<()> {
    let weak = client.downgrade();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let Some(client) = weak.upgrade() else {
                debug!("Client dropped, stats reporter exiting");
                break;
            };

            let stats = client.stats();
            let pressure = client.backpressure();
            info!(
                "[STATS] state={:?} sent={} received={} bytes={} latency={:.1}ms errors={} reconnects={} queue={}/{} dropped={} expired={}",
                client.connection_state(),
                stats.messages_sent,
                stats.messages_received,
                stats.bytes_transferred,
                stats.latency_ms,
                stats.error_count,
                stats.reconnect_count,
                pressure.queue_length,
                pressure.threshold,
                pressure.dropped_messages,
                pressure.expired_messages,
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = ConnectionStats {
            connected_at: Some(5),
            messages_sent: 2,
            ..Default::default()
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["connectedAt"], 5);
        assert_eq!(json["messagesSent"], 2);
        assert_eq!(json["latencyMs"], 0.0);
    }
}
