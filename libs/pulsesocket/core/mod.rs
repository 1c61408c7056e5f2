//! # Pulsesocket core
//!
//! ```rust,ignore
//! use pulsesocket::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = RealtimeClient::builder()
//!         .url("ws://localhost:3001")
//!         .session_source(std::sync::Arc::new(StaticSession::new("session-1")))
//!         .heartbeat(std::time::Duration::from_secs(30))
//!         .build()?;
//!
//!     client.add_route(
//!         MessageKind::Emotion,
//!         handler_fn(|envelope| {
//!             println!("emotion: {:?}", envelope.payload());
//!             Ok(())
//!         }),
//!         0,
//!     );
//!     client.connect();
//!
//!     // Queued until the connection opens
//!     client.send_emotion_data(EmotionData { energy: 0.7, valence: 0.4, tension: 0.2, focus: 0.9 })?;
//!
//!     while let Ok(event) = client.events().recv() {
//!         println!("Event: {:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod emitter;
pub mod envelope;
pub mod heartbeat;
pub mod latency;
pub mod messages;
pub mod queue;
pub mod route_table;
pub mod stats;
pub mod websocket;

// Re-export main types
pub use builder::{states, RealtimeClientBuilder};
pub use client::{
    ClientEvent, ConnectEvent, DisconnectEvent, ErrorEvent, RealtimeClient, SendOutcome,
    WeakClient, HEARTBEAT_TIMEOUT,
};
pub use config::ClientConfig;
pub use connection_state::{AtomicConnectionState, ConnectionState};
pub use emitter::{EventEmitter, SubscriptionId};
pub use envelope::{
    ConnectionData, EmotionData, Envelope, ErrorData, GenerationRequest, HeartbeatData,
    HeartbeatKind, MessageKind, MusicData, Payload, SessionData, SessionUpdate, TypingData,
};
pub use heartbeat::spawn_ticker;
pub use latency::LatencyTracker;
pub use messages::priority;
pub use queue::{
    BackpressureState, EnqueueOutcome, FlushReport, OutboundQueue, Priority, QueueLimits,
    QueuedMessage,
};
pub use route_table::{DispatchReport, RouteTable};
pub use stats::{spawn_stats_reporter, ConnectionStats};
pub use websocket::TungsteniteConnector;
