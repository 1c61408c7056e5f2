//! # Pulsesocket Traits
//!
//! Seams of the realtime messaging layer:
//!
//! - **Connector / Transport**: open and drive the underlying connection
//! - **RouteHandler**: consume dispatched envelopes
//! - **ReconnectionStrategy**: control reconnection backoff
//! - **PongDetector**: recognise heartbeat answers
//! - **HeaderProvider**: handshake headers, refreshed per connection
//! - **SessionSource**: session id for outbound envelopes
//! - **Clock**: wall-clock milliseconds

pub mod clock;
pub mod error;
pub mod headers;
pub mod pong_detector;
pub mod reconnect;
pub mod router;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DecodeError, PulseError, Result};
pub use headers::{HeaderProvider, Headers, StaticHeaders};
pub use pong_detector::{EnvelopePongDetector, NoOpPongDetector, PongDetector};
pub use reconnect::{ExponentialBackoff, FixedDelay, ReconnectionStrategy};
pub use router::{handler_fn, FnHandler, RouteHandler};
pub use session::{SessionSource, StaticSession};
pub use transport::{
    Connector, Transport, TransportEvent, TransportEvents, WsMessage, ABNORMAL_CLOSURE,
    NORMAL_CLOSURE,
};
