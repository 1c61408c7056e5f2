//! Transport seam
//!
//! The connection state machine never talks to a socket directly. A
//! [`Connector`] opens a [`Transport`] and reports everything that happens on
//! it afterwards through an unbounded channel of [`TransportEvent`]s. This keeps
//! the state machine independent of tokio-tungstenite and lets tests script
//! opens, closes and failures.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Close code for an orderly shutdown
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the connection dropped without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Raw frame exchanged with the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        match self {
            WsMessage::Text(s) => s.len(),
            WsMessage::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Something that happened on an open transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A data frame arrived
    Frame(WsMessage),
    /// Transport-level error; a `Closed` event follows
    Error(String),
    /// The transport is gone
    Closed {
        code: u16,
        reason: String,
        was_clean: bool,
    },
}

/// Sink the transport reports its events into
pub type TransportEvents = UnboundedSender<TransportEvent>;

/// An open, bidirectional connection
///
/// `send` is a synchronous hand-off: it either accepts the frame for delivery
/// or fails immediately. It never waits on network I/O.
pub trait Transport: Send + Sync {
    /// Hand a frame to the transport for delivery
    fn send(&self, frame: WsMessage) -> Result<()>;

    /// Start closing the transport with the given close code
    fn close(&self, code: u16, reason: &str);
}

/// Opens transports
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a transport to `url`
    ///
    /// Resolves once the handshake completed. Every later frame, error and the
    /// final close must be reported through `events`.
    async fn open(&self, url: &str, events: TransportEvents) -> Result<Arc<dyn Transport>>;
}
