use thiserror::Error;

/// Main error type for pulsesocket
#[derive(Error, Debug)]
pub enum PulseError {
    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Frame handed to a transport that is no longer open
    #[error("Transport is not open")]
    NotOpen,

    /// Outbound envelope could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Inbound frame could not be decoded into an envelope
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A route handler failed
    #[error("Handler error: {0}")]
    Handler(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A domain helper needs a session id and none is attached
    #[error("No active session to attach to the message")]
    NoActiveSession,

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

/// Reasons an inbound frame is treated as unroutable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("malformed '{kind}' payload: {reason}")]
    Malformed { kind: String, reason: String },

    #[error("'{0}' message is missing session_id")]
    MissingSession(String),

    #[error("binary frames are not supported")]
    Binary,
}

/// Result type for pulsesocket operations
pub type Result<T> = std::result::Result<T, PulseError>;
