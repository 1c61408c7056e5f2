//! Message envelope model
//!
//! Every frame on the wire is a JSON object:
//!
//! ```text
//! { "type": "emotion", "session_id": "s-1", "timestamp": 1700000000000,
//!   "data": { "energy": 0.7, "valence": 0.4, "tension": 0.2, "focus": 0.9 } }
//! ```
//!
//! The `type` tag decides the shape of `data`. Decoding checks the tag first
//! and then parses `data` into that variant's payload only, so an unknown tag
//! or a payload that does not match its tag is rejected instead of guessed.

use crate::error::{DecodeError, PulseError, Result};
use crate::transport::WsMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Discriminant of an envelope; also the route key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Typing,
    Emotion,
    Heartbeat,
    ConnectionEstablished,
    Error,
    Session,
    Music,
}

impl MessageKind {
    pub const ALL: [MessageKind; 7] = [
        MessageKind::Typing,
        MessageKind::Emotion,
        MessageKind::Heartbeat,
        MessageKind::ConnectionEstablished,
        MessageKind::Error,
        MessageKind::Session,
        MessageKind::Music,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Typing => "typing",
            MessageKind::Emotion => "emotion",
            MessageKind::Heartbeat => "heartbeat",
            MessageKind::ConnectionEstablished => "connection_established",
            MessageKind::Error => "error",
            MessageKind::Session => "session",
            MessageKind::Music => "music",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Only bare heartbeats may omit `session_id`
    pub fn requires_session(&self) -> bool {
        !matches!(self, MessageKind::Heartbeat)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured keystroke
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingData {
    pub keystroke: String,
    /// Key hold time in milliseconds
    pub duration: f64,
    /// Time since the previous keystroke in milliseconds
    pub interval: f64,
    #[serde(default)]
    pub is_backspace: bool,
}

/// Emotion estimate, each axis in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionData {
    pub energy: f64,
    pub valence: f64,
    pub tension: f64,
    pub focus: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatKind {
    #[default]
    Beat,
    Ping,
    Pong,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatData {
    #[serde(default)]
    pub kind: HeartbeatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_time: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

/// Fields a session update may carry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_music_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_delete_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SessionData {
    Start,
    Update(SessionUpdate),
    End,
    Ping { ping_id: u64 },
    Pong { ping_id: u64 },
}

/// Request for a new piece of music shaped by an emotion estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub request_id: String,
    pub emotion: EmotionData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MusicData {
    GenerateRequest(GenerationRequest),
    Progress {
        request_id: String,
        progress: f32,
    },
    Completed {
        request_id: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_secs: Option<f64>,
    },
    Failed {
        request_id: String,
        reason: String,
    },
}

/// Variant payload; the variant is the `type` tag
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Typing(TypingData),
    Emotion(EmotionData),
    Heartbeat(HeartbeatData),
    ConnectionEstablished(ConnectionData),
    Error(ErrorData),
    Session(SessionData),
    Music(MusicData),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::Typing(_) => MessageKind::Typing,
            Payload::Emotion(_) => MessageKind::Emotion,
            Payload::Heartbeat(_) => MessageKind::Heartbeat,
            Payload::ConnectionEstablished(_) => MessageKind::ConnectionEstablished,
            Payload::Error(_) => MessageKind::Error,
            Payload::Session(_) => MessageKind::Session,
            Payload::Music(_) => MessageKind::Music,
        }
    }

    fn to_value(&self) -> serde_json::Result<Value> {
        match self {
            Payload::Typing(d) => serde_json::to_value(d),
            Payload::Emotion(d) => serde_json::to_value(d),
            Payload::Heartbeat(d) => serde_json::to_value(d),
            Payload::ConnectionEstablished(d) => serde_json::to_value(d),
            Payload::Error(d) => serde_json::to_value(d),
            Payload::Session(d) => serde_json::to_value(d),
            Payload::Music(d) => serde_json::to_value(d),
        }
    }

    fn from_value(kind: MessageKind, data: Value) -> std::result::Result<Self, DecodeError> {
        // Variants whose fields all default accept a missing `data`
        let data = if data.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            data
        };

        let malformed = |e: serde_json::Error| DecodeError::Malformed {
            kind: kind.as_str().to_string(),
            reason: e.to_string(),
        };

        let payload = match kind {
            MessageKind::Typing => Payload::Typing(serde_json::from_value(data).map_err(malformed)?),
            MessageKind::Emotion => {
                Payload::Emotion(serde_json::from_value(data).map_err(malformed)?)
            }
            MessageKind::Heartbeat => {
                Payload::Heartbeat(serde_json::from_value(data).map_err(malformed)?)
            }
            MessageKind::ConnectionEstablished => {
                Payload::ConnectionEstablished(serde_json::from_value(data).map_err(malformed)?)
            }
            MessageKind::Error => Payload::Error(serde_json::from_value(data).map_err(malformed)?),
            MessageKind::Session => {
                Payload::Session(serde_json::from_value(data).map_err(malformed)?)
            }
            MessageKind::Music => Payload::Music(serde_json::from_value(data).map_err(malformed)?),
        };
        Ok(payload)
    }
}

#[derive(Serialize)]
struct OutboundWire<'a> {
    #[serde(rename = "type")]
    kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
    data: Value,
}

#[derive(Deserialize)]
struct InboundWire {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    data: Value,
}

/// Typed wire message; immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    session_id: Option<String>,
    timestamp: Option<i64>,
    payload: Payload,
}

impl Envelope {
    /// Build an envelope owned by `session_id`
    pub fn new(session_id: impl Into<String>, timestamp: i64, payload: Payload) -> Self {
        Self {
            session_id: Some(session_id.into()),
            timestamp: Some(timestamp),
            payload,
        }
    }

    /// Build a bare heartbeat, which carries no session
    pub fn heartbeat(timestamp: i64, data: HeartbeatData) -> Self {
        Self {
            session_id: None,
            timestamp: Some(timestamp),
            payload: Payload::Heartbeat(data),
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Serialize to the JSON wire form
    pub fn encode(&self) -> Result<String> {
        let data = self
            .payload
            .to_value()
            .map_err(|e| PulseError::Serialization(e.to_string()))?;

        let wire = OutboundWire {
            kind: self.kind(),
            session_id: self.session_id.as_deref(),
            timestamp: self.timestamp,
            data,
        };

        serde_json::to_string(&wire).map_err(|e| PulseError::Serialization(e.to_string()))
    }

    /// Parse a JSON text frame, checking the payload against its tag
    pub fn decode(text: &str) -> std::result::Result<Self, DecodeError> {
        let wire: InboundWire =
            serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

        let kind = MessageKind::parse(&wire.kind).ok_or(DecodeError::UnknownType(wire.kind))?;

        let session_id = wire.session_id.filter(|id| !id.is_empty());
        if kind.requires_session() && session_id.is_none() {
            return Err(DecodeError::MissingSession(kind.as_str().to_string()));
        }

        let payload = Payload::from_value(kind, wire.data)?;

        Ok(Self {
            session_id,
            timestamp: wire.timestamp,
            payload,
        })
    }

    /// Decode a transport frame; binary frames are not part of the protocol
    pub fn from_frame(frame: &WsMessage) -> std::result::Result<Self, DecodeError> {
        match frame.as_text() {
            Some(text) => Self::decode(text),
            None => Err(DecodeError::Binary),
        }
    }
}
