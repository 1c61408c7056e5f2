/// Supplies the session id stamped on outbound envelopes
///
/// The session lifecycle lives outside the messaging layer; the client only
/// asks for the current id when it builds an envelope.
pub trait SessionSource: Send + Sync {
    fn current_session_id(&self) -> Option<String>;
}

/// Session source that always returns the same id
#[derive(Debug, Clone, Default)]
pub struct StaticSession(pub Option<String>);

impl StaticSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }
}

impl SessionSource for StaticSession {
    fn current_session_id(&self) -> Option<String> {
        self.0.clone()
    }
}
