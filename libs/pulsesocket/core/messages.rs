//! Domain message helpers
//!
//! Each helper stamps the current session id and timestamp, picks the fixed
//! priority for its message kind and hands the envelope to
//! [`RealtimeClient::send_message`].

use crate::core::client::{RealtimeClient, SendOutcome};
use crate::core::envelope::{
    EmotionData, Envelope, GenerationRequest, MusicData, Payload, SessionData, SessionUpdate,
    TypingData,
};
use crate::error::{PulseError, Result};

/// Fixed send priorities, higher is more urgent
pub mod priority {
    use crate::core::queue::Priority;

    pub const HEARTBEAT: Priority = 10;
    pub const SESSION: Priority = 9;
    pub const TYPING: Priority = 8;
    pub const EMOTION: Priority = 6;
    pub const MUSIC_REQUEST: Priority = 3;
}

impl RealtimeClient {
    fn session_envelope(&self, payload: Payload) -> Result<Envelope> {
        let session_id = self.session_id().ok_or(PulseError::NoActiveSession)?;
        Ok(Envelope::new(session_id, self.now_ms(), payload))
    }

    pub fn send_typing_event(&self, data: TypingData) -> Result<SendOutcome> {
        let envelope = self.session_envelope(Payload::Typing(data))?;
        Ok(self.send_message(envelope, priority::TYPING))
    }

    pub fn send_emotion_data(&self, data: EmotionData) -> Result<SendOutcome> {
        let envelope = self.session_envelope(Payload::Emotion(data))?;
        Ok(self.send_message(envelope, priority::EMOTION))
    }

    /// Announce a change to the active session
    pub fn send_session_update(&self, update: SessionUpdate) -> Result<SendOutcome> {
        let envelope = self.session_envelope(Payload::Session(SessionData::Update(update)))?;
        Ok(self.send_message(envelope, priority::SESSION))
    }

    /// Ask the server to start a generation; progress arrives on the music route
    pub fn request_music_generation(&self, request: GenerationRequest) -> Result<SendOutcome> {
        let envelope =
            self.session_envelope(Payload::Music(MusicData::GenerateRequest(request)))?;
        Ok(self.send_message(envelope, priority::MUSIC_REQUEST))
    }
}
