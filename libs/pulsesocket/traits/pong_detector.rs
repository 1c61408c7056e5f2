//! PONG Detection Trait
//!
//! Decides which inbound envelopes answer a heartbeat probe. Matched pongs
//! feed the latency tracker and are not dispatched to routes.

use crate::core::envelope::{Envelope, HeartbeatKind, Payload, SessionData};

/// Trait for detecting PONG responses in the envelope stream
pub trait PongDetector: Send + Sync {
    /// Return the echoed ping id if `envelope` is a pong
    ///
    /// `Some(None)` means "a pong that does not echo an id", which matches
    /// whatever ping is outstanding.
    fn pong_id(&self, envelope: &Envelope) -> Option<Option<u64>>;
}

/// Recognises `session{action: pong}` and `heartbeat{kind: pong}`
pub struct EnvelopePongDetector;

impl PongDetector for EnvelopePongDetector {
    fn pong_id(&self, envelope: &Envelope) -> Option<Option<u64>> {
        match envelope.payload() {
            Payload::Session(SessionData::Pong { ping_id }) => Some(Some(*ping_id)),
            Payload::Heartbeat(data) if data.kind == HeartbeatKind::Pong => Some(data.ping_id),
            _ => None,
        }
    }
}

/// No-op PONG detector that never detects PONGs
///
/// Use this when the server does not answer probes; latency stays at zero
/// and half-open detection never fires.
pub struct NoOpPongDetector;

impl PongDetector for NoOpPongDetector {
    fn pong_id(&self, _envelope: &Envelope) -> Option<Option<u64>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::envelope::HeartbeatData;

    #[test]
    fn test_envelope_pong_detector() {
        let detector = EnvelopePongDetector;

        let session_pong = Envelope::new("s", 1, Payload::Session(SessionData::Pong { ping_id: 7 }));
        assert_eq!(detector.pong_id(&session_pong), Some(Some(7)));

        let bare_pong = Envelope::heartbeat(
            1,
            HeartbeatData {
                kind: HeartbeatKind::Pong,
                ..Default::default()
            },
        );
        assert_eq!(detector.pong_id(&bare_pong), Some(None));

        let ping = Envelope::new("s", 1, Payload::Session(SessionData::Ping { ping_id: 7 }));
        assert_eq!(detector.pong_id(&ping), None);
        assert_eq!(detector.pong_id(&Envelope::heartbeat(1, HeartbeatData::default())), None);
    }

    #[test]
    fn test_noop_pong_detector() {
        let pong = Envelope::new("s", 1, Payload::Session(SessionData::Pong { ping_id: 1 }));
        assert_eq!(NoOpPongDetector.pong_id(&pong), None);
    }
}
