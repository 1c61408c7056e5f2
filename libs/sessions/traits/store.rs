use crate::core::record::SessionRecord;
use crate::error::Result;

/// Durable storage for the full session list
///
/// The manager always saves the whole list; implementations never see
/// partial updates.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Vec<SessionRecord>>;

    fn save(&self, sessions: &[SessionRecord]) -> Result<()>;
}
