//! # Keytone Sessions
//!
//! Local session lifecycle: identity, expiry countdown and persistence.
//!
//! - One active session at a time; creating a new one deactivates the old
//! - The active session expires promptly (1 s tick) and notifies exactly once
//! - Other expired records are purged by a coarser sweep
//! - A single scheduler task drives both
//!
//! [`SessionManager`] implements [`pulsesocket::SessionSource`], so the
//! realtime client stamps the active id on every outbound envelope.

pub mod core;
pub mod traits;

pub use traits::*;

pub use self::core::{
    config::SessionConfig,
    manager::SessionManager,
    record::{SessionPatch, SessionRecord},
    store::{JsonFileStore, MemoryStore},
};
