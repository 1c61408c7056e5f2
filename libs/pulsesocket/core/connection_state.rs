//! Lock-free connection state
//!
//! The state machine updates this under its own lock; readers (UI polling,
//! the statistics reporter) load it without taking that lock.

use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Closing = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Closing,
            _ => ConnectionState::Disconnected,
        }
    }
}

#[derive(Debug)]
pub struct AtomicConnectionState(AtomicU8);

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    /// Connecting or connected; `connect()` is a no-op in both
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(
            self.get(),
            ConnectionState::Connecting | ConnectionState::Connected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let state = AtomicConnectionState::new(ConnectionState::Disconnected);
        assert!(!state.is_active());

        state.set(ConnectionState::Connecting);
        assert!(state.is_active());
        assert!(!state.is_connected());

        state.set(ConnectionState::Connected);
        assert!(state.is_connected());

        state.set(ConnectionState::Closing);
        assert!(!state.is_active());
    }
}
