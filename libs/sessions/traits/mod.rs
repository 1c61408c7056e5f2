//! Seams of the session manager

pub mod error;
pub mod store;

pub use error::{Result, SessionError};
pub use store::SessionStore;
