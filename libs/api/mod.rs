//! # Keytone API
//!
//! REST client for the non-realtime calls (session bookkeeping, music
//! downloads). Every call resolves to an [`ApiResponse`]; failures never
//! escape as errors or panics.
//!
//! Transient failures (transport errors, 5xx, 408, 429) are retried with
//! exponential backoff capped at `retry_max_ms`.

pub mod core;
pub mod traits;

pub use traits::*;

pub use self::core::*;
