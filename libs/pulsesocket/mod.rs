//! # Pulsesocket
//!
//! Client-side realtime messaging over a single persistent WebSocket.
//!
//! ## Features
//!
//! - **Typed envelopes**: a closed tagged union, decoded through a variant-checked parser
//! - **Route table**: any number of prioritised handlers per message kind, failures isolated
//! - **Priority queue**: FIFO within a priority band, backpressure and low-priority shedding
//! - **Reconnection**: exponential backoff after unclean closes, explicit disconnect never reconnects
//! - **Heartbeat**: periodic probes, windowed latency average, half-open detection
//! - **Observability**: statistics snapshots, polled lifecycle events, typed subscriptions

pub mod core;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use self::core::*;
