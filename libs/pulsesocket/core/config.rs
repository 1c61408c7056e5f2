//! Client configuration

use crate::core::queue::{Priority, QueueLimits};
use crate::error::{PulseError, Result};
use crate::traits::{ExponentialBackoff, ReconnectionStrategy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for [`RealtimeClient`](crate::RealtimeClient)
///
/// All durations are milliseconds. A zero `heartbeat_interval_ms`,
/// `pong_timeout_ms` or `flush_interval_ms` turns that timer off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server endpoint (ws:// or wss://)
    pub url: String,
    /// Base reconnect delay, doubled per attempt
    pub reconnect_interval_ms: u64,
    pub max_reconnect_attempts: usize,
    /// Upper bound for a single reconnect delay
    pub max_backoff_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Unanswered probes older than this force a reconnect
    pub pong_timeout_ms: u64,
    pub max_queue_size: usize,
    pub backpressure_threshold: usize,
    /// Priorities below this are shed when the queue is full
    pub shed_priority_below: Priority,
    /// Queued messages older than this are discarded on flush
    pub message_timeout_ms: u64,
    pub max_send_retries: u32,
    /// Number of latency samples averaged
    pub latency_window: usize,
    pub flush_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_interval_ms: 1_000,
            max_reconnect_attempts: 10,
            max_backoff_ms: 30_000,
            heartbeat_interval_ms: 30_000,
            pong_timeout_ms: 90_000,
            max_queue_size: 1_000,
            backpressure_threshold: 800,
            shed_priority_below: 5,
            message_timeout_ms: 30_000,
            max_send_retries: 3,
            latency_window: 10,
            flush_interval_ms: 0,
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(PulseError::Configuration(format!(
                "url must start with ws:// or wss://, got '{}'",
                self.url
            )));
        }
        if self.max_queue_size == 0 {
            return Err(PulseError::Configuration(
                "max_queue_size must be greater than 0".into(),
            ));
        }
        if self.backpressure_threshold > self.max_queue_size {
            return Err(PulseError::Configuration(format!(
                "backpressure_threshold ({}) exceeds max_queue_size ({})",
                self.backpressure_threshold, self.max_queue_size
            )));
        }
        if self.reconnect_interval_ms == 0 {
            return Err(PulseError::Configuration(
                "reconnect_interval_ms must be greater than 0".into(),
            ));
        }
        if self.max_backoff_ms < self.reconnect_interval_ms {
            return Err(PulseError::Configuration(
                "max_backoff_ms must be at least reconnect_interval_ms".into(),
            ));
        }
        if self.latency_window == 0 {
            return Err(PulseError::Configuration(
                "latency_window must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Reconnect policy described by this config
    pub fn backoff(&self) -> Box<dyn ReconnectionStrategy> {
        Box::new(ExponentialBackoff::new(
            Duration::from_millis(self.reconnect_interval_ms),
            Duration::from_millis(self.max_backoff_ms),
            Some(self.max_reconnect_attempts),
        ))
    }

    /// `pong_timeout_ms` as a clock offset, saturating at `i64::MAX`
    pub fn pong_timeout_window_ms(&self) -> i64 {
        i64::try_from(self.pong_timeout_ms).unwrap_or(i64::MAX)
    }

    /// `message_timeout_ms` as a clock offset, saturating at `i64::MAX`
    pub fn message_ttl_ms(&self) -> i64 {
        i64::try_from(self.message_timeout_ms).unwrap_or(i64::MAX)
    }

    pub fn queue_limits(&self) -> QueueLimits {
        QueueLimits {
            max_size: self.max_queue_size,
            backpressure_threshold: self.backpressure_threshold,
            shed_priority_below: self.shed_priority_below,
        }
    }
}
