//! Round-trip latency tracking
//!
//! Each heartbeat probe records when it was sent. The pong answering the most
//! recent probe becomes a latency sample, kept in a bounded window whose
//! arithmetic mean is the reported latency. Any pong proves the peer is alive;
//! probes left unanswered for longer than the pong timeout mark the connection
//! as half-open.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastPing {
    id: u64,
    sent_at: i64,
}

#[derive(Debug)]
pub struct LatencyTracker {
    window: VecDeque<i64>,
    capacity: usize,
    last_ping: Option<LastPing>,
    /// Send time of the oldest probe not followed by any pong
    awaiting_since: Option<i64>,
    next_ping_id: u64,
}

impl LatencyTracker {
    /// Create a tracker averaging over the last `capacity` samples
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            last_ping: None,
            awaiting_since: None,
            next_ping_id: 1,
        }
    }

    /// Record a probe sent at `now_ms`; returns the id to put on the wire
    pub fn record_ping(&mut self, now_ms: i64) -> u64 {
        let id = self.next_ping_id;
        self.next_ping_id += 1;

        self.last_ping = Some(LastPing { id, sent_at: now_ms });
        self.awaiting_since.get_or_insert(now_ms);
        id
    }

    /// Record a pong; returns the latency sample if it answered the last probe
    ///
    /// A pong without an id answers whatever probe is outstanding.
    pub fn record_pong(&mut self, ping_id: Option<u64>, now_ms: i64) -> Option<i64> {
        self.awaiting_since = None;

        let last = self.last_ping?;
        if ping_id.is_some_and(|id| id != last.id) {
            return None;
        }
        self.last_ping = None;

        let sample = (now_ms - last.sent_at).max(0);
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(sample);
        Some(sample)
    }

    /// Mean of the sample window, 0 when empty
    pub fn average(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<i64>() as f64 / self.window.len() as f64
    }

    /// False once a probe has gone unanswered for `timeout_ms`
    ///
    /// A zero timeout disables the check.
    pub fn is_healthy(&self, now_ms: i64, timeout_ms: i64) -> bool {
        if timeout_ms <= 0 {
            return true;
        }
        match self.awaiting_since {
            Some(since) => now_ms - since < timeout_ms,
            None => true,
        }
    }

    /// Forget outstanding probes; samples are kept
    ///
    /// Call this when a connection opens or closes.
    pub fn reset_outstanding(&mut self) {
        self.last_ping = None;
        self.awaiting_since = None;
    }

    pub fn samples(&self) -> Vec<i64> {
        self.window.iter().copied().collect()
    }
}
