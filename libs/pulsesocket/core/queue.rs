//! Outbound queue
//!
//! Holds envelopes that could not be sent yet. Entries stay sorted by
//! `(priority desc, enqueued_at asc, arrival asc)`, so a flush walks them
//! highest priority first and FIFO inside a priority band.
//!
//! Capacity has two limits:
//!
//! - `backpressure_threshold`: soft limit. At or above it the queue reports
//!   backpressure.
//! - `max_size`: hard limit. A message below `shed_priority_below` arriving at
//!   a full queue is rejected. Anything else is inserted and the tail beyond
//!   `max_size` is evicted. Both count as dropped.

use crate::core::envelope::Envelope;
use crate::error::Result;
use serde::Serialize;
use tracing::{debug, warn};

/// Message priority; higher is more urgent
pub type Priority = u8;

/// Envelope waiting in the outbound queue
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub envelope: Envelope,
    pub enqueued_at: i64,
    pub priority: Priority,
    pub retry_count: u32,
    seq: u64,
}

impl QueuedMessage {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.enqueued_at
    }

    /// True if `self` must be sent before `other`
    fn precedes(&self, other: &QueuedMessage) -> bool {
        (other.priority, self.enqueued_at, self.seq) < (self.priority, other.enqueued_at, other.seq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    pub max_size: usize,
    pub backpressure_threshold: usize,
    pub shed_priority_below: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Inserted; `evicted` tail entries were dropped to stay within capacity
    Queued { evicted: usize },
    /// Shed under backpressure, not inserted
    Rejected,
}

/// Observable queue pressure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackpressureState {
    pub queue_length: usize,
    pub threshold: usize,
    pub is_enabled: bool,
    pub dropped_messages: u64,
    pub expired_messages: u64,
}

/// What a flush did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub sent: usize,
    pub expired: usize,
    pub requeued: usize,
    pub dropped: usize,
}

pub struct OutboundQueue {
    entries: Vec<QueuedMessage>,
    limits: QueueLimits,
    next_seq: u64,
    dropped: u64,
    expired: u64,
}

impl OutboundQueue {
    pub fn new(limits: QueueLimits) -> Self {
        Self {
            entries: Vec::new(),
            limits,
            next_seq: 0,
            dropped: 0,
            expired: 0,
        }
    }

    pub fn enqueue(&mut self, envelope: Envelope, priority: Priority, now_ms: i64) -> EnqueueOutcome {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.insert(QueuedMessage {
            envelope,
            enqueued_at: now_ms,
            priority,
            retry_count: 0,
            seq,
        })
    }

    fn insert(&mut self, message: QueuedMessage) -> EnqueueOutcome {
        if message.priority < self.limits.shed_priority_below
            && self.entries.len() >= self.limits.max_size
        {
            self.dropped += 1;
            debug!(
                "Queue full ({}), shedding priority {} '{}' message",
                self.entries.len(),
                message.priority,
                message.envelope.kind()
            );
            return EnqueueOutcome::Rejected;
        }

        let position = self.entries.partition_point(|queued| queued.precedes(&message));
        self.entries.insert(position, message);

        let evicted = self.entries.len().saturating_sub(self.limits.max_size);
        if evicted > 0 {
            self.entries.truncate(self.limits.max_size);
            self.dropped += evicted as u64;
            warn!("Queue over capacity, evicted {} lowest-priority messages", evicted);
        }

        EnqueueOutcome::Queued { evicted }
    }

    /// Send everything that is still fresh, in priority order
    ///
    /// Works on a snapshot: the queue is emptied first, then each entry is
    /// either sent, dropped as expired (older than `timeout_ms`), requeued
    /// after a failed send, or dropped once `max_retries` sends have failed.
    pub fn flush<F>(
        &mut self,
        now_ms: i64,
        timeout_ms: i64,
        max_retries: u32,
        mut send: F,
    ) -> FlushReport
    where
        F: FnMut(&QueuedMessage) -> Result<()>,
    {
        let snapshot = std::mem::take(&mut self.entries);
        let mut report = FlushReport::default();

        for mut message in snapshot {
            if message.age_ms(now_ms) > timeout_ms {
                self.expired += 1;
                report.expired += 1;
                continue;
            }

            match send(&message) {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    message.retry_count += 1;
                    if message.retry_count < max_retries {
                        debug!(
                            "Send failed ({}), requeueing '{}' (retry {})",
                            e,
                            message.envelope.kind(),
                            message.retry_count
                        );
                        if let EnqueueOutcome::Queued { .. } = self.insert(message) {
                            report.requeued += 1;
                        } else {
                            report.dropped += 1;
                        }
                    } else {
                        warn!(
                            "Dropping '{}' message after {} failed sends: {}",
                            message.envelope.kind(),
                            message.retry_count,
                            e
                        );
                        self.dropped += 1;
                        report.dropped += 1;
                    }
                }
            }
        }

        report
    }

    /// Discard every entry; returns how many were discarded
    pub fn clear(&mut self) -> usize {
        let discarded = self.entries.len();
        self.entries.clear();
        discarded
    }

    /// Copy of the entries in send order
    pub fn snapshot(&self) -> Vec<QueuedMessage> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_backpressured(&self) -> bool {
        self.entries.len() >= self.limits.backpressure_threshold
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn expired(&self) -> u64 {
        self.expired
    }

    pub fn limits(&self) -> QueueLimits {
        self.limits
    }

    pub fn state(&self) -> BackpressureState {
        BackpressureState {
            queue_length: self.entries.len(),
            threshold: self.limits.backpressure_threshold,
            is_enabled: self.is_backpressured(),
            dropped_messages: self.dropped,
            expired_messages: self.expired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::envelope::{HeartbeatData, Payload, SessionData};
    use crate::error::PulseError;

    fn limits(threshold: usize, max: usize) -> QueueLimits {
        QueueLimits {
            max_size: max,
            backpressure_threshold: threshold,
            shed_priority_below: 5,
        }
    }

    /// Envelope whose ping id identifies it in assertions
    fn tagged(tag: u64) -> Envelope {
        Envelope::new("s", 0, Payload::Session(SessionData::Ping { ping_id: tag }))
    }

    fn tag_of(message: &QueuedMessage) -> u64 {
        match message.envelope.payload() {
            Payload::Session(SessionData::Ping { ping_id }) => *ping_id,
            other => panic!("unexpected payload {:?}", other),
        }
    }

    fn drain_order(queue: &mut OutboundQueue, now: i64) -> Vec<u64> {
        let mut order = Vec::new();
        queue.flush(now, i64::MAX, 3, |m| {
            order.push(tag_of(m));
            Ok(())
        });
        order
    }

    #[test]
    fn test_priority_then_fifo_order() {
        let mut queue = OutboundQueue::new(limits(100, 1000));

        for (tag, priority) in [(1, 3), (2, 8), (3, 3), (4, 10)] {
            queue.enqueue(tagged(tag), priority, 100);
        }

        assert_eq!(drain_order(&mut queue, 100), vec![4, 2, 1, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_same_millisecond_keeps_arrival_order() {
        let mut queue = OutboundQueue::new(limits(100, 1000));
        for tag in 0..20 {
            queue.enqueue(tagged(tag), 5, 7);
        }
        assert_eq!(drain_order(&mut queue, 7), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_low_priority_is_shed_at_capacity() {
        let mut queue = OutboundQueue::new(limits(5, 10));

        for tag in 0..10 {
            assert_eq!(
                queue.enqueue(tagged(tag), 1, 0),
                EnqueueOutcome::Queued { evicted: 0 }
            );
        }
        assert!(queue.is_backpressured());

        assert_eq!(queue.enqueue(tagged(10), 1, 0), EnqueueOutcome::Rejected);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.len(), 10);
    }

    #[test]
    fn test_backpressure_starts_at_threshold() {
        let mut queue = OutboundQueue::new(limits(3, 10));
        queue.enqueue(tagged(0), 1, 0);
        queue.enqueue(tagged(1), 1, 0);
        assert!(!queue.is_backpressured());
        queue.enqueue(tagged(2), 1, 0);
        assert!(queue.state().is_enabled);
    }

    #[test]
    fn test_high_priority_at_capacity_evicts_tail() {
        let mut queue = OutboundQueue::new(limits(2, 3));
        queue.enqueue(tagged(0), 6, 0);
        queue.enqueue(tagged(1), 1, 0);
        queue.enqueue(tagged(2), 1, 1);

        assert_eq!(
            queue.enqueue(tagged(3), 9, 2),
            EnqueueOutcome::Queued { evicted: 1 }
        );
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(drain_order(&mut queue, 2), vec![3, 0, 1]);
    }

    #[test]
    fn test_shed_threshold_is_tunable() {
        let mut queue = OutboundQueue::new(QueueLimits {
            max_size: 1,
            backpressure_threshold: 1,
            shed_priority_below: 9,
        });
        queue.enqueue(tagged(0), 8, 0);

        assert_eq!(queue.enqueue(tagged(1), 8, 0), EnqueueOutcome::Rejected);
        assert_eq!(
            queue.enqueue(tagged(2), 9, 0),
            EnqueueOutcome::Queued { evicted: 1 }
        );
    }

    #[test]
    fn test_flush_skips_expired_messages() {
        let mut queue = OutboundQueue::new(limits(100, 1000));
        queue.enqueue(tagged(1), 5, 0);
        queue.enqueue(tagged(2), 5, 20_000);

        let mut sent = Vec::new();
        let report = queue.flush(31_000, 30_000, 3, |m| {
            sent.push(tag_of(m));
            Ok(())
        });

        assert_eq!(sent, vec![2]);
        assert_eq!(report.expired, 1);
        assert_eq!(queue.expired(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_failed_sends_are_retried_then_dropped() {
        let mut queue = OutboundQueue::new(limits(100, 1000));
        queue.enqueue(Envelope::heartbeat(0, HeartbeatData::default()), 10, 0);

        let failing = |_: &QueuedMessage| -> Result<()> { Err(PulseError::NotOpen) };

        let report = queue.flush(0, 1000, 3, failing);
        assert_eq!(report.requeued, 1);
        assert_eq!(queue.snapshot()[0].retry_count, 1);

        queue.flush(0, 1000, 3, failing);
        assert_eq!(queue.snapshot()[0].retry_count, 2);

        let report = queue.flush(0, 1000, 3, failing);
        assert_eq!(report.dropped, 1);
        assert!(queue.is_empty());
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn test_requeued_message_keeps_its_place() {
        let mut queue = OutboundQueue::new(limits(100, 1000));
        queue.enqueue(tagged(1), 5, 0);
        queue.enqueue(tagged(2), 5, 1);

        // First entry fails once, second goes out
        queue.flush(1, 1000, 3, |m| {
            if tag_of(m) == 1 {
                Err(PulseError::NotOpen)
            } else {
                Ok(())
            }
        });
        queue.enqueue(tagged(3), 5, 2);

        assert_eq!(drain_order(&mut queue, 2), vec![1, 3]);
    }
}
