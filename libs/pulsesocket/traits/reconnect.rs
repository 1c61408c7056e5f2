use std::time::Duration;

/// Delay schedule for reconnecting after an unclean close
///
/// `attempt` counts scheduled reconnects since the last successful open,
/// starting at 0. Returning `None` gives up; the client then stays
/// disconnected until `connect()` is called again.
pub trait ReconnectionStrategy: Send + Sync {
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Called after every successful open and on explicit disconnect
    fn reset(&mut self) {}

    fn should_reconnect(&self, attempt: usize) -> bool;
}

fn within_budget(max_attempts: Option<usize>, attempt: usize) -> bool {
    max_attempts.map_or(true, |max| attempt < max)
}

/// `base * 2^attempt`, capped at `max_delay`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max_delay: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    /// `max_attempts = None` retries forever
    pub fn new(base: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            base,
            max_delay,
            max_attempts,
        }
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        // Past 2^31 the cap wins anyway
        let delay = u32::try_from(attempt)
            .ok()
            .and_then(|exp| 2u32.checked_pow(exp))
            .map_or(self.max_delay, |factor| self.base.saturating_mul(factor));
        Some(delay.min(self.max_delay))
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        within_budget(self.max_attempts, attempt)
    }
}

/// Same delay before every attempt
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        within_budget(self.max_attempts, attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_cap() {
        let strategy =
            ExponentialBackoff::new(Duration::from_millis(1000), Duration::from_secs(30), None);

        let delays: Vec<u64> = (0..7)
            .map(|i| strategy.next_delay(i).unwrap().as_millis() as u64)
            .collect();

        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000]);
    }

    #[test]
    fn test_backoff_respects_max_attempts() {
        let strategy =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(30), Some(3));

        assert!(strategy.next_delay(2).is_some());
        assert!(strategy.next_delay(3).is_none());
        assert!(!strategy.should_reconnect(3));
    }

    #[test]
    fn test_backoff_huge_attempt_does_not_overflow() {
        let strategy =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(30), None);

        assert_eq!(strategy.next_delay(64), Some(Duration::from_secs(30)));
        assert_eq!(strategy.next_delay(10_000), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_fixed_delay() {
        let strategy = FixedDelay::new(Duration::from_millis(750), Some(2));

        assert_eq!(strategy.next_delay(0), Some(Duration::from_millis(750)));
        assert_eq!(strategy.next_delay(1), Some(Duration::from_millis(750)));
        assert_eq!(strategy.next_delay(2), None);
    }
}
