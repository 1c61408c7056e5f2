use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    /// Attempts after the first one
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001/api".to_string(),
            timeout_ms: 10_000,
            max_retries: 3,
            retry_base_ms: 1_000,
            retry_max_ms: 10_000,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ApiError::Configuration(format!(
                "base_url must be http(s), got '{}'",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ApiError::Configuration(
                "timeout_ms must be greater than 0".into(),
            ));
        }
        if self.retry_max_ms < self.retry_base_ms {
            return Err(ApiError::Configuration(
                "retry_max_ms must not be below retry_base_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base: Duration::from_millis(self.retry_base_ms),
            max: Duration::from_millis(self.retry_max_ms),
        }
    }
}

/// Exponential retry schedule: `min(base * 2^attempt, max)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), or `None` when exhausted
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt);
        Some(self.base.saturating_mul(factor).min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delays_double_and_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            base: Duration::from_millis(1_000),
            max: Duration::from_millis(5_000),
        };

        let delays: Vec<_> = (0..6)
            .map(|attempt| policy.delay(attempt).map(|d| d.as_millis()))
            .collect();
        assert_eq!(
            delays,
            vec![Some(1_000), Some(2_000), Some(4_000), Some(5_000), Some(5_000), None]
        );
    }

    #[test]
    fn test_validate() {
        assert!(ApiConfig::default().validate().is_ok());
        assert!(ApiConfig::new("ftp://example.com").validate().is_err());

        let config = ApiConfig {
            retry_base_ms: 2_000,
            retry_max_ms: 1_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
