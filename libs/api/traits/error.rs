use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("API rejected request: {0}")]
    Rejected(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ApiError {
    /// Transport failures and 5xx/408/429 answers are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RequestFailed(e) => !e.is_builder(),
            ApiError::Status { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for status in [500, 502, 503, 504, 408, 429] {
            assert!(is_retryable_status(status), "{} should retry", status);
        }
        for status in [400, 401, 403, 404, 409, 422] {
            assert!(!is_retryable_status(status), "{} should not retry", status);
        }
    }

    #[test]
    fn test_decode_errors_are_final() {
        assert!(!ApiError::DeserializeFailed("bad".into()).is_retryable());
        assert!(ApiError::Status {
            status: 503,
            message: "busy".into()
        }
        .is_retryable());
    }
}
