//! Error types for feedwarden-classifier

use feedwarden_store::ErrorKind;
use thiserror::Error;

/// Errors surfaced by the classification boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// Network or connection failure before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP 401: credentials rejected
    #[error("Authentication failed, check the API key")]
    Auth,

    /// HTTP 429: quota or rate limit exhausted
    #[error("Rate limit exceeded, try again later")]
    RateLimit,

    /// Any other non-success HTTP status
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// Response text did not parse against the expected shape
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Backend is not usable as configured
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClassifyError {
    /// Map a non-success HTTP status to the error taxonomy.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            401 => ClassifyError::Auth,
            429 => ClassifyError::RateLimit,
            _ => ClassifyError::Http {
                status,
                body: body.into(),
            },
        }
    }

    /// The `ErrorStatus` kind this failure should publish, if any.
    ///
    /// Only auth and rate-limit failures are specific enough to surface;
    /// everything else leaves the current status alone.
    pub fn status_kind(&self) -> Option<ErrorKind> {
        match self {
            ClassifyError::Auth => Some(ErrorKind::Auth),
            ClassifyError::RateLimit => Some(ErrorKind::RateLimit),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClassifyError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ClassifyError::from_status(status.as_u16(), err.to_string()),
            None => ClassifyError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClassifyError {
    fn from(err: serde_json::Error) -> Self {
        ClassifyError::Malformed(err.to_string())
    }
}

/// Result type for classification calls
pub type ClassifyResult<T> = std::result::Result<T, ClassifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_auth_and_rate_limit() {
        assert_eq!(ClassifyError::from_status(401, ""), ClassifyError::Auth);
        assert_eq!(ClassifyError::from_status(429, ""), ClassifyError::RateLimit);
        assert!(matches!(
            ClassifyError::from_status(503, "busy"),
            ClassifyError::Http { status: 503, .. }
        ));
    }

    #[test]
    fn test_status_kind() {
        assert_eq!(ClassifyError::Auth.status_kind(), Some(ErrorKind::Auth));
        assert_eq!(
            ClassifyError::RateLimit.status_kind(),
            Some(ErrorKind::RateLimit)
        );
        assert_eq!(ClassifyError::Transport("reset".into()).status_kind(), None);
        assert_eq!(ClassifyError::Malformed("x".into()).status_kind(), None);
    }

    #[test]
    fn test_json_error_is_malformed() {
        let err: ClassifyError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ClassifyError::Malformed(_)));
    }
}
