//! Engine-level error taxonomy.

use feedwarden_classifier::ClassifyError;
use feedwarden_store::StoreError;
use thiserror::Error;

/// Errors produced by the orchestration engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Network or HTTP failure talking to the classifier
    #[error("transport error: {0}")]
    Transport(String),

    #[error("classifier rejected credentials")]
    Auth,

    #[error("classifier rate limit exceeded")]
    RateLimit,

    /// Classifier reply did not parse against the expected shape
    #[error("malformed classifier response: {0}")]
    MalformedResponse(String),

    /// A response arrived for a navigation context that is no longer live
    #[error("stale completion for context {token}")]
    StaleContext { token: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("engine has shut down")]
    Shutdown,
}

impl EngineError {
    pub(crate) fn transition(from: impl ToString, to: impl ToString) -> Self {
        EngineError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<ClassifyError> for EngineError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::Auth => EngineError::Auth,
            ClassifyError::RateLimit => EngineError::RateLimit,
            ClassifyError::Malformed(msg) => EngineError::MalformedResponse(msg),
            ClassifyError::Transport(msg) => EngineError::Transport(msg),
            ClassifyError::Http { status, body } => {
                EngineError::Transport(format!("HTTP {status}: {body}"))
            }
            ClassifyError::Config(msg) => EngineError::Config(msg),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
