//! Error types for feedwarden-store

use thiserror::Error;

/// Errors that can occur at the persistence boundary
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backing file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document is not valid JSON for the expected schema
    #[error("Corrupt state document at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// Serialization of the state document failed
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Counter value is not a finite number
    #[error("Invalid counter value for {key}: {value}")]
    InvalidCounter { key: String, value: f64 },

    /// Note rejected before it was stored
    #[error("Invalid note: {0}")]
    InvalidNote(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
