//! Storage trait definitions for Feedwarden
//!
//! These traits define the persistence boundaries the engine reads from:
//! - `GoalStore`: user-defined inclusion/exclusion criteria (read-only to the engine)
//! - `SettingsStore`: policy flags plus the process-wide error status
//! - `CounterStore`: numeric key/value persistence (session time)
//! - `NoteStore`: append-only saved notes
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module; `json_file` persists to disk.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::sync::watch;

use crate::error::StoreError;

/// Result type for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

/// The user's goal criteria: what to watch and what to avoid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    /// Content the user wants to see.
    #[serde(default, alias = "helpful")]
    pub include: String,
    /// Content the user wants to avoid.
    #[serde(default, alias = "harmful")]
    pub exclude: String,
}

impl Criteria {
    pub fn new(include: impl Into<String>, exclude: impl Into<String>) -> Self {
        Self {
            include: include.into(),
            exclude: exclude.into(),
        }
    }

    /// True when neither field carries any non-whitespace text.
    pub fn is_empty(&self) -> bool {
        self.include.trim().is_empty() && self.exclude.trim().is_empty()
    }

    /// Stable digest of this snapshot, used to key classification requests.
    pub fn digest(&self) -> CriteriaDigest {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(self.include.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.exclude.as_bytes());
        CriteriaDigest(hex::encode(hasher.finalize()))
    }
}

/// SHA-256 of a criteria snapshot (hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CriteriaDigest(String);

impl CriteriaDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for CriteriaDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Goal criteria store.
///
/// The engine only reads goals; writers are external (an options page, the CLI).
#[async_trait]
pub trait GoalStore: Send + Sync {
    /// Current criteria snapshot.
    async fn get(&self) -> StoreResult<Criteria>;

    /// Replace the criteria.
    async fn set(&self, criteria: Criteria) -> StoreResult<()>;

    /// Observe criteria changes. The receiver starts at the current value.
    fn subscribe(&self) -> watch::Receiver<Criteria>;
}

// ---------------------------------------------------------------------------
// Settings and error status
// ---------------------------------------------------------------------------

/// Category of the last classification failure worth surfacing to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[default]
    None,
    Auth,
    RateLimit,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::None => "none",
            ErrorKind::Auth => "auth",
            ErrorKind::RateLimit => "rate_limit",
        };
        f.write_str(s)
    }
}

/// Process-wide classification error status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorStatus {
    pub kind: ErrorKind,
    /// When the current kind was recorded (`None` while kind is `none`).
    pub since: Option<DateTime<Utc>>,
}

impl ErrorStatus {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn failed(kind: ErrorKind, at: DateTime<Utc>) -> Self {
        match kind {
            ErrorKind::None => Self::none(),
            _ => Self {
                kind,
                since: Some(at),
            },
        }
    }

    pub fn is_none(&self) -> bool {
        self.kind == ErrorKind::None
    }
}

/// Policy flags read on every navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Block the focal item until its verdict arrives.
    pub blocker_enabled: bool,
    /// Evaluate the focal item and render the verdict.
    pub video_eval_enabled: bool,
    /// Filter recommendation lists.
    pub filter_enabled: bool,
    /// Hide short-form shelves.
    pub hide_shorts_enabled: bool,
    /// Hide the comment section when a verdict is rendered.
    pub comments_disabled: bool,
    /// Last classification error status.
    pub error_status: ErrorStatus,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            blocker_enabled: true,
            video_eval_enabled: true,
            filter_enabled: true,
            hide_shorts_enabled: false,
            comments_disabled: false,
            error_status: ErrorStatus::none(),
        }
    }
}

/// Settings store.
///
/// The engine mutates settings only through `set_error_status`.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current settings.
    async fn get(&self) -> StoreResult<Settings>;

    /// Replace all settings.
    async fn set(&self, settings: Settings) -> StoreResult<()>;

    /// Overwrite only the error status, leaving the policy flags untouched.
    async fn set_error_status(&self, status: ErrorStatus) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Persistent numeric key/value store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a counter, `None` if it was never written.
    async fn get(&self, key: &str) -> StoreResult<Option<f64>>;

    /// Write a counter. Rejects non-finite values.
    async fn set(&self, key: &str, value: f64) -> StoreResult<()>;
}

pub(crate) fn check_counter(key: &str, value: f64) -> StoreResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StoreError::InvalidCounter {
            key: key.to_string(),
            value,
        })
    }
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

/// A free-text note attached to a page URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub url: String,
    pub note: String,
}

impl Note {
    pub fn new(url: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            note: note.into(),
        }
    }
}

/// Append-only note list.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Append a note. Empty notes or URLs are rejected.
    async fn add(&self, note: Note) -> StoreResult<()>;

    /// All notes in insertion order.
    async fn list(&self) -> StoreResult<Vec<Note>>;
}

pub(crate) fn check_note(note: &Note) -> StoreResult<()> {
    if note.url.trim().is_empty() {
        return Err(StoreError::InvalidNote("url must not be empty".into()));
    }
    if note.note.trim().is_empty() {
        return Err(StoreError::InvalidNote("note must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criteria_empty_ignores_whitespace() {
        assert!(Criteria::new("  ", "\n").is_empty());
        assert!(!Criteria::new("cooking", "").is_empty());
        assert!(!Criteria::new("", "pranks").is_empty());
    }

    #[test]
    fn test_criteria_digest_separates_fields() {
        let a = Criteria::new("ab", "c").digest();
        let b = Criteria::new("a", "bc").digest();
        assert_ne!(a, b);
        assert_eq!(a, Criteria::new("ab", "c").digest());
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn test_criteria_accepts_legacy_field_names() {
        let c: Criteria =
            serde_json::from_str(r#"{"helpful":"cooking","harmful":"pranks"}"#).unwrap();
        assert_eq!(c, Criteria::new("cooking", "pranks"));
    }

    #[test]
    fn test_error_status_failed_with_none_kind_is_none() {
        let status = ErrorStatus::failed(ErrorKind::None, Utc::now());
        assert!(status.is_none());
        assert!(status.since.is_none());
    }

    #[test]
    fn test_settings_partial_document_uses_defaults() {
        let s: Settings = serde_json::from_str(r#"{"hide_shorts_enabled":true}"#).unwrap();
        assert!(s.hide_shorts_enabled);
        assert!(s.blocker_enabled);
        assert!(s.error_status.is_none());
    }

    #[test]
    fn test_error_kind_serde() {
        let json = serde_json::to_string(&ErrorKind::RateLimit).unwrap();
        assert_eq!(json, "\"rate_limit\"");
        assert_eq!(ErrorKind::Auth.to_string(), "auth");
    }

    #[test]
    fn test_check_counter_rejects_infinite() {
        assert!(check_counter("k", 1.5).is_ok());
        assert!(check_counter("k", f64::INFINITY).is_err());
    }
}
