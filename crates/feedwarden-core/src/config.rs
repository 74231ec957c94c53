//! Engine configuration.
//!
//! Layering: built-in defaults, then an optional TOML file, then
//! `FEEDWARDEN_*` environment overrides. Call [`EngineConfig::validate`]
//! (done by [`EngineConfig::load`]) before handing the config to the engine.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Chunk sizes the watch-page recommendation list is rendered in.
pub const DEFAULT_CHUNK_SIZES: [usize; 3] = [19, 20, 21];

/// Literal the user must type to unblock a flagged item.
pub const DEFAULT_CONFIRMATION_PHRASE: &str = "this video is not a distraction";

/// Persistent counter key for accumulated session seconds.
pub const DEFAULT_COUNTER_KEY: &str = "totalTimeSpentOnYouTube";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Accepted recommendation chunk sizes; a page closes on any of them.
    pub chunk_sizes: Vec<usize>,
    /// Exact input that overrides a flagged verdict.
    pub confirmation_phrase: String,
    /// Session tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// Key of the accumulated-seconds counter.
    pub counter_key: String,
    /// Capacity of the engine event channel.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_sizes: DEFAULT_CHUNK_SIZES.to_vec(),
            confirmation_phrase: DEFAULT_CONFIRMATION_PHRASE.to_string(),
            tick_interval_ms: 1000,
            counter_key: DEFAULT_COUNTER_KEY.to_string(),
            channel_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> EngineResult<Self> {
        Self::default().with_overrides(env_var)
    }

    /// Defaults, then `path` if given, then environment overrides; validated.
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        let config = match path {
            Some(path) => Self::from_toml_file(path)?.with_overrides(env_var)?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Apply `FEEDWARDEN_*` overrides read through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("FEEDWARDEN_CHUNK_SIZES") {
            self.chunk_sizes = parse_chunk_sizes(&raw)?;
        }
        if let Some(phrase) = lookup("FEEDWARDEN_CONFIRMATION_PHRASE") {
            self.confirmation_phrase = phrase;
        }
        if let Some(raw) = lookup("FEEDWARDEN_TICK_MS") {
            self.tick_interval_ms = parse_number("FEEDWARDEN_TICK_MS", &raw)?;
        }
        if let Some(key) = lookup("FEEDWARDEN_COUNTER_KEY") {
            self.counter_key = key;
        }
        if let Some(raw) = lookup("FEEDWARDEN_CHANNEL_CAPACITY") {
            self.channel_capacity = parse_number("FEEDWARDEN_CHANNEL_CAPACITY", &raw)?;
        }
        Ok(self)
    }

    pub fn with_chunk_sizes(mut self, sizes: impl Into<Vec<usize>>) -> Self {
        self.chunk_sizes = sizes.into();
        self
    }

    pub fn with_confirmation_phrase(mut self, phrase: &str) -> Self {
        self.confirmation_phrase = phrase.to_string();
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.chunk_sizes.is_empty() {
            return Err(EngineError::Config("chunk_sizes must not be empty".into()));
        }
        if self.chunk_sizes.contains(&0) {
            return Err(EngineError::Config("chunk sizes must be positive".into()));
        }
        if self.confirmation_phrase.trim().is_empty() {
            return Err(EngineError::Config(
                "confirmation_phrase must not be empty".into(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(EngineError::Config("tick_interval_ms must be positive".into()));
        }
        if self.counter_key.is_empty() {
            return Err(EngineError::Config("counter_key must not be empty".into()));
        }
        if self.channel_capacity == 0 {
            return Err(EngineError::Config("channel_capacity must be positive".into()));
        }
        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_chunk_sizes(raw: &str) -> EngineResult<Vec<usize>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_number("FEEDWARDEN_CHUNK_SIZES", s))
        .collect()
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> EngineResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| EngineError::Config(format!("{name}: not a number: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.chunk_sizes, vec![19, 20, 21]);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_toml_partial_keeps_defaults() {
        let config = EngineConfig::from_toml_str("chunk_sizes = [10, 12]\n").unwrap();
        assert_eq!(config.chunk_sizes, vec![10, 12]);
        assert_eq!(config.confirmation_phrase, DEFAULT_CONFIRMATION_PHRASE);
        assert_eq!(config.counter_key, DEFAULT_COUNTER_KEY);
    }

    #[test]
    fn test_toml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedwarden.toml");
        std::fs::write(&path, "tick_interval_ms = 250\ncounter_key = \"k\"\n").unwrap();
        let config = EngineConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.tick_interval_ms, 250);
        assert_eq!(config.counter_key, "k");
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("chunk_sizes = \"many\"").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FEEDWARDEN_CHUNK_SIZES", "30, 31"),
            ("FEEDWARDEN_CONFIRMATION_PHRASE", "let me watch"),
            ("FEEDWARDEN_TICK_MS", "500"),
        ]
        .into_iter()
        .collect();
        let config = EngineConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.chunk_sizes, vec![30, 31]);
        assert_eq!(config.confirmation_phrase, "let me watch");
        assert_eq!(config.tick_interval_ms, 500);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let result = EngineConfig::default().with_overrides(|k| {
            (k == "FEEDWARDEN_TICK_MS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_validation() {
        assert!(EngineConfig::default()
            .with_chunk_sizes(Vec::new())
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .with_chunk_sizes(vec![20, 0])
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .with_confirmation_phrase("   ")
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .with_tick_interval(Duration::ZERO)
            .validate()
            .is_err());
    }
}
