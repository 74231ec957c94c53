//! Typed classification results.

use serde::{Deserialize, Serialize};

/// Categorical judgment on a single item against the user's criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Relevant,
    NotSure,
    Irrelevant,
    Avoid,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Relevant => "relevant",
            Rating::NotSure => "not_sure",
            Rating::Irrelevant => "irrelevant",
            Rating::Avoid => "avoid",
        }
    }

    pub fn is_relevant(&self) -> bool {
        matches!(self, Rating::Relevant)
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for the focal item: rating plus user-facing rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub rating: Rating,
    pub rationale: String,
}

impl Verdict {
    pub fn new(rating: Rating, rationale: impl Into<String>) -> Self {
        Self {
            rating,
            rationale: rationale.into(),
        }
    }
}

/// One recommendation item as sent to the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub id: String,
    pub title: String,
}

impl BatchEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// An item the classifier chose to show, with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShownEntry {
    pub id: String,
    pub reason: String,
}

/// The subset of a batch that should be shown. Ids absent here are hidden.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShownSet {
    entries: Vec<ShownEntry>,
}

impl ShownSet {
    /// Build from entries; later duplicates of an id are dropped.
    pub fn new(entries: Vec<ShownEntry>) -> Self {
        let mut deduped: Vec<ShownEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !deduped.iter().any(|e| e.id == entry.id) {
                deduped.push(entry);
            }
        }
        Self { entries: deduped }
    }

    pub fn reason_for(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.reason.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.reason_for(id).is_some()
    }

    pub fn entries(&self) -> &[ShownEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reference to the focal item's content, for summarization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub video_id: String,
    pub url: String,
}

/// Summary and critical analysis of the focal item's transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSummary {
    pub summary: String,
    pub analysis: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_round_trip_names() {
        for rating in [
            Rating::Relevant,
            Rating::NotSure,
            Rating::Irrelevant,
            Rating::Avoid,
        ] {
            let json = serde_json::to_string(&rating).unwrap();
            assert_eq!(json, format!("\"{}\"", rating.as_str()));
        }
    }

    #[test]
    fn test_shown_set_first_duplicate_wins() {
        let set = ShownSet::new(vec![
            ShownEntry {
                id: "video-1".into(),
                reason: "on topic".into(),
            },
            ShownEntry {
                id: "video-1".into(),
                reason: "second opinion".into(),
            },
        ]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.reason_for("video-1"), Some("on topic"));
        assert!(!set.contains("video-2"));
    }
}
