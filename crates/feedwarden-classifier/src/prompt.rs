//! Prompt construction for the three classifier calls.

use feedwarden_store::Criteria;
use serde::Serialize;
use serde_json::{json, Value};

use crate::verdict::BatchEntry;

/// Shape the reply is expected to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// `{"evaluation_rating", "evaluation_context"}`
    Verdict,
    /// `{"videos": [{"id", "reason"}]}`
    ShownList,
    /// Markdown prose
    FreeText,
}

impl ResponseShape {
    /// JSON schema for backends that accept structured-output constraints.
    pub fn schema(&self) -> Option<Value> {
        match self {
            ResponseShape::Verdict => Some(json!({
                "type": "OBJECT",
                "properties": {
                    "evaluation_rating": {
                        "type": "STRING",
                        "enum": ["relevant", "not_sure", "irrelevant", "avoid"]
                    },
                    "evaluation_context": { "type": "STRING" }
                },
                "required": ["evaluation_rating", "evaluation_context"]
            })),
            ResponseShape::ShownList => Some(json!({
                "type": "OBJECT",
                "properties": {
                    "videos": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "id": { "type": "STRING", "nullable": false },
                                "reason": { "type": "STRING", "nullable": false }
                            },
                            "required": ["id", "reason"]
                        }
                    }
                },
                "required": ["videos"]
            })),
            ResponseShape::FreeText => None,
        }
    }

    pub fn expects_json(&self) -> bool {
        !matches!(self, ResponseShape::FreeText)
    }
}

/// A single completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub shape: ResponseShape,
}

const TITLE_SYSTEM: &str = "You help a viewer stay on track with their goals. \
Rate whether a video is relevant to the goals, should be avoided, or is uncertain. \
Reply with pure JSON and nothing else, holding exactly two fields: \
\"evaluation_rating\" and \"evaluation_context\". \
evaluation_rating is one of \"relevant\", \"not_sure\", \"irrelevant\", \"avoid\". \
evaluation_context is one user-facing sentence in English whose tone follows the rating: \
positive for relevant, neutral for not_sure, encouraging the viewer back on track for irrelevant, \
teasing but firm for avoid. Do not prefix the reply with the word json.";

const FILTER_SYSTEM: &str = "You help a viewer stay on track with their goals. \
Judge every video in the list against all of the viewer's goals; an unrelated video is a distraction. \
Reply with pure JSON listing only the videos that should be shown, each with the reason to show it: \
{\"videos\": [{\"id\": \"video-id\", \"reason\": \"why it is shown\"}]}. \
Do not prefix the reply with the word json.";

const SUMMARY_SYSTEM: &str = "You write concise, engaging summaries of videos from their transcripts. \
Cover the main topics, the key points and any notable quotes in 150 to 200 words. \
Do not prefix the reply with the word json.";

const ANALYSIS_SYSTEM: &str = "You are a video critic judging quality and credibility from a transcript alone. \
Do not summarize. Assess factual accuracy and flag misleading claims, judge bias and objectivity, \
judge relevance and depth, and reflect on engagement and impact. Keep the reply to 200 to 250 words.";

/// Title verdict request for the focal item.
pub fn title_request(criteria: &Criteria, title: &str) -> CompletionRequest {
    CompletionRequest {
        system: TITLE_SYSTEM.to_string(),
        prompt: format!(
            "Given the user's goal: \"{}\", and videos to avoid: \"{}\", evaluate the following video title: \"{}\".",
            criteria.include, criteria.exclude, title
        ),
        shape: ResponseShape::Verdict,
    }
}

/// One request for a whole page of recommendations.
pub fn filter_request(criteria: &Criteria, batch: &[BatchEntry]) -> CompletionRequest {
    let videos = json!({ "videos": batch });
    CompletionRequest {
        system: FILTER_SYSTEM.to_string(),
        prompt: format!(
            "Given the user's goal: \"{}\", and videos to avoid: \"{}\", evaluate the following video data: {}. \
Only include the videos that should be shown, each with its reason.",
            criteria.include, criteria.exclude, videos
        ),
        shape: ResponseShape::ShownList,
    }
}

/// Summary request over a joined transcript.
pub fn summary_request(transcript: &str) -> CompletionRequest {
    CompletionRequest {
        system: SUMMARY_SYSTEM.to_string(),
        prompt: transcript.to_string(),
        shape: ResponseShape::FreeText,
    }
}

/// Critical analysis request over a joined transcript.
pub fn analysis_request(transcript: &str) -> CompletionRequest {
    CompletionRequest {
        system: ANALYSIS_SYSTEM.to_string(),
        prompt: transcript.to_string(),
        shape: ResponseShape::FreeText,
    }
}
