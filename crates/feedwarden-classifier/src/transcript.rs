//! Transcript retrieval for summarization.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ClassifyError, ClassifyResult};
use crate::verdict::ContentRef;

/// Fetches the spoken text of an item.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Full transcript, segments joined with single spaces.
    async fn transcript(&self, content: &ContentRef) -> ClassifyResult<String>;
}

#[derive(Deserialize)]
struct TranscriptReply {
    data: TranscriptData,
}

#[derive(Deserialize)]
struct TranscriptData {
    transcripts: Transcripts,
}

#[derive(Deserialize)]
struct Transcripts {
    en_auto: TranscriptTrack,
}

#[derive(Deserialize)]
struct TranscriptTrack {
    #[serde(default)]
    default: Vec<TranscriptSegment>,
}

#[derive(Deserialize)]
struct TranscriptSegment {
    #[serde(default)]
    text: String,
}

/// Join the segment texts of a transcript service reply.
pub(crate) fn join_segments(body: &str) -> ClassifyResult<String> {
    let reply: TranscriptReply = serde_json::from_str(body)
        .map_err(|e| ClassifyError::Malformed(format!("unexpected transcript shape: {e}")))?;
    let joined = reply
        .data
        .transcripts
        .en_auto
        .default
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        return Err(ClassifyError::Malformed("transcript is empty".into()));
    }
    Ok(joined)
}

/// Transcript service over HTTP (`GET <url>?video_id=..&platform=youtube`).
pub struct HttpTranscriptSource {
    url: String,
    key: Option<String>,
    http_client: reqwest::Client,
}

impl HttpTranscriptSource {
    pub fn new(http_client: reqwest::Client, url: &str, key: Option<&str>) -> Self {
        Self {
            url: url.to_string(),
            key: key.map(str::to_string),
            http_client,
        }
    }

    fn host(&self) -> Option<&str> {
        self.url
            .split("://")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
    }
}

#[async_trait]
impl TranscriptSource for HttpTranscriptSource {
    async fn transcript(&self, content: &ContentRef) -> ClassifyResult<String> {
        let mut request = self.http_client.get(&self.url).query(&[
            ("video_id", content.video_id.as_str()),
            ("platform", "youtube"),
        ]);
        if let Some(key) = &self.key {
            request = request.header("x-rapidapi-key", key);
            if let Some(host) = self.host() {
                request = request.header("x-rapidapi-host", host);
            }
        }

        debug!(video_id = %content.video_id, "fetching transcript");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClassifyError::from_status(status.as_u16(), body));
        }
        join_segments(&body)
    }
}
