//! The classification boundary used by the engine.

use std::sync::Arc;

use async_trait::async_trait;
use feedwarden_store::Criteria;
use tracing::{debug, instrument};

use crate::backend::{BackendConfig, CompletionBackend, HttpBackend};
use crate::error::{ClassifyError, ClassifyResult};
use crate::parse::{parse_shown_set, parse_text, parse_verdict};
use crate::prompt::{analysis_request, filter_request, summary_request, title_request};
use crate::transcript::{HttpTranscriptSource, TranscriptSource};
use crate::verdict::{BatchEntry, ContentRef, ContentSummary, ShownSet, Verdict};

/// Opaque classifier: criteria + item in, typed verdict out.
///
/// Calls may take seconds and may fail; every call is a suspension point
/// for the engine.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Rate the focal item's title against the criteria.
    async fn evaluate_title(&self, criteria: &Criteria, title: &str) -> ClassifyResult<Verdict>;

    /// Pick the subset of a recommendation batch that should be shown.
    async fn filter_batch(
        &self,
        criteria: &Criteria,
        batch: &[BatchEntry],
    ) -> ClassifyResult<ShownSet>;

    /// Summarize and critically analyse the focal item's content.
    async fn summarize(&self, content: &ContentRef) -> ClassifyResult<ContentSummary>;
}

#[async_trait]
impl<T: Classifier + ?Sized> Classifier for Arc<T> {
    async fn evaluate_title(&self, criteria: &Criteria, title: &str) -> ClassifyResult<Verdict> {
        (**self).evaluate_title(criteria, title).await
    }

    async fn filter_batch(
        &self,
        criteria: &Criteria,
        batch: &[BatchEntry],
    ) -> ClassifyResult<ShownSet> {
        (**self).filter_batch(criteria, batch).await
    }

    async fn summarize(&self, content: &ContentRef) -> ClassifyResult<ContentSummary> {
        (**self).summarize(content).await
    }
}

/// Classifier built on a completion backend and the prompt set.
pub struct LlmClassifier<B: CompletionBackend> {
    backend: B,
    transcripts: Option<Arc<dyn TranscriptSource>>,
}

impl<B: CompletionBackend> LlmClassifier<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            transcripts: None,
        }
    }

    /// Enable summarization with the given transcript source.
    pub fn with_transcripts(mut self, source: Arc<dyn TranscriptSource>) -> Self {
        self.transcripts = Some(source);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl LlmClassifier<HttpBackend> {
    /// HTTP backend plus, when configured, the HTTP transcript service.
    pub fn from_config(config: BackendConfig) -> ClassifyResult<Self> {
        let transcript_url = config.transcript_url.clone();
        let transcript_key = config.transcript_key.clone();
        let backend = HttpBackend::new(config)?;
        let mut classifier = LlmClassifier::new(backend);
        if let Some(url) = transcript_url {
            let source = HttpTranscriptSource::new(
                classifier.backend.client().clone(),
                &url,
                transcript_key.as_deref(),
            );
            classifier = classifier.with_transcripts(Arc::new(source));
        }
        Ok(classifier)
    }
}

#[async_trait]
impl<B: CompletionBackend> Classifier for LlmClassifier<B> {
    #[instrument(skip(self, criteria), fields(criteria = %criteria.digest()))]
    async fn evaluate_title(&self, criteria: &Criteria, title: &str) -> ClassifyResult<Verdict> {
        let text = self
            .backend
            .complete(&title_request(criteria, title))
            .await?;
        let verdict = parse_verdict(&text)?;
        debug!(rating = %verdict.rating, "title evaluated");
        Ok(verdict)
    }

    #[instrument(skip(self, criteria, batch), fields(criteria = %criteria.digest(), items = batch.len()))]
    async fn filter_batch(
        &self,
        criteria: &Criteria,
        batch: &[BatchEntry],
    ) -> ClassifyResult<ShownSet> {
        let text = self
            .backend
            .complete(&filter_request(criteria, batch))
            .await?;
        let shown = parse_shown_set(&text)?;
        debug!(shown = shown.len(), "batch filtered");
        Ok(shown)
    }

    #[instrument(skip(self), fields(video_id = %content.video_id))]
    async fn summarize(&self, content: &ContentRef) -> ClassifyResult<ContentSummary> {
        let source = self
            .transcripts
            .as_ref()
            .ok_or_else(|| ClassifyError::Config("no transcript source configured".into()))?;
        let transcript = source.transcript(content).await?;

        let summary_req = summary_request(&transcript);
        let analysis_req = analysis_request(&transcript);
        let (summary, analysis) = tokio::join!(
            self.backend.complete(&summary_req),
            self.backend.complete(&analysis_req)
        );

        Ok(ContentSummary {
            summary: parse_text(&summary?)?,
            analysis: parse_text(&analysis?)?,
        })
    }
}
