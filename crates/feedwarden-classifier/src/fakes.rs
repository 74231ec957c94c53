//! Fakes for the classification boundary (testing and offline runs)
//!
//! - `ScriptedClassifier`: per-call queued responses, optional hold gate
//! - `StaticBackend`: canned completion text, records requests
//! - `PermissiveClassifier`: shows everything, rates every title `not_sure`

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use feedwarden_store::Criteria;
use tokio::sync::Semaphore;

use crate::backend::CompletionBackend;
use crate::classifier::Classifier;
use crate::error::{ClassifyError, ClassifyResult};
use crate::prompt::CompletionRequest;
use crate::verdict::{
    BatchEntry, ContentRef, ContentSummary, Rating, ShownEntry, ShownSet, Verdict,
};

fn unscripted(call: &str) -> ClassifyError {
    ClassifyError::Transport(format!("no scripted response for {call}"))
}

// ---------------------------------------------------------------------------
// ScriptedClassifier
// ---------------------------------------------------------------------------

/// Classifier answering from per-method queues. An exhausted queue yields a
/// transport error. With a gate installed, every call first waits for a
/// permit released through [`ScriptedClassifier::release`].
#[derive(Default)]
pub struct ScriptedClassifier {
    titles: Mutex<VecDeque<ClassifyResult<Verdict>>>,
    batches: Mutex<VecDeque<ClassifyResult<ShownSet>>>,
    summaries: Mutex<VecDeque<ClassifyResult<ContentSummary>>>,
    seen_batches: Mutex<Vec<Vec<BatchEntry>>>,
    seen_filter_criteria: Mutex<Vec<Criteria>>,
    seen_titles: Mutex<Vec<String>>,
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call until permits are released.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `n` held calls proceed.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn title_ok(self, verdict: Verdict) -> Self {
        self.titles.lock().unwrap().push_back(Ok(verdict));
        self
    }

    pub fn title_err(self, err: ClassifyError) -> Self {
        self.titles.lock().unwrap().push_back(Err(err));
        self
    }

    /// Queue a filter reply showing `ids` with a fixed reason.
    pub fn filter_ok<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = ids
            .into_iter()
            .map(|id| ShownEntry {
                id: id.into(),
                reason: "matches goals".to_string(),
            })
            .collect();
        self.batches
            .lock()
            .unwrap()
            .push_back(Ok(ShownSet::new(entries)));
        self
    }

    pub fn filter_err(self, err: ClassifyError) -> Self {
        self.batches.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn summary_ok(self, summary: &str, analysis: &str) -> Self {
        self.summaries.lock().unwrap().push_back(Ok(ContentSummary {
            summary: summary.to_string(),
            analysis: analysis.to_string(),
        }));
        self
    }

    pub fn summary_err(self, err: ClassifyError) -> Self {
        self.summaries.lock().unwrap().push_back(Err(err));
        self
    }

    /// Total calls across all methods.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Batches received by `filter_batch`, in call order.
    pub fn seen_batches(&self) -> Vec<Vec<BatchEntry>> {
        self.seen_batches.lock().unwrap().clone()
    }

    /// Criteria each `filter_batch` call was judged under, in call order.
    pub fn seen_filter_criteria(&self) -> Vec<Criteria> {
        self.seen_filter_criteria.lock().unwrap().clone()
    }

    /// Titles received by `evaluate_title`, in call order.
    pub fn seen_titles(&self) -> Vec<String> {
        self.seen_titles.lock().unwrap().clone()
    }

    async fn pass_gate(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn evaluate_title(&self, _criteria: &Criteria, title: &str) -> ClassifyResult<Verdict> {
        self.seen_titles.lock().unwrap().push(title.to_string());
        self.pass_gate().await;
        let next = self.titles.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(unscripted("evaluate_title")))
    }

    async fn filter_batch(
        &self,
        criteria: &Criteria,
        batch: &[BatchEntry],
    ) -> ClassifyResult<ShownSet> {
        self.seen_batches.lock().unwrap().push(batch.to_vec());
        self.seen_filter_criteria
            .lock()
            .unwrap()
            .push(criteria.clone());
        self.pass_gate().await;
        let next = self.batches.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(unscripted("filter_batch")))
    }

    async fn summarize(&self, _content: &ContentRef) -> ClassifyResult<ContentSummary> {
        self.pass_gate().await;
        let next = self.summaries.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(unscripted("summarize")))
    }
}

// ---------------------------------------------------------------------------
// StaticBackend
// ---------------------------------------------------------------------------

/// Completion backend replaying queued replies and recording requests.
#[derive(Default)]
pub struct StaticBackend {
    replies: Mutex<VecDeque<ClassifyResult<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl StaticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, err: ClassifyError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for StaticBackend {
    async fn complete(&self, request: &CompletionRequest) -> ClassifyResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(unscripted("complete")))
    }
}

// ---------------------------------------------------------------------------
// PermissiveClassifier
// ---------------------------------------------------------------------------

/// Offline stand-in: shows every recommendation, rates every title `not_sure`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveClassifier;

#[async_trait]
impl Classifier for PermissiveClassifier {
    async fn evaluate_title(&self, _criteria: &Criteria, _title: &str) -> ClassifyResult<Verdict> {
        Ok(Verdict::new(
            Rating::NotSure,
            "Offline mode: no classifier was consulted.",
        ))
    }

    async fn filter_batch(
        &self,
        _criteria: &Criteria,
        batch: &[BatchEntry],
    ) -> ClassifyResult<ShownSet> {
        Ok(ShownSet::new(
            batch
                .iter()
                .map(|e| ShownEntry {
                    id: e.id.clone(),
                    reason: "offline".to_string(),
                })
                .collect(),
        ))
    }

    async fn summarize(&self, content: &ContentRef) -> ClassifyResult<ContentSummary> {
        Err(ClassifyError::Config(format!(
            "offline mode cannot summarize {}",
            content.video_id
        )))
    }
}
