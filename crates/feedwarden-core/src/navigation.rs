//! Navigation Coordinator.
//!
//! Owns the live navigation context: its token, the policy and criteria
//! snapshot read at navigation time, the primary gate, the list batchers and
//! the filter pipeline. The playback suspend flag lives here too, so no
//! component reaches for ambient state. Every operation returns a [`Step`]:
//! effects to render and classification calls to dispatch.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use feedwarden_classifier::{ClassifyError, ContentRef, ContentSummary, ShownSet, Verdict};
use feedwarden_store::{Criteria, Settings};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::batcher::{MutationBatcher, PageHeuristic};
use crate::config::EngineConfig;
use crate::effect::Effect;
use crate::error::{EngineError, EngineResult};
use crate::filter::{FilterPipeline, FilterRequest, PageDisposition};
use crate::gate::{FocalItem, GatePolicy, GateState, PrimaryGate};
use crate::item::{ListKind, ObservedNode, PageId};
use crate::metrics::METRICS;
use crate::obs;

// ---------------------------------------------------------------------------
// Page kinds
// ---------------------------------------------------------------------------

const VIDEO_ID_PATTERN: &str = r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#;

fn video_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(VIDEO_ID_PATTERN).ok())
        .as_ref()
}

/// Extract the 11-character video id from a watch, embed or short link.
pub fn extract_video_id(url: &str) -> Option<String> {
    video_id_pattern()?
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn query_param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next().unwrap_or("");
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

fn url_path(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let rest = rest.split(['?', '#']).next().unwrap_or("");
    rest.find('/').map_or("/", |i| &rest[i..])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageKind {
    /// A single focal item.
    Watch { video_id: String },
    /// Home or subscriptions grid.
    Feed,
    Other,
}

impl PageKind {
    pub fn classify(url: &str) -> Self {
        let path = url_path(url);
        if path.contains("/watch") {
            if let Some(video_id) = extract_video_id(url) {
                return PageKind::Watch { video_id };
            }
            // an odd-shaped id is still a focal item and still gets gated
            if let Some(raw) = query_param(url, "v") {
                warn!(url = %url, "unrecognised video id, gating on the raw value");
                return PageKind::Watch {
                    video_id: raw.to_string(),
                };
            }
            warn!(url = %url, "watch page without a video id");
            return PageKind::Other;
        }
        match path.trim_end_matches('/') {
            "" | "/feed/subscriptions" => PageKind::Feed,
            _ => PageKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::Watch { .. } => "watch",
            PageKind::Feed => "feed",
            PageKind::Other => "other",
        }
    }
}

// ---------------------------------------------------------------------------
// Context token, dispatches and completions
// ---------------------------------------------------------------------------

/// Identity of one navigation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextToken(Uuid);

impl ContextToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A classification call the engine must run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Title { criteria: Criteria, title: String },
    Summary { content: ContentRef },
    Filter(FilterRequest),
}

/// Result of a dispatched call, tagged with its owning context.
#[derive(Debug)]
pub struct Completion {
    pub token: ContextToken,
    pub outcome: CompletionOutcome,
}

#[derive(Debug)]
pub enum CompletionOutcome {
    Title(Result<Verdict, ClassifyError>),
    Summary(Result<ContentSummary, ClassifyError>),
    Filter {
        list: ListKind,
        page_id: PageId,
        result: Result<ShownSet, ClassifyError>,
    },
}

impl CompletionOutcome {
    pub fn call(&self) -> &'static str {
        match self {
            CompletionOutcome::Title(_) => "evaluate_title",
            CompletionOutcome::Summary(_) => "summarize",
            CompletionOutcome::Filter { .. } => "filter_batch",
        }
    }

    pub fn error(&self) -> Option<&ClassifyError> {
        match self {
            CompletionOutcome::Title(r) => r.as_ref().err(),
            CompletionOutcome::Summary(r) => r.as_ref().err(),
            CompletionOutcome::Filter { result, .. } => result.as_ref().err(),
        }
    }
}

/// Effects to render and calls to dispatch, in order.
#[derive(Debug, Default)]
pub struct Step {
    pub effects: Vec<Effect>,
    pub dispatches: Vec<Dispatch>,
}

impl Step {
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.dispatches.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Navigation context
// ---------------------------------------------------------------------------

pub struct NavigationContext {
    token: ContextToken,
    kind: PageKind,
    criteria: Criteria,
    settings: Settings,
    gate: Option<PrimaryGate>,
    batchers: HashMap<ListKind, MutationBatcher>,
    filter: FilterPipeline,
}

impl NavigationContext {
    pub fn token(&self) -> ContextToken {
        self.token
    }

    pub fn kind(&self) -> &PageKind {
        &self.kind
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn gate_state(&self) -> Option<GateState> {
        self.gate.as_ref().map(PrimaryGate::state)
    }

    pub fn gate(&self) -> Option<&PrimaryGate> {
        self.gate.as_ref()
    }

    pub fn is_observing(&self, list: ListKind) -> bool {
        self.batchers.contains_key(&list)
    }

    pub fn pages_in_flight(&self) -> usize {
        self.filter.in_flight()
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct NavigationCoordinator {
    config: EngineConfig,
    context: Option<NavigationContext>,
    suspended: bool,
}

impl NavigationCoordinator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            context: None,
            suspended: false,
        }
    }

    pub fn context(&self) -> Option<&NavigationContext> {
        self.context.as_ref()
    }

    pub fn token(&self) -> Option<ContextToken> {
        self.context.as_ref().map(|c| c.token)
    }

    /// Whether playback is currently held.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Append effects, dropping playback changes that are already in force.
    fn push(&mut self, step: &mut Step, effects: impl IntoIterator<Item = Effect>) {
        for effect in effects {
            match effect {
                Effect::SuspendPlayback if self.suspended => continue,
                Effect::ResumePlayback if !self.suspended => continue,
                Effect::SuspendPlayback => self.suspended = true,
                Effect::ResumePlayback => self.suspended = false,
                _ => {}
            }
            step.effects.push(effect);
        }
    }

    /// Navigation started: drop the live context and hold playback.
    pub fn navigation_start(&mut self) -> Step {
        self.teardown();
        let mut step = Step::default();
        self.push(&mut step, [Effect::SuspendPlayback]);
        step
    }

    /// Navigation finished: build the context for `url`.
    pub fn navigation_complete(
        &mut self,
        url: &str,
        title: &str,
        settings: Settings,
        criteria: Criteria,
    ) -> EngineResult<Step> {
        self.teardown();
        let mut step = Step::default();
        self.push(&mut step, [Effect::RemoveOverlays]);
        if settings.hide_shorts_enabled {
            self.push(&mut step, [Effect::HideShorts]);
        }

        let kind = PageKind::classify(url);
        let token = ContextToken::new();
        let mut context = NavigationContext {
            token,
            kind: kind.clone(),
            criteria,
            settings,
            gate: None,
            batchers: HashMap::new(),
            filter: FilterPipeline::new(),
        };
        obs::emit_context_started(&token.to_string(), kind.as_str());

        if context.criteria.is_empty() {
            self.push(&mut step, [Effect::PromptForGoals, Effect::ResumePlayback]);
            self.context = Some(context);
            return Ok(step);
        }

        match &kind {
            PageKind::Watch { video_id } => {
                match GatePolicy::from_settings(&context.settings) {
                    Some(policy) => {
                        let focal = FocalItem {
                            video_id: video_id.clone(),
                            url: url.to_string(),
                            title: if title.trim().is_empty() {
                                video_id.clone()
                            } else {
                                title.to_string()
                            },
                        };
                        let mut gate = PrimaryGate::new(policy, &self.config.confirmation_phrase)
                            .with_hidden_comments(context.settings.comments_disabled);
                        let (effects, requests) = gate.engage(focal)?;
                        if policy == GatePolicy::Advisory {
                            self.push(&mut step, [Effect::ResumePlayback]);
                        }
                        self.push(&mut step, effects);
                        step.dispatches.push(Dispatch::Title {
                            criteria: context.criteria.clone(),
                            title: requests.title,
                        });
                        step.dispatches.push(Dispatch::Summary {
                            content: requests.content,
                        });
                        gate.dispatched()?;
                        context.gate = Some(gate);
                    }
                    None => self.push(&mut step, [Effect::ResumePlayback]),
                }
                if context.settings.filter_enabled {
                    context.batchers.insert(
                        ListKind::Recommendations,
                        MutationBatcher::new(
                            ListKind::Recommendations,
                            PageHeuristic::ChunkSizes(self.config.chunk_sizes.clone()),
                        ),
                    );
                }
            }
            PageKind::Feed => {
                self.push(&mut step, [Effect::ResumePlayback]);
                if context.settings.filter_enabled {
                    context.batchers.insert(
                        ListKind::Feed,
                        MutationBatcher::new(ListKind::Feed, PageHeuristic::Quiescence),
                    );
                }
            }
            PageKind::Other => self.push(&mut step, [Effect::ResumePlayback]),
        }

        self.context = Some(context);
        Ok(step)
    }

    /// An observation burst for one list of the live context.
    pub fn list_mutated(&mut self, list: ListKind, nodes: &[ObservedNode]) -> Step {
        let mut step = Step::default();
        let Some((effects, request)) = self.submit_page(list, nodes) else {
            return step;
        };
        self.push(&mut step, effects);
        step.dispatches.push(Dispatch::Filter(request));
        step
    }

    fn submit_page(
        &mut self,
        list: ListKind,
        nodes: &[ObservedNode],
    ) -> Option<(Vec<Effect>, FilterRequest)> {
        let context = self.context.as_mut()?;
        let Some(batcher) = context.batchers.get_mut(&list) else {
            debug!(list = %list, "no batcher for list");
            return None;
        };
        let page = batcher.on_observation(nodes)?;
        METRICS.inc_pages_emitted();
        obs::emit_page_emitted(list, page.id(), page.len());
        Some(context.filter.submit(page, &context.criteria))
    }

    /// New criteria apply to pages submitted from now on.
    pub fn update_criteria(&mut self, criteria: Criteria) {
        if let Some(context) = self.context.as_mut() {
            context.criteria = criteria;
        }
    }

    /// Route a completion into the live context, rejecting stale ones.
    pub fn complete(&mut self, completion: Completion) -> EngineResult<Step> {
        let live = self.token();
        if live != Some(completion.token) {
            return Err(EngineError::StaleContext {
                token: completion.token.to_string(),
            });
        }
        let mut step = Step::default();
        let Some(context) = self.context.as_mut() else {
            return Ok(step);
        };

        let effects = match completion.outcome {
            CompletionOutcome::Title(result) => match context.gate.as_mut() {
                Some(gate) => gate.on_verdict(result)?,
                None => return Err(EngineError::transition("no gate", "resolved")),
            },
            CompletionOutcome::Summary(result) => match context.gate.as_mut() {
                Some(gate) => gate.on_summary(result),
                None => Vec::new(),
            },
            CompletionOutcome::Filter {
                list,
                page_id,
                result,
            } => {
                let (disposition, effects) = context.filter.complete(list, page_id, result)?;
                if let PageDisposition::Applied(outcomes) = &disposition {
                    let shown = outcomes.values().filter(|o| o.visible).count();
                    METRICS.add_items_classified(outcomes.len() as u64);
                    obs::emit_page_classified(list, page_id, shown, outcomes.len() - shown);
                }
                effects
            }
        };
        self.push(&mut step, effects);
        Ok(step)
    }

    /// Typed override input for a flagged focal item.
    pub fn override_input(&mut self, text: &str) -> EngineResult<Step> {
        let gate = self
            .context
            .as_mut()
            .and_then(|c| c.gate.as_mut())
            .ok_or_else(|| EngineError::transition("no gate", GateState::Unblocked))?;
        let effects = gate.confirm(text)?;
        let mut step = Step::default();
        self.push(&mut step, effects);
        Ok(step)
    }

    /// Tear down the live context; late completions for it become stale.
    pub fn teardown(&mut self) {
        let Some(mut context) = self.context.take() else {
            return;
        };
        if let Some(gate) = context.gate.as_mut() {
            gate.teardown();
        }
        for batcher in context.batchers.values_mut() {
            batcher.stop();
        }
        context.filter.clear();
        obs::emit_context_torn_down(&context.token.to_string());
    }
}
