//! Primary Item Gate.
//!
//! Lifecycle of the single focal item:
//!
//! ```text
//! Idle -> Blocking -> AwaitingVerdict -> Resolved(Approved)
//!                                     -> Resolved(Flagged) -> Unblocked
//! ```
//!
//! In advisory mode (evaluation on, blocking off) nothing is suspended and
//! the gate goes `Idle -> AwaitingVerdict` directly; every verdict resolves
//! `Approved`. Only the verdict classification drives gating; the summary is
//! joined in for rendering whenever it lands.

use std::fmt;

use feedwarden_classifier::{ClassifyError, ContentRef, ContentSummary, Verdict};
use feedwarden_store::Settings;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::effect::{Effect, IndicatorTarget, PrimaryReport};
use crate::error::{EngineError, EngineResult};
use crate::obs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Approved,
    Flagged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Idle,
    Blocking,
    AwaitingVerdict,
    Resolved(Resolution),
    Unblocked,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateState::Idle => f.write_str("idle"),
            GateState::Blocking => f.write_str("blocking"),
            GateState::AwaitingVerdict => f.write_str("awaiting_verdict"),
            GateState::Resolved(Resolution::Approved) => f.write_str("resolved(approved)"),
            GateState::Resolved(Resolution::Flagged) => f.write_str("resolved(flagged)"),
            GateState::Unblocked => f.write_str("unblocked"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePolicy {
    /// Suspend interaction until an approving verdict or override.
    Blocking,
    /// Evaluate and render only.
    Advisory,
}

impl GatePolicy {
    /// `None` when neither blocking nor evaluation is enabled.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        if settings.blocker_enabled {
            Some(GatePolicy::Blocking)
        } else if settings.video_eval_enabled {
            Some(GatePolicy::Advisory)
        } else {
            None
        }
    }
}

/// The item the gate is judging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocalItem {
    pub video_id: String,
    pub url: String,
    pub title: String,
}

impl FocalItem {
    pub fn content(&self) -> ContentRef {
        ContentRef {
            video_id: self.video_id.clone(),
            url: self.url.clone(),
        }
    }
}

/// The two independent requests to dispatch after engaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRequests {
    pub title: String,
    pub content: ContentRef,
}

pub struct PrimaryGate {
    policy: GatePolicy,
    phrase: String,
    hide_comments: bool,
    state: GateState,
    focal: Option<FocalItem>,
    verdict: Option<Verdict>,
    summary: Option<ContentSummary>,
    history: Vec<GateState>,
}

impl PrimaryGate {
    pub fn new(policy: GatePolicy, phrase: impl Into<String>) -> Self {
        Self {
            policy,
            phrase: phrase.into(),
            hide_comments: false,
            state: GateState::Idle,
            focal: None,
            verdict: None,
            summary: None,
            history: vec![GateState::Idle],
        }
    }

    /// Also hide comments whenever a verdict is rendered.
    pub fn with_hidden_comments(mut self, hide: bool) -> Self {
        self.hide_comments = hide;
        self
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    /// Every state entered, oldest first.
    pub fn history(&self) -> &[GateState] {
        &self.history
    }

    pub fn focal(&self) -> Option<&FocalItem> {
        self.focal.as_ref()
    }

    pub fn is_suspending(&self) -> bool {
        self.policy == GatePolicy::Blocking
            && matches!(
                self.state,
                GateState::Blocking
                    | GateState::AwaitingVerdict
                    | GateState::Resolved(Resolution::Flagged)
            )
    }

    fn set(&mut self, next: GateState) {
        obs::emit_gate_transition(self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn report(&self) -> Option<PrimaryReport> {
        let verdict = self.verdict.as_ref()?;
        Some(PrimaryReport {
            verdict: verdict.rating,
            rationale: verdict.rationale.clone(),
            summary: self.summary.as_ref().map(|s| s.summary.clone()),
            analysis: self.summary.as_ref().map(|s| s.analysis.clone()),
        })
    }

    /// Start judging a focal item.
    pub fn engage(&mut self, focal: FocalItem) -> EngineResult<(Vec<Effect>, GateRequests)> {
        if self.state != GateState::Idle {
            return Err(EngineError::transition(self.state, "engaged"));
        }
        let mut effects = Vec::new();
        if self.policy == GatePolicy::Blocking {
            self.set(GateState::Blocking);
            effects.push(Effect::HidePrimary);
            effects.push(Effect::SuspendPlayback);
        }
        effects.push(Effect::ShowAnalyzing {
            target: IndicatorTarget::Primary,
        });

        let requests = GateRequests {
            title: focal.title.clone(),
            content: focal.content(),
        };
        self.focal = Some(focal);
        Ok((effects, requests))
    }

    /// Both requests are in flight.
    pub fn dispatched(&mut self) -> EngineResult<()> {
        match (self.policy, self.state) {
            (GatePolicy::Blocking, GateState::Blocking) => {}
            (GatePolicy::Advisory, GateState::Idle) if self.focal.is_some() => {}
            (_, state) => return Err(EngineError::transition(state, GateState::AwaitingVerdict)),
        }
        self.set(GateState::AwaitingVerdict);
        Ok(())
    }

    /// Apply the verdict classification. A failure keeps the gate where it
    /// is, blocked and without overlay text.
    pub fn on_verdict(&mut self, result: Result<Verdict, ClassifyError>) -> EngineResult<Vec<Effect>> {
        if self.state != GateState::AwaitingVerdict {
            return Err(EngineError::transition(self.state, "resolved"));
        }
        let mut effects = vec![Effect::HideAnalyzing {
            target: IndicatorTarget::Primary,
        }];

        let verdict = match result {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(error = %err, state = %self.state, "verdict failed, item stays blocked");
                return Ok(effects);
            }
        };
        let resolution = match self.policy {
            GatePolicy::Advisory => Resolution::Approved,
            GatePolicy::Blocking if verdict.rating.is_relevant() => Resolution::Approved,
            GatePolicy::Blocking => Resolution::Flagged,
        };
        self.verdict = Some(verdict);
        self.set(GateState::Resolved(resolution));

        let Some(report) = self.report() else {
            return Ok(effects);
        };
        match resolution {
            Resolution::Approved => {
                if self.policy == GatePolicy::Blocking {
                    effects.push(Effect::ShowPrimary);
                    effects.push(Effect::ResumePlayback);
                }
                effects.push(Effect::RenderVerdict { report });
            }
            Resolution::Flagged => {
                effects.push(Effect::RenderWarning {
                    report,
                    confirmation_phrase: self.phrase.clone(),
                });
            }
        }
        if self.hide_comments {
            effects.push(Effect::HideComments);
        }
        Ok(effects)
    }

    /// Join the summary; rendered now if the verdict already is.
    pub fn on_summary(&mut self, result: Result<ContentSummary, ClassifyError>) -> Vec<Effect> {
        let summary = match result {
            Ok(summary) => summary,
            Err(err) => {
                debug!(error = %err, "summary unavailable");
                return Vec::new();
            }
        };
        let rendered = matches!(self.state, GateState::Resolved(_) | GateState::Unblocked);
        let effect = rendered.then(|| Effect::RenderSummary {
            summary: summary.summary.clone(),
            analysis: summary.analysis.clone(),
        });
        if self.focal.is_some() {
            self.summary = Some(summary);
        }
        effect.into_iter().collect()
    }

    /// Manual override. Only the exact phrase unblocks; anything else leaves
    /// the state unchanged.
    pub fn confirm(&mut self, input: &str) -> EngineResult<Vec<Effect>> {
        if self.state != GateState::Resolved(Resolution::Flagged) {
            return Err(EngineError::transition(self.state, GateState::Unblocked));
        }
        if input != self.phrase {
            debug!("override input did not match");
            return Ok(Vec::new());
        }
        self.set(GateState::Unblocked);
        let mut effects = vec![
            Effect::DismissWarning,
            Effect::ShowPrimary,
            Effect::ResumePlayback,
        ];
        // the decision stays on screen after the override
        if let Some(report) = self.report() {
            effects.push(Effect::RenderVerdict { report });
        }
        Ok(effects)
    }

    /// Navigation teardown.
    pub fn teardown(&mut self) {
        if self.state != GateState::Idle {
            self.set(GateState::Idle);
        }
        self.focal = None;
        self.verdict = None;
        self.summary = None;
    }
}
