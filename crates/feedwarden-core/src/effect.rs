//! Render effects and the surface they are delivered to.
//!
//! The engine never touches the page directly. Every visible consequence of
//! a decision is an [`Effect`] handed to the host's [`Surface`].

use std::sync::{Arc, Mutex};

use feedwarden_classifier::Rating;
use serde::{Deserialize, Serialize};

use crate::item::{ItemId, ListKind, OutcomeMap};

/// Where an analyzing indicator is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorTarget {
    Primary,
    Recommendations,
    Feed,
}

impl From<ListKind> for IndicatorTarget {
    fn from(list: ListKind) -> Self {
        match list {
            ListKind::Recommendations => IndicatorTarget::Recommendations,
            ListKind::Feed => IndicatorTarget::Feed,
        }
    }
}

/// Verdict tuple exposed for rendering the primary item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryReport {
    pub verdict: Rating,
    pub rationale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// De-emphasize and disable items pending classification.
    LockItems { list: ListKind, ids: Vec<ItemId> },
    /// Apply a page's outcomes in one step.
    ApplyOutcomes { list: ListKind, outcomes: OutcomeMap },
    ShowAnalyzing { target: IndicatorTarget },
    HideAnalyzing { target: IndicatorTarget },
    HidePrimary,
    ShowPrimary,
    SuspendPlayback,
    ResumePlayback,
    /// Approved (or advisory) verdict overlay.
    RenderVerdict { report: PrimaryReport },
    /// Flagged verdict with the typed override control.
    RenderWarning {
        report: PrimaryReport,
        confirmation_phrase: String,
    },
    /// Summary that arrived after the verdict was rendered.
    RenderSummary { summary: String, analysis: String },
    DismissWarning,
    RemoveOverlays,
    HideShorts,
    HideComments,
    PromptForGoals,
    SetBadge { text: String },
}

/// Receiver of render effects.
pub trait Surface: Send + Sync {
    fn render(&mut self, effect: Effect);
}

impl<F: FnMut(Effect) + Send + Sync> Surface for F {
    fn render(&mut self, effect: Effect) {
        self(effect)
    }
}

/// Surface that keeps every effect; clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    log: Arc<Mutex<Vec<Effect>>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effects(&self) -> Vec<Effect> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn take(&self) -> Vec<Effect> {
        self.log
            .lock()
            .map(|mut log| std::mem::take(&mut *log))
            .unwrap_or_default()
    }

    pub fn contains(&self, effect: &Effect) -> bool {
        self.effects().contains(effect)
    }
}

impl Surface for RecordingSurface {
    fn render(&mut self, effect: Effect) {
        if let Ok(mut log) = self.log.lock() {
            log.push(effect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effects_serialize_tagged() {
        let json = serde_json::to_value(Effect::SetBadge { text: "!".into() }).unwrap();
        assert_eq!(json["effect"], "set_badge");
        assert_eq!(json["text"], "!");

        let json = serde_json::to_value(Effect::LockItems {
            list: ListKind::Feed,
            ids: vec![ItemId::new(3)],
        })
        .unwrap();
        assert_eq!(json["list"], "feed");
        assert_eq!(json["ids"][0], "video-3");
    }

    #[test]
    fn test_recording_surface_shares_log() {
        let surface = RecordingSurface::new();
        let mut writer = surface.clone();
        writer.render(Effect::HideShorts);
        assert_eq!(surface.effects(), vec![Effect::HideShorts]);
        assert_eq!(surface.take().len(), 1);
        assert!(surface.effects().is_empty());
    }

    #[test]
    fn test_closure_is_a_surface() {
        let mut seen = Vec::new();
        {
            let mut surface = |e: Effect| seen.push(e);
            surface.render(Effect::PromptForGoals);
        }
        assert_eq!(seen, vec![Effect::PromptForGoals]);
    }
}
