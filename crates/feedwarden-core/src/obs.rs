//! Structured observability hooks for engine lifecycle events.
//!
//! This module provides:
//! - Context-scoped tracing spans via the `ContextSpan` RAII guard
//! - Emission functions for navigation contexts, pages, gate transitions,
//!   stale completions and session flushes
//!
//! Filter with `RUST_LOG` (e.g. `RUST_LOG=feedwarden_core=debug`).

use tracing::{debug, info, warn};

use crate::gate::GateState;
use crate::item::{ListKind, PageId};

/// RAII guard that enters a navigation-context span.
///
/// # Example
///
/// ```ignore
/// let _span = ContextSpan::enter(&token.to_string());
/// // every event below carries context = <token>
/// ```
pub struct ContextSpan {
    _span: tracing::span::EnteredSpan,
}

impl ContextSpan {
    pub fn enter(token: &str) -> Self {
        Self {
            _span: context_span(token).entered(),
        }
    }
}

/// The context span itself, for instrumenting async work.
pub fn context_span(token: &str) -> tracing::Span {
    tracing::info_span!("feedwarden.context", context = %token)
}

/// Emit event: a navigation context started for a page kind.
pub fn emit_context_started(token: &str, kind: &str) {
    info!(event = "context.started", context = %token, kind = %kind);
}

/// Emit event: a navigation context was torn down.
pub fn emit_context_torn_down(token: &str) {
    info!(event = "context.torn_down", context = %token);
}

pub fn emit_page_emitted(list: ListKind, page_id: PageId, items: usize) {
    info!(event = "page.emitted", list = %list, page_id = %page_id, items = items);
}

/// Emit event: outcomes applied for a page.
pub fn emit_page_classified(list: ListKind, page_id: PageId, shown: usize, hidden: usize) {
    info!(
        event = "page.classified",
        list = %list,
        page_id = %page_id,
        shown = shown,
        hidden = hidden,
    );
}

/// Emit event: a classification call failed (warning level).
pub fn emit_classification_failed(call: &str, error: &dyn std::fmt::Display) {
    warn!(event = "classification.failed", call = %call, error = %error);
}

pub fn emit_gate_transition(from: GateState, to: GateState) {
    info!(event = "gate.transition", from = %from, to = %to);
}

/// Emit event: a completion for a torn-down context was dropped.
pub fn emit_stale_dropped(token: &str, call: &str) {
    debug!(event = "completion.stale", context = %token, call = %call);
}

pub fn emit_session_flushed(total_seconds: f64, delta_seconds: f64) {
    debug!(
        event = "session.flushed",
        total_seconds = total_seconds,
        delta_seconds = delta_seconds,
    );
}
