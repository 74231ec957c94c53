//! Feedwarden-Core: goal-driven gating for continuously mutating feeds
//!
//! The engine watches a live, asynchronously rendered list, decides when a
//! batch of new items is complete, asks the classifier about each batch and
//! the focal item, and applies the answers back as render effects.
//!
//! ## Key Components
//!
//! - `MutationBatcher`: observation bursts in, complete pages out
//! - `FilterPipeline`: one locked batch request per page, all-or-nothing outcomes
//! - `PrimaryGate`: blocks the focal item until its verdict (or override)
//! - `SessionTracker`: foreground time, paused while hidden
//! - `NavigationCoordinator`: per-navigation context, stale completion rejection
//! - `Engine`: the single-threaded scheduler loop tying it together

pub mod batcher;
pub mod clock;
pub mod config;
pub mod effect;
pub mod engine;
mod error;
pub mod filter;
pub mod gate;
pub mod item;
pub mod metrics;
pub mod navigation;
pub mod obs;
pub mod session;
pub mod telemetry;

pub use batcher::{BatcherState, MutationBatcher, PageHeuristic};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use effect::{Effect, IndicatorTarget, PrimaryReport, RecordingSurface, Surface};
pub use engine::{Engine, EngineDeps, EngineHandle, HostSignal};
pub use error::{EngineError, EngineResult};
pub use filter::{outcomes_for, FilterPipeline, FilterRequest, PageDisposition};
pub use gate::{FocalItem, GatePolicy, GateState, PrimaryGate, Resolution};
pub use item::{
    Item, ItemId, ListKind, NodeRef, ObservedNode, Outcome, OutcomeMap, Page, PageId,
};
pub use navigation::{
    extract_video_id, Completion, CompletionOutcome, ContextToken, Dispatch,
    NavigationCoordinator, PageKind, Step,
};
pub use session::{SessionSnapshot, SessionState, SessionTracker};

pub use metrics::METRICS;
pub use obs::{
    emit_classification_failed, emit_context_started, emit_context_torn_down,
    emit_gate_transition, emit_page_classified, emit_page_emitted, emit_session_flushed,
    emit_stale_dropped, ContextSpan,
};
pub use telemetry::init_tracing;

/// Feedwarden version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
