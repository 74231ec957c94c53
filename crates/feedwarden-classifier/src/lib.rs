//! Feedwarden-Classifier: the Classification Client boundary
//!
//! The engine treats classification as a black box: criteria plus an item
//! description in, a typed verdict out, or a typed failure. This crate
//! provides that box.
//!
//! ## Key Components
//!
//! - `Classifier`: the async boundary trait the engine calls
//! - `LlmClassifier`: prompts + typed parsing over a `CompletionBackend`
//! - `HttpBackend`: OpenAI, Groq, Anthropic, Gemini and local chat endpoints
//! - `ErrorStatusBoard`: process-wide auth/rate-limit status
//! - `fakes`: scripted classifiers and backends for tests and offline runs

pub mod backend;
pub mod classifier;
mod error;
pub mod fakes;
pub mod parse;
pub mod prompt;
pub mod status;
pub mod transcript;
pub mod verdict;

pub use backend::{BackendConfig, CompletionBackend, HttpBackend, Provider};
pub use classifier::{Classifier, LlmClassifier};
pub use error::{ClassifyError, ClassifyResult};
pub use prompt::{CompletionRequest, ResponseShape};
pub use status::{badge_text, ErrorStatusBoard};
pub use transcript::{HttpTranscriptSource, TranscriptSource};
pub use verdict::{
    BatchEntry, ContentRef, ContentSummary, Rating, ShownEntry, ShownSet, Verdict,
};
