//! Feedwarden-Store: persistence boundaries for the Feedwarden engine
//!
//! The engine treats storage as an external collaborator. This crate defines
//! the boundaries it reads through and two implementations of them.
//!
//! ## Key Components
//!
//! - `GoalStore`: inclusion/exclusion criteria, read-only to the engine
//! - `SettingsStore`: policy flags and the process-wide `ErrorStatus`
//! - `CounterStore`: persisted numeric counters (session time)
//! - `NoteStore`: saved notes per page URL
//! - `fakes`: in-memory implementations for tests
//! - `JsonFileStore`: single-document JSON file backend

mod error;
pub mod fakes;
pub mod json_file;
pub mod storage_traits;

pub use error::StoreError;
pub use json_file::{JsonFileStore, StateDocument};
pub use storage_traits::{
    CounterStore, Criteria, CriteriaDigest, ErrorKind, ErrorStatus, GoalStore, Note, NoteStore,
    Settings, SettingsStore, StoreResult,
};
