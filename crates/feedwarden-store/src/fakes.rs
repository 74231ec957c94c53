//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryGoalStore`, `MemorySettingsStore`, `MemoryCounterStore`
//! and `MemoryNoteStore` that satisfy the trait contracts without touching disk.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryGoalStore
// ---------------------------------------------------------------------------

/// Goal store backed by a `watch` channel holding the current criteria.
#[derive(Debug)]
pub struct MemoryGoalStore {
    tx: watch::Sender<Criteria>,
}

impl MemoryGoalStore {
    pub fn new() -> Self {
        Self::with(Criteria::default())
    }

    pub fn with(criteria: Criteria) -> Self {
        let (tx, _rx) = watch::channel(criteria);
        Self { tx }
    }
}

impl Default for MemoryGoalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GoalStore for MemoryGoalStore {
    async fn get(&self) -> StoreResult<Criteria> {
        Ok(self.tx.borrow().clone())
    }

    async fn set(&self, criteria: Criteria) -> StoreResult<()> {
        self.tx.send_replace(criteria);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Criteria> {
        self.tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// MemorySettingsStore
// ---------------------------------------------------------------------------

/// Settings store backed by a `watch` channel holding the current settings.
#[derive(Debug)]
pub struct MemorySettingsStore {
    tx: watch::Sender<Settings>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::with(Settings::default())
    }

    pub fn with(settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self { tx }
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self) -> StoreResult<Settings> {
        Ok(self.tx.borrow().clone())
    }

    async fn set(&self, settings: Settings) -> StoreResult<()> {
        self.tx.send_replace(settings);
        Ok(())
    }

    async fn set_error_status(&self, status: ErrorStatus) -> StoreResult<()> {
        self.tx.send_modify(|s| s.error_status = status);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryCounterStore
// ---------------------------------------------------------------------------

/// Counter store backed by a `HashMap<key, value>`; counts writes.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    values: Mutex<HashMap<String, f64>>,
    writes: Mutex<u64>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a counter without counting it as a write.
    pub fn with(key: &str, value: f64) -> Self {
        let store = Self::default();
        store.values.lock().unwrap().insert(key.to_string(), value);
        store
    }

    /// Number of successful `set` calls.
    pub fn writes(&self) -> u64 {
        *self.writes.lock().unwrap()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> StoreResult<Option<f64>> {
        Ok(self.values.lock().unwrap().get(key).copied())
    }

    async fn set(&self, key: &str, value: f64) -> StoreResult<()> {
        check_counter(key, value)?;
        self.values.lock().unwrap().insert(key.to_string(), value);
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryNoteStore
// ---------------------------------------------------------------------------

/// Note store backed by a `Vec<Note>`.
#[derive(Debug, Default)]
pub struct MemoryNoteStore {
    notes: Mutex<Vec<Note>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn add(&self, note: Note) -> StoreResult<()> {
        check_note(&note)?;
        self.notes.lock().unwrap().push(note);
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<Note>> {
        Ok(self.notes.lock().unwrap().clone())
    }
}
