//! JSON-file backed store.
//!
//! One document holds goals, settings, counters and notes, the way a browser
//! extension keeps everything in a single local storage area. Every mutation
//! rewrites the whole document through a temp file and an atomic rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::storage_traits::*;

/// On-disk layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDocument {
    pub goals: Criteria,
    pub settings: Settings,
    pub counters: BTreeMap<String, f64>,
    pub notes: Vec<Note>,
}

/// File-backed implementation of every storage trait.
pub struct JsonFileStore {
    path: PathBuf,
    doc: Mutex<StateDocument>,
    goals_tx: watch::Sender<Criteria>,
}

impl JsonFileStore {
    /// Open the store at `path`, creating parent directories. A missing file
    /// starts from an empty document; it is written on the first mutation.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let doc = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => StateDocument::default(),
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "state file not found, starting empty");
                StateDocument::default()
            }
            Err(e) => return Err(e.into()),
        };

        let (goals_tx, _) = watch::channel(doc.goals.clone());

        Ok(Self {
            path,
            doc: Mutex::new(doc),
            goals_tx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the whole document.
    pub async fn snapshot(&self) -> StateDocument {
        self.doc.lock().await.clone()
    }

    async fn persist(&self, doc: &StateDocument) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "state persisted");
        Ok(())
    }

    /// Apply `change` to a copy of the document and keep it only once it is
    /// on disk.
    async fn update<F>(&self, change: F) -> StoreResult<()>
    where
        F: FnOnce(&mut StateDocument),
    {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        change(&mut next);
        self.persist(&next).await?;
        *doc = next;
        Ok(())
    }
}

#[async_trait]
impl GoalStore for JsonFileStore {
    async fn get(&self) -> StoreResult<Criteria> {
        Ok(self.doc.lock().await.goals.clone())
    }

    async fn set(&self, criteria: Criteria) -> StoreResult<()> {
        self.update(|doc| doc.goals = criteria.clone()).await?;
        self.goals_tx.send_replace(criteria);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Criteria> {
        self.goals_tx.subscribe()
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn get(&self) -> StoreResult<Settings> {
        Ok(self.doc.lock().await.settings.clone())
    }

    async fn set(&self, settings: Settings) -> StoreResult<()> {
        self.update(|doc| doc.settings = settings).await
    }

    async fn set_error_status(&self, status: ErrorStatus) -> StoreResult<()> {
        self.update(|doc| doc.settings.error_status = status).await
    }
}

#[async_trait]
impl CounterStore for JsonFileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<f64>> {
        Ok(self.doc.lock().await.counters.get(key).copied())
    }

    async fn set(&self, key: &str, value: f64) -> StoreResult<()> {
        check_counter(key, value)?;
        self.update(|doc| {
            doc.counters.insert(key.to_string(), value);
        })
        .await
    }
}

#[async_trait]
impl NoteStore for JsonFileStore {
    async fn add(&self, note: Note) -> StoreResult<()> {
        check_note(&note)?;
        self.update(|doc| doc.notes.push(note)).await
    }

    async fn list(&self) -> StoreResult<Vec<Note>> {
        Ok(self.doc.lock().await.notes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("nested/state.json"))
            .await
            .unwrap();
        let doc = store.snapshot().await;
        assert!(doc.goals.is_empty());
        assert!(doc.counters.is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = JsonFileStore::open(&path).await.err().unwrap();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_mutations_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        {
            let store = JsonFileStore::open(&path).await.unwrap();
            GoalStore::set(&store, Criteria::new("cooking tutorials", "pranks"))
                .await
                .unwrap();
            CounterStore::set(&store, "totalTimeSpentOnYouTube", 42.5)
                .await
                .unwrap();
            store
                .add(Note::new("https://www.youtube.com/watch?v=abc", "knife skills"))
                .await
                .unwrap();
        }
        let store = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(
            GoalStore::get(&store).await.unwrap(),
            Criteria::new("cooking tutorials", "pranks")
        );
        assert_eq!(
            CounterStore::get(&store, "totalTimeSpentOnYouTube")
                .await
                .unwrap(),
            Some(42.5)
        );
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("gone");
        let store = JsonFileStore::open(parent.join("state.json")).await.unwrap();
        let goals = GoalStore::subscribe(&store);
        std::fs::remove_dir_all(&parent).unwrap();

        let err = GoalStore::set(&store, Criteria::new("cooking tutorials", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(GoalStore::get(&store).await.unwrap().is_empty());
        assert!(!goals.has_changed().unwrap());

        assert!(CounterStore::set(&store, "total", 3.0).await.is_err());
        assert_eq!(CounterStore::get(&store, "total").await.unwrap(), None);
        assert!(store.add(Note::new("https://a", "n")).await.is_err());
        assert!(store.list().await.unwrap().is_empty());
    }
}
