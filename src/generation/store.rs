//! Durable key/value storage for the active-job snapshot.
//!
//! A snapshot is kept only while the job is in progress; [`persist_state`]
//! writes it for in-progress states and deletes it for everything else.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use super::models::GenerationState;
use crate::errors::StoreError;

/// Fixed key under which the active job is stored.
pub const SNAPSHOT_KEY: &str = "coursecraft_active_generation";

pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a half-written snapshot.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn io_error(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;

        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        fs::File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(value.as_bytes())?;
                file.sync_all()
            })
            .map_err(|e| Self::io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| Self::io_error(&path, e))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }
}

/// In-process store, used by tests and embedders without a filesystem.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Write `state` under [`SNAPSHOT_KEY`] if it is in progress, delete the key otherwise.
pub fn persist_state(store: &dyn SnapshotStore, state: &GenerationState) -> Result<(), StoreError> {
    if state.job.is_in_progress() {
        let json = serde_json::to_string(state).map_err(StoreError::Encode)?;
        store.set(SNAPSHOT_KEY, &json)?;
        debug!(
            job_id = ?state.job.job_id(),
            percent = state.job.percent(),
            "Persisted generation snapshot"
        );
    } else {
        store.remove(SNAPSHOT_KEY)?;
    }
    Ok(())
}

/// [`persist_state`], logging instead of failing.
pub(crate) fn persist_or_warn(store: &dyn SnapshotStore, state: &GenerationState) {
    if let Err(e) = persist_state(store, state) {
        warn!(error = %e, "Failed to persist generation state");
    }
}
