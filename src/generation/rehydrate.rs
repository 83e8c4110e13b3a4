//! Boot-time decision: resume a persisted in-flight job or discard it.

use tracing::{info, warn};

use super::models::{GenerationState, GenerationStatus};
use super::store::{SNAPSHOT_KEY, SnapshotStore};

#[derive(Debug, Clone, PartialEq)]
pub enum Rehydration {
    /// No snapshot was stored.
    Empty,
    /// An in-progress snapshot was found; tracking resumes from it.
    Resumed(GenerationState),
    /// A snapshot was found but dropped, and the key removed.
    Discarded(DiscardReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscardReason {
    /// Left over from a job that already finished.
    NotInProgress(GenerationStatus),
    /// Could not be decoded.
    Malformed(String),
    /// The store itself could not be read.
    Unreadable(String),
}

pub struct RehydrationGuard<'a> {
    store: &'a dyn SnapshotStore,
}

impl<'a> RehydrationGuard<'a> {
    pub fn new(store: &'a dyn SnapshotStore) -> Self {
        Self { store }
    }

    /// Read the snapshot key once and decide.
    pub fn rehydrate(&self) -> Rehydration {
        let raw = match self.store.get(SNAPSHOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Rehydration::Empty,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted generation state");
                return self.discard(DiscardReason::Unreadable(e.to_string()));
            }
        };

        match serde_json::from_str::<GenerationState>(&raw) {
            Ok(state) if state.job.is_in_progress() => {
                info!(
                    job_id = ?state.job.job_id(),
                    percent = state.job.percent(),
                    step = ?state.job.current_step(),
                    "Restored active generation from snapshot"
                );
                Rehydration::Resumed(state)
            }
            Ok(state) => self.discard(DiscardReason::NotInProgress(state.job.status())),
            Err(e) => {
                warn!(error = %e, "Persisted generation state is malformed");
                self.discard(DiscardReason::Malformed(e.to_string()))
            }
        }
    }

    fn discard(&self, reason: DiscardReason) -> Rehydration {
        if let Err(e) = self.store.remove(SNAPSHOT_KEY) {
            warn!(error = %e, "Failed to remove stale generation snapshot");
        }
        info!(reason = ?reason, "Discarded stale generation snapshot");
        Rehydration::Discarded(reason)
    }
}
