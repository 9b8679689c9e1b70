//! Resume marker storage and update policy.
//!
//! The marker is the id of the last recording considered "completed". A later run
//! started with resume enabled only schedules recordings newer than it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ResumePolicy;
use crate::error::Result;
use crate::types::{RecordingId, TaskOutcome};

/// Persisted single-cell store for the resume marker
#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Read the current marker
    async fn last_downloaded(&self) -> Result<Option<RecordingId>>;

    /// Replace the marker
    async fn set_last_downloaded(&self, id: RecordingId) -> Result<()>;
}

/// In-process marker store (nothing survives the process)
#[derive(Debug, Default)]
pub struct MemoryResumeStore {
    marker: std::sync::Mutex<Option<RecordingId>>,
}

impl MemoryResumeStore {
    /// Create a store pre-loaded with a marker
    pub fn with_marker(id: RecordingId) -> Self {
        Self {
            marker: std::sync::Mutex::new(Some(id)),
        }
    }

    fn cell(&self) -> std::sync::MutexGuard<'_, Option<RecordingId>> {
        self.marker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn last_downloaded(&self) -> Result<Option<RecordingId>> {
        Ok(*self.cell())
    }

    async fn set_last_downloaded(&self, id: RecordingId) -> Result<()> {
        *self.cell() = Some(id);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Settled {
    OnDisk,
    Abandoned,
}

struct TrackerState {
    settled: Vec<Option<Settled>>,
    /// Length of the leading run of positions that are on disk
    prefix_len: usize,
    persisted: Option<RecordingId>,
}

/// Applies a [`ResumePolicy`] to task outcomes of one run and persists the marker
///
/// Policy evaluation and the store write happen under one async lock, so concurrent
/// completions cannot interleave a stale write after a newer one.
pub struct ResumeTracker {
    store: Arc<dyn ResumeStore>,
    policy: ResumePolicy,
    ids: Vec<RecordingId>,
    state: tokio::sync::Mutex<TrackerState>,
}

impl ResumeTracker {
    /// Track a run over `ids`, given in scheduling order
    pub fn new(store: Arc<dyn ResumeStore>, policy: ResumePolicy, ids: Vec<RecordingId>) -> Self {
        let settled = vec![None; ids.len()];
        Self {
            store,
            policy,
            ids,
            state: tokio::sync::Mutex::new(TrackerState {
                settled,
                prefix_len: 0,
                persisted: None,
            }),
        }
    }

    /// Record the terminal outcome of the item at `position`
    ///
    /// Returns the marker if this call persisted a new one.
    pub async fn record(
        &self,
        position: usize,
        outcome: &TaskOutcome,
    ) -> Result<Option<RecordingId>> {
        let mut state = self.state.lock().await;

        let Some(slot) = state.settled.get_mut(position) else {
            tracing::warn!(position, "Outcome reported for unknown work position");
            return Ok(None);
        };
        *slot = Some(if outcome.is_on_disk() {
            Settled::OnDisk
        } else {
            Settled::Abandoned
        });

        let candidate = match self.policy {
            ResumePolicy::FirstScheduled => match outcome {
                TaskOutcome::Succeeded { .. } if position == 0 => self.ids.first().copied(),
                _ => None,
            },
            ResumePolicy::ContiguousPrefix => {
                let before = state.prefix_len;
                while state.settled.get(state.prefix_len) == Some(&Some(Settled::OnDisk)) {
                    state.prefix_len += 1;
                }
                if state.prefix_len > before {
                    self.ids.get(state.prefix_len - 1).copied()
                } else {
                    None
                }
            }
        };

        let Some(id) = candidate else {
            return Ok(None);
        };
        if state.persisted == Some(id) {
            return Ok(None);
        }

        self.store.set_last_downloaded(id).await?;
        state.persisted = Some(id);
        tracing::debug!(recording_id = %id, policy = ?self.policy, "Resume marker updated");
        Ok(Some(id))
    }

    /// Marker persisted by this tracker, if any
    pub async fn persisted(&self) -> Option<RecordingId> {
        self.state.lock().await.persisted
    }
}
