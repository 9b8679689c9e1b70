//! Core types for ring-recordings-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::duration_ms_serde;

/// Unique identifier of a Ring history event (and its recording)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(pub i64);

impl RecordingId {
    /// Create a new RecordingId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for RecordingId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RecordingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordingId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Timestamp layout used in recording file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y_%m_%d-%H_%M_%S";

/// Build the file name of a recording: `<id>_<YYYY_MM_DD-HH_MM_SS>.<ext>`
pub fn recording_file_name(id: RecordingId, created_at: DateTime<Utc>, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        id,
        created_at.format(FILE_TIMESTAMP_FORMAT),
        extension
    )
}

/// Where work items are written and with which extension
#[derive(Clone, Debug)]
pub struct WorkItemLayout {
    /// Output directory
    pub output_dir: PathBuf,
    /// Recording file extension (without dot)
    pub extension: String,
}

/// One recording to download
///
/// Immutable once constructed; the destination is derived from id and timestamp,
/// so two items with different ids never share a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    id: RecordingId,
    created_at: DateTime<Utc>,
    kind: String,
    destination: PathBuf,
}

impl WorkItem {
    /// Create a work item whose destination lives under `layout.output_dir`
    pub fn new(
        id: RecordingId,
        created_at: DateTime<Utc>,
        kind: impl Into<String>,
        layout: &WorkItemLayout,
    ) -> Self {
        let destination = layout
            .output_dir
            .join(recording_file_name(id, created_at, &layout.extension));
        Self {
            id,
            created_at,
            kind: kind.into(),
            destination,
        }
    }

    /// Recording identifier
    pub fn id(&self) -> RecordingId {
        self.id
    }

    /// Creation time, used for ordering and resume comparisons
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Event kind ("motion", "ding", ...)
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Full destination path
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// File name component of the destination, for log lines
    pub fn file_name(&self) -> String {
        self.destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Lifecycle state of a single download task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Launched, waiting for a permit
    Pending,
    /// Holding a permit, download attempt in flight
    Downloading,
    /// Attempt failed, waiting out the retry delay
    Retrying,
    /// Destination already existed
    Skipped,
    /// Recording written to disk
    Succeeded,
    /// Every permitted attempt failed
    Exhausted,
}

impl TaskState {
    /// Whether the task has finished
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Skipped | TaskState::Succeeded | TaskState::Exhausted
        )
    }
}

/// Terminal outcome of a download task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// File already present, download primitive not invoked
    Skipped,
    /// Recording downloaded
    Succeeded {
        /// Bytes written
        bytes: u64,
    },
    /// All attempts failed (or a permanent failure occurred)
    Abandoned {
        /// Last failure reason
        error: String,
    },
}

impl TaskOutcome {
    /// The recording is on disk after this outcome
    pub fn is_on_disk(&self) -> bool {
        matches!(self, TaskOutcome::Skipped | TaskOutcome::Succeeded { .. })
    }
}

/// Per-item result reported back to the orchestrator
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskResult {
    /// Zero-based position in the ordered work list
    pub position: usize,
    /// Recording identifier
    pub id: RecordingId,
    /// Terminal outcome
    #[serde(flatten)]
    pub outcome: TaskOutcome,
    /// Download attempts made (0 when skipped)
    pub attempts: u32,
    /// Time from launch to terminal state
    #[serde(with = "duration_ms_serde")]
    pub elapsed: Duration,
}

/// Aggregate statistics for one run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items in the ordered work list
    pub total: usize,
    /// Items downloaded
    pub succeeded: usize,
    /// Items abandoned after exhausting retries
    pub abandoned: usize,
    /// Items skipped because the file already existed
    pub skipped: usize,
    /// Items never launched because launching was stopped
    pub not_launched: usize,
    /// Wall-clock duration of the run
    #[serde(with = "duration_ms_serde")]
    pub elapsed: Duration,
    /// Resume marker persisted during this run, if any
    pub resume_marker: Option<RecordingId>,
}

impl RunSummary {
    /// Tally task results
    pub fn from_results(total: usize, results: &[TaskResult], elapsed: Duration) -> Self {
        let mut summary = Self {
            total,
            elapsed,
            not_launched: total.saturating_sub(results.len()),
            ..Self::default()
        };
        for result in results {
            match result.outcome {
                TaskOutcome::Skipped => summary.skipped += 1,
                TaskOutcome::Succeeded { .. } => summary.succeeded += 1,
                TaskOutcome::Abandoned { .. } => summary.abandoned += 1,
            }
        }
        summary
    }
}

/// Everything a run produced
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// Aggregate counts
    pub summary: RunSummary,
    /// Per-item results ordered by position
    pub results: Vec<TaskResult>,
}

/// Event emitted during a batch run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task spawned for an item (emitted in launch order)
    TaskLaunched {
        /// Recording identifier
        id: RecordingId,
        /// Position in the ordered work list
        position: usize,
    },

    /// Destination already existed, nothing downloaded
    AlreadyExists {
        /// Recording identifier
        id: RecordingId,
    },

    /// A download attempt failed
    AttemptFailed {
        /// Recording identifier
        id: RecordingId,
        /// Attempt number (1-based)
        attempt: u32,
        /// Failure reason
        error: String,
        /// Whether another attempt follows
        will_retry: bool,
    },

    /// Recording downloaded
    Downloaded {
        /// Recording identifier
        id: RecordingId,
        /// Bytes written
        bytes: u64,
        /// Attempts used
        attempts: u32,
    },

    /// Recording abandoned
    Abandoned {
        /// Recording identifier
        id: RecordingId,
        /// Attempts used
        attempts: u32,
        /// Last failure reason
        error: String,
    },

    /// Resume marker persisted
    ResumeMarkerUpdated {
        /// New marker
        id: RecordingId,
    },

    /// All launched tasks finished
    RunComplete {
        /// Final statistics
        summary: RunSummary,
    },
}
