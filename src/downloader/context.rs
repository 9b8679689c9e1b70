//! Task context: the download primitive trait and the state shared with each task.

use std::path::Path;
use std::sync::Arc;

use crate::config::RetryConfig;
use crate::error::FetchError;
use crate::log_sink::LogSink;
use crate::resume::ResumeTracker;
use crate::types::{Event, WorkItem};

/// Abstraction over the remote recording download, enabling testability.
///
/// Implementations write the recording to `destination` and return the number of
/// bytes written. A failed call must not leave a file at `destination`.
#[async_trait::async_trait]
pub trait RecordingFetcher: Send + Sync {
    /// Download one recording to `destination`
    async fn fetch(&self, item: &WorkItem, destination: &Path) -> Result<u64, FetchError>;
}

/// Shared context for a single download task, reducing parameter passing between helpers.
pub(crate) struct TaskContext {
    /// Zero-based position in the ordered work list
    pub(crate) position: usize,
    /// Length of the ordered work list (for "Video i/n" labels)
    pub(crate) total: usize,
    pub(crate) item: WorkItem,
    pub(crate) permits: Arc<tokio::sync::Semaphore>,
    pub(crate) fetcher: Arc<dyn RecordingFetcher>,
    pub(crate) tracker: Arc<ResumeTracker>,
    pub(crate) retry: RetryConfig,
    pub(crate) log: LogSink,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl TaskContext {
    /// "Video i/n" prefix used in every log line of this task
    pub(crate) fn label(&self) -> String {
        format!("Video {}/{}", self.position + 1, self.total)
    }

    /// Emit an event; having no subscribers is fine
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
