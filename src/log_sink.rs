//! Concurrency-safe, append-only run log.
//!
//! Every status line produced during a run is timestamped, kept in memory in the
//! order it was recorded, broadcast to subscribers, and mirrored as a `tracing`
//! event (which the CLI's subscriber prints to stdout).

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// Capacity of the live log broadcast channel
const LOG_CHANNEL_CAPACITY: usize = 1024;

/// One recorded log line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the line was generated
    pub timestamp: DateTime<Local>,
    /// Message text
    pub message: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] - {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.message
        )
    }
}

struct Inner {
    entries: Mutex<Vec<LogEntry>>,
    tx: broadcast::Sender<LogEntry>,
}

/// Shared run log (cloneable, all clones append to the same record)
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Inner>,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink {
    /// Create an empty log
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Vec::new()),
                tx,
            }),
        }
    }

    /// Record a line; each call is stored atomically
    pub fn append(&self, message: impl Into<String>) -> LogEntry {
        let message = message.into();
        let entry = {
            let mut entries = self
                .inner
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            // Stamp under the lock so recorded order and timestamps agree
            let entry = LogEntry {
                timestamp: Local::now(),
                message,
            };
            entries.push(entry.clone());
            entry
        };

        tracing::info!(target: "ring_recordings_dl::run_log", "{}", entry.message);

        // No subscribers is fine
        self.inner.tx.send(entry.clone()).ok();
        entry
    }

    /// Snapshot of everything recorded so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded lines
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// No lines recorded yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive lines as they are appended
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.inner.tx.subscribe()
    }
}
