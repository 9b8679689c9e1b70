//! Batch download orchestration split into focused submodules.
//!
//! [`BatchDownloader`] owns a run: it launches one task per work item at a staggered
//! rate, bounds how many of them download at once, and aggregates the results.
//! - [`context`] - Download primitive trait and per-task shared state
//! - [`task`] - Per-item executor (skip check, retry loop, logging)

mod context;
mod task;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use context::RecordingFetcher;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::log_sink::LogSink;
use crate::resume::{ResumeStore, ResumeTracker};
use crate::types::{
    Event, RecordingId, RunReport, RunSummary, TaskOutcome, TaskResult, WorkItem,
};

use context::TaskContext;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Bounded-concurrency batch downloader (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct BatchDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    config: Arc<Config>,
    /// Download primitive
    fetcher: Arc<dyn RecordingFetcher>,
    /// Where the resume marker is persisted
    resume_store: Arc<dyn ResumeStore>,
    /// Human-readable run log
    log: LogSink,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
    /// Cancelled to stop launching further tasks
    stop: CancellationToken,
}

impl BatchDownloader {
    /// Create a downloader
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the configuration is invalid (e.g. zero concurrency).
    pub fn new(
        config: Config,
        fetcher: Arc<dyn RecordingFetcher>,
        resume_store: Arc<dyn ResumeStore>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            resume_store,
            log: LogSink::new(),
            event_tx,
            stop: CancellationToken::new(),
        })
    }

    /// Run log shared by every task of this downloader
    pub fn log(&self) -> &LogSink {
        &self.log
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop launching new tasks; tasks already launched run to completion
    ///
    /// Affects the current run and every later run of this downloader.
    pub fn stop_launching(&self) {
        if !self.stop.is_cancelled() {
            tracing::info!("Stopping launch of further downloads");
        }
        self.stop.cancel();
    }

    /// Download every item of an ordered work list.
    ///
    /// Items are launched in list order, one task each, waiting the configured launch
    /// interval between launches. At most `concurrency` tasks download at the same time.
    /// Per-item failures never fail the run; they show up as abandoned results.
    ///
    /// # Errors
    ///
    /// Returns an error only when the output directory cannot be created.
    pub async fn run(&self, items: Vec<WorkItem>) -> Result<RunReport> {
        let started = Instant::now();
        let total = items.len();
        let download = &self.config.download;

        self.log.append("Beginning downloads...");

        tokio::fs::create_dir_all(&download.output_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to create output directory {}: {}",
                        download.output_dir.display(),
                        e
                    ),
                ))
            })?;

        let ids: Vec<RecordingId> = items.iter().map(WorkItem::id).collect();
        let tracker = Arc::new(ResumeTracker::new(
            Arc::clone(&self.resume_store),
            self.config.persistence.resume_policy,
            ids,
        ));
        // Fresh pool per run: permits never leak across runs
        let permits = Arc::new(Semaphore::new(download.concurrency));

        let mut tasks = JoinSet::new();
        let mut launched: HashMap<tokio::task::Id, (usize, RecordingId, Instant)> =
            HashMap::with_capacity(total);

        for (position, item) in items.into_iter().enumerate() {
            if self.stop.is_cancelled() {
                break;
            }

            let id = item.id();
            let ctx = TaskContext {
                position,
                total,
                item,
                permits: Arc::clone(&permits),
                fetcher: Arc::clone(&self.fetcher),
                tracker: Arc::clone(&tracker),
                retry: self.config.retry.clone(),
                log: self.log.clone(),
                event_tx: self.event_tx.clone(),
            };
            let handle = tasks.spawn(task::run_task(ctx));
            launched.insert(handle.id(), (position, id, Instant::now()));
            self.event_tx.send(Event::TaskLaunched { id, position }).ok();
            tracing::debug!(recording_id = %id, position, "Launched download task");

            if position + 1 < total {
                tokio::select! {
                    _ = tokio::time::sleep(download.launch_interval) => {}
                    _ = self.stop.cancelled() => {}
                }
            }
        }

        let launched_count = launched.len();
        if launched_count < total {
            self.log.append(format!(
                "Stopped launching: {} of {} item(s) not started.",
                total - launched_count,
                total
            ));
        }

        let mut results = Vec::with_capacity(launched_count);
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((task_id, result)) => {
                    launched.remove(&task_id);
                    results.push(result);
                }
                Err(join_error) => {
                    let Some((position, id, launched_at)) = launched.remove(&join_error.id())
                    else {
                        tracing::error!(error = %join_error, "Unknown download task failed");
                        continue;
                    };
                    let error = if join_error.is_panic() {
                        format!("task panicked: {}", panic_message(join_error.into_panic()))
                    } else {
                        "task cancelled".to_string()
                    };
                    results.push(
                        self.abandon_crashed_task(&tracker, position, id, launched_at, error, total)
                            .await,
                    );
                }
            }
        }

        results.sort_by_key(|r| r.position);

        let mut summary = RunSummary::from_results(total, &results, started.elapsed());
        summary.resume_marker = tracker.persisted().await;

        self.log.append(format!(
            "Finished downloading {} item(s) in {:.1} seconds.",
            launched_count,
            summary.elapsed.as_secs_f64()
        ));
        self.log.append(format!(
            "Succeeded: {}, Skipped: {}, Abandoned: {}, Not launched: {}",
            summary.succeeded, summary.skipped, summary.abandoned, summary.not_launched
        ));
        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            abandoned = summary.abandoned,
            not_launched = summary.not_launched,
            "Batch run complete"
        );

        self.event_tx
            .send(Event::RunComplete {
                summary: summary.clone(),
            })
            .ok();

        Ok(RunReport { summary, results })
    }

    /// Turn a task that died without producing a result into an abandoned result
    async fn abandon_crashed_task(
        &self,
        tracker: &ResumeTracker,
        position: usize,
        id: RecordingId,
        launched_at: Instant,
        error: String,
        total: usize,
    ) -> TaskResult {
        tracing::error!(recording_id = %id, position, error = %error, "Download task crashed");
        self.log.append(format!(
            "Video {}/{}: Giving up on recording {} :: ({})",
            position + 1,
            total,
            id,
            error
        ));
        self.event_tx
            .send(Event::Abandoned {
                id,
                attempts: 0,
                error: error.clone(),
            })
            .ok();

        let outcome = TaskOutcome::Abandoned { error };
        if let Err(e) = tracker.record(position, &outcome).await {
            tracing::warn!(recording_id = %id, error = %e, "Failed to persist resume marker");
        }

        TaskResult {
            position,
            id,
            outcome,
            // Attempts made before the crash are not observable
            attempts: 0,
            elapsed: launched_at.elapsed(),
        }
    }
}

/// Best-effort text of a panic payload
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
