//! # ring-recordings-dl
//!
//! Batch downloader for Ring doorbell and camera recordings.
//!
//! ## Design Philosophy
//!
//! ring-recordings-dl is designed to be:
//! - **Bounded** - A fixed number of downloads run at once, launched at a steady pace
//! - **Idempotent** - Recordings already on disk are skipped, so re-runs are cheap
//! - **Resumable** - A persisted marker lets the next run pick up where this one ended
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! The engine ([`BatchDownloader`]) only sees two traits: [`HistoryProvider`] for
//! enumeration and [`RecordingFetcher`] for downloads. [`RingClient`] implements both
//! against the Ring REST API.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ring_recordings_dl::{
//!     BatchDownloader, Config, HistoryProvider, HistoryQuery, MemoryResumeStore,
//!     RingClient, SelectionCriteria, WorkItemLayout, select_work_items,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let client = Arc::new(RingClient::new(config.ring.clone())?);
//!     client.login_with_refresh_token("saved-refresh-token").await?;
//!
//!     let events = client
//!         .history(&HistoryQuery {
//!             start: chrono::Utc::now() - chrono::Duration::days(1),
//!             end: None,
//!             device_id: None,
//!         })
//!         .await?;
//!     let layout = WorkItemLayout {
//!         output_dir: config.download.output_dir.clone(),
//!         extension: config.download.file_extension.clone(),
//!     };
//!     let selection = select_work_items(events, &SelectionCriteria::default(), &layout);
//!
//!     let downloader =
//!         BatchDownloader::new(config, client, Arc::new(MemoryResumeStore::default()))?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = downloader.run(selection.items).await?;
//!     println!("{} downloaded", report.summary.succeeded);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Command-line front end
pub mod cli;
/// Configuration types
pub mod config;
/// State database (credential cache, resume marker)
pub mod db;
/// Batch download orchestration
pub mod downloader;
/// Error types
pub mod error;
/// Ring history events and the enumeration trait
pub mod history;
/// Timestamped run log
pub mod log_sink;
/// Resume marker storage and policy
pub mod resume;
/// Retry logic with a fixed delay
pub mod retry;
/// Ring REST API client
pub mod ring;
/// Work list filtering and ordering
pub mod selection;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, ResumePolicy};
pub use db::Database;
pub use downloader::{BatchDownloader, RecordingFetcher};
pub use error::{DatabaseError, Error, FetchError, Result, RingError};
pub use history::{HistoryEvent, HistoryProvider, HistoryQuery};
pub use log_sink::{LogEntry, LogSink};
pub use resume::{MemoryResumeStore, ResumeStore, ResumeTracker};
pub use ring::{Device, DeviceList, RingClient};
pub use selection::{Selection, SelectionCriteria, select_work_items};
pub use types::{
    Event, RecordingId, RunReport, RunSummary, TaskOutcome, TaskResult, TaskState, WorkItem,
    WorkItemLayout,
};

/// Run a batch with graceful signal handling.
///
/// On the first termination signal the downloader stops launching new tasks; tasks
/// already launched run to completion and the report still covers them.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(
    downloader: &BatchDownloader,
    items: Vec<WorkItem>,
) -> Result<RunReport> {
    let run = downloader.run(items);
    tokio::pin!(run);

    tokio::select! {
        report = &mut run => return report,
        _ = wait_for_signal() => {
            downloader.stop_launching();
        }
    }

    run.await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
