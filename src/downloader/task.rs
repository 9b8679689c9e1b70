//! Task executor: the lifecycle of one recording download.

use std::time::Instant;

use crate::retry::fetch_with_retry;
use crate::types::{Event, TaskOutcome, TaskResult, TaskState};

use super::context::TaskContext;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Run one work item to a terminal state.
///
/// Phases:
/// 1. Wait for a permit from the run's pool (held until this function returns)
/// 2. Skip when the destination already exists
/// 3. Download through the retry loop
/// 4. Report the outcome to the resume tracker
///
/// Never fails: every error ends up in the returned [`TaskResult`].
pub(crate) async fn run_task(ctx: TaskContext) -> TaskResult {
    let started = Instant::now();
    let id = ctx.item.id();
    let label = ctx.label();
    let file_name = ctx.item.file_name();

    tracing::debug!(recording_id = %id, position = ctx.position, state = ?TaskState::Pending, "Waiting for download slot");

    // Dropped on every return path (and while unwinding), releasing the slot
    let _permit = match ctx.permits.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            let error = "download slot pool closed".to_string();
            tracing::error!(recording_id = %id, "Permit pool closed before task could start");
            return finish(&ctx, started, TaskOutcome::Abandoned { error }, 0).await;
        }
    };

    match tokio::fs::try_exists(ctx.item.destination()).await {
        Ok(true) => {
            tracing::debug!(recording_id = %id, state = ?TaskState::Skipped, "Destination exists");
            ctx.log.append(format!(
                "{}: {} already exists. Skipping download.",
                label, file_name
            ));
            ctx.emit(Event::AlreadyExists { id });
            return finish(&ctx, started, TaskOutcome::Skipped, 0).await;
        }
        Ok(false) => {}
        Err(e) => {
            // Can't tell; let the download decide
            tracing::warn!(recording_id = %id, error = %e, "Failed to check destination, downloading anyway");
        }
    }

    let max_attempts = ctx.retry.max_attempts();
    let attempted = fetch_with_retry(
        &ctx.retry,
        |attempt| {
            let state = if attempt == 1 {
                TaskState::Downloading
            } else {
                TaskState::Retrying
            };
            tracing::debug!(recording_id = %id, attempt, state = ?state, "Fetching recording");
            ctx.fetcher.fetch(&ctx.item, ctx.item.destination())
        },
        |err, attempt, will_retry| {
            ctx.log.append(format!(
                "{}: Download failed -> {} :: ({}). Attempt {}/{}",
                label,
                file_name,
                err.reason(),
                attempt,
                max_attempts
            ));
            ctx.emit(Event::AttemptFailed {
                id,
                attempt,
                error: err.reason().to_string(),
                will_retry,
            });
        },
    )
    .await;

    let attempts = attempted.attempts;
    let outcome = match attempted.result {
        Ok(bytes) => {
            tracing::debug!(recording_id = %id, bytes, state = ?TaskState::Succeeded, "Recording downloaded");
            ctx.log.append(format!(
                "{}: Downloaded -> {} ({:.2} MB)",
                label,
                file_name,
                bytes as f64 / BYTES_PER_MB
            ));
            ctx.emit(Event::Downloaded {
                id,
                bytes,
                attempts,
            });
            TaskOutcome::Succeeded { bytes }
        }
        Err(e) => {
            tracing::debug!(recording_id = %id, state = ?TaskState::Exhausted, "Giving up on recording");
            ctx.log.append(format!(
                "{}: Giving up on {} after {} attempt(s) :: ({})",
                label,
                file_name,
                attempts,
                e.reason()
            ));
            ctx.emit(Event::Abandoned {
                id,
                attempts,
                error: e.reason().to_string(),
            });
            TaskOutcome::Abandoned {
                error: e.reason().to_string(),
            }
        }
    };

    finish(&ctx, started, outcome, attempts).await
}

/// Report a terminal outcome to the resume tracker and build the result
async fn finish(
    ctx: &TaskContext,
    started: Instant,
    outcome: TaskOutcome,
    attempts: u32,
) -> TaskResult {
    let id = ctx.item.id();
    match ctx.tracker.record(ctx.position, &outcome).await {
        Ok(Some(marker)) => ctx.emit(Event::ResumeMarkerUpdated { id: marker }),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(recording_id = %id, error = %e, "Failed to persist resume marker");
        }
    }

    TaskResult {
        position: ctx.position,
        id,
        outcome,
        attempts,
        elapsed: started.elapsed(),
    }
}
