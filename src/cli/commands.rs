//! Login, device listing and the download run.

use std::io::Write;
use std::sync::Arc;

use tokio::io::AsyncBufReadExt;

use crate::db::Database;
use crate::error::{Error, RingError, Result};
use crate::history::HistoryProvider;
use crate::resume::ResumeStore;
use crate::ring::RingClient;
use crate::selection::{SelectionCriteria, select_work_items};
use crate::types::WorkItemLayout;
use crate::{BatchDownloader, run_with_shutdown};

use super::args::{Cli, Credentials, Mode, RunRequest};

/// Human-readable date layout for console messages
const DISPLAY_DATE_FORMAT: &str = "%A %-d %B %Y %H:%M:%S";

/// Execute one invocation
///
/// Validation happens before any network activity. Per-recording failures do not
/// make the run fail; only configuration, authentication and enumeration errors do.
pub async fn run(cli: Cli) -> Result<()> {
    let db = Arc::new(Database::new(&cli.state).await?);

    let cached_token = cached_refresh_token(&db, cli.ignorecachedtoken).await?;
    let request = cli.into_request(cached_token.is_some(), chrono::Local::now())?;

    let client = Arc::new(RingClient::new(request.config.ring.clone())?);

    println!("Connecting to Ring services");
    authenticate(&client, request.credentials.as_ref(), cached_token).await?;
    save_refresh_token(&client, &db).await;

    let result = match &request.mode {
        Mode::ListDevices => list_devices(&client).await,
        Mode::Download { .. } => download(&request, Arc::clone(&client), Arc::clone(&db)).await,
    };

    // The session may have refreshed its token during the run
    save_refresh_token(&client, &db).await;
    result
}

/// Refresh token saved by a previous run, unless the user asked to ignore it
///
/// An ignored token is also forgotten, so a failed login in this run cannot leave it
/// around for the next one.
async fn cached_refresh_token(db: &Database, ignore: bool) -> Result<Option<String>> {
    if ignore {
        db.clear_refresh_token().await?;
        return Ok(None);
    }
    db.refresh_token().await
}

async fn authenticate(
    client: &RingClient,
    credentials: Option<&Credentials>,
    cached_token: Option<String>,
) -> Result<()> {
    if let Some(token) = cached_token {
        println!("Authenticating using refresh token from previous session");
        match client.login_with_refresh_token(&token).await {
            Ok(()) => return Ok(()),
            Err(e) if credentials.is_some() => {
                tracing::warn!(error = %e, "Cached refresh token rejected, falling back to password login");
            }
            Err(e) => return Err(e),
        }
    }

    let Some(credentials) = credentials else {
        return Err(Error::config("username", "--username is required"));
    };

    println!("Authenticating using provided username and password");
    match client
        .login_with_password(&credentials.username, &credentials.password, None)
        .await
    {
        Err(Error::Ring(RingError::TwoFactorRequired)) => {
            println!(
                "Two factor authentication enabled on this account, please enter the Ring token from the e-mail, text message or authenticator app:"
            );
            let code = read_two_factor_code().await?;
            client
                .login_with_password(&credentials.username, &credentials.password, Some(&code))
                .await
        }
        other => other,
    }
}

async fn read_two_factor_code() -> Result<String> {
    let mut line = String::new();
    tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    let code = line.trim().to_string();
    if code.is_empty() {
        return Err(RingError::AuthenticationFailed("no two-factor code entered".to_string()).into());
    }
    Ok(code)
}

/// Cache the session's refresh token so the next run can skip the password login
async fn save_refresh_token(client: &RingClient, db: &Database) {
    let Some(token) = client.current_refresh_token().await else {
        return;
    };
    if let Err(e) = db.set_refresh_token(&token).await {
        tracing::warn!(error = %e, "Failed to cache refresh token");
    }
}

async fn list_devices(client: &RingClient) -> Result<()> {
    print!("Retrieving all devices... ");
    std::io::stdout().flush().ok();
    let devices = client.devices().await?;
    println!("{} found", devices.total());
    println!();

    for (heading, group) in devices.groups() {
        println!("{}", heading);
        for device in group {
            println!("{} - {}", device.id, device.description);
        }
        println!();
    }
    Ok(())
}

async fn download(request: &RunRequest, client: Arc<RingClient>, db: Arc<Database>) -> Result<()> {
    let Mode::Download { query, start, end } = &request.mode else {
        return Ok(());
    };
    let config = &request.config;
    let threads = config.download.concurrency;

    println!(
        "Downloading {} historical events between {} and {}{} using {} thread{}",
        request.kind.as_deref().unwrap_or("all"),
        start.format(DISPLAY_DATE_FORMAT),
        end.map(|e| e.format(DISPLAY_DATE_FORMAT).to_string())
            .unwrap_or_else(|| "now".to_string()),
        query
            .device_id
            .map(|id| format!(" for Ring device {}", id))
            .unwrap_or_default(),
        threads,
        if threads == 1 { "" } else { "s" }
    );

    let events = match client.history(query).await {
        Err(Error::DeviceNotFound(id)) => {
            println!("No Ring device with Id {} found under this account", id);
            return Err(Error::DeviceNotFound(id));
        }
        other => other?,
    };

    let resume_from = if request.resume {
        db.last_downloaded().await?
    } else {
        None
    };
    let layout = WorkItemLayout {
        output_dir: config.download.output_dir.clone(),
        extension: config.download.file_extension.clone(),
    };
    let criteria = SelectionCriteria {
        kind: request.kind.clone(),
        resume_from,
    };
    let selection = select_work_items(events, &criteria, &layout);

    if let Some(cutoff) = selection.resume_cutoff {
        let cutoff = cutoff.with_timezone(&chrono::Local);
        println!(
            "Filtering for recordings newer than {} at {}",
            cutoff.format("%A %d %B %Y"),
            cutoff.format("%H:%M:%S")
        );
    }
    if selection.dropped_undated > 0 {
        tracing::debug!(dropped = selection.dropped_undated, "Dropped events without id or timestamp");
    }

    if selection.is_empty() {
        println!("No recordings found. Quitting.");
        return Ok(());
    }

    let count = selection.items.len();
    println!(
        "{} item{} found, downloading to {}",
        count,
        if count == 1 { "" } else { "s" },
        config.download.output_dir.display()
    );
    println!("---");

    let downloader = BatchDownloader::new(
        config.clone(),
        client,
        db as Arc<dyn ResumeStore>,
    )?;
    let report = run_with_shutdown(&downloader, selection.items).await?;

    tracing::debug!(
        succeeded = report.summary.succeeded,
        abandoned = report.summary.abandoned,
        resume_marker = ?report.summary.resume_marker,
        "Run finished"
    );
    Ok(())
}
