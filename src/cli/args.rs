//! Flag definitions and pre-flight validation.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::Parser;

use crate::config::{Config, ResumePolicy};
use crate::error::{EXIT_FAILURE, EXIT_SUCCESS, Error, Result};
use crate::history::HistoryQuery;

/// Long flags that older releases accepted with a single dash (`-username`)
const LEGACY_FLAGS: &[&str] = &[
    "username",
    "password",
    "deviceid",
    "list",
    "startdate",
    "lastdays",
    "enddate",
    "out",
    "type",
    "retries",
    "threads",
    "resumefromlastdownload",
    "ignorecachedtoken",
    "state",
];

/// Date-time layouts accepted for `--startdate` / `--enddate` (local time)
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
];

/// Date-only layouts, read as local midnight
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y"];

/// Command-line flags of the `ring-dl` binary
#[derive(Parser)]
#[command(name = "ring-dl")]
#[command(about = "Download recordings from Ring doorbells and cameras")]
#[command(version)]
pub struct Cli {
    /// Ring account e-mail
    #[arg(long, env = "RING_USERNAME")]
    pub username: Option<String>,

    /// Ring account password
    #[arg(long, env = "RING_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Id of the Ring device to download recordings for (see --list)
    #[arg(long)]
    pub deviceid: Option<i64>,

    /// List the devices on the account and exit
    #[arg(long)]
    pub list: bool,

    /// Download events from this date/time (local time)
    #[arg(long, value_parser = parse_date)]
    pub startdate: Option<DateTime<Local>>,

    /// Download events from the last X days (fractions allowed)
    #[arg(long)]
    pub lastdays: Option<f64>,

    /// Download events until this date/time (local time, default: now)
    #[arg(long, value_parser = parse_date)]
    pub enddate: Option<DateTime<Local>>,

    /// Folder to store recordings in
    #[arg(long, default_value = ".")]
    pub out: PathBuf,

    /// Only download events of this kind, e.g. motion or ding
    #[arg(long = "type")]
    pub kind: Option<String>,

    /// Retries per recording after the first failed attempt
    #[arg(long, default_value = "3")]
    pub retries: u32,

    /// Maximum number of concurrent downloads
    #[arg(long, default_value = "10")]
    pub threads: usize,

    /// Only download events newer than the last successful download
    #[arg(long)]
    pub resumefromlastdownload: bool,

    /// Do not use the refresh token cached by a previous session
    #[arg(long)]
    pub ignorecachedtoken: bool,

    /// State database holding the cached token and resume marker
    #[arg(long, env = "RING_DL_STATE", default_value = "ring-dl.db")]
    pub state: PathBuf,

    /// Which recording the resume marker points at after a run
    #[arg(long, value_enum, default_value_t = ResumePolicy::default())]
    pub resume_policy: ResumePolicy,

    /// Delay between launching consecutive downloads, in milliseconds
    #[arg(long, default_value = "1000")]
    pub launch_interval_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Account credentials given on the command line or in the environment
#[derive(Clone)]
pub struct Credentials {
    /// Account e-mail
    pub username: String,
    /// Account password
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What the invocation asks for
#[derive(Clone, Debug)]
pub enum Mode {
    /// Print the account's devices
    ListDevices,
    /// Download recordings in a time window
    Download {
        /// Device and window to enumerate
        query: HistoryQuery,
        /// Window start as given (for display)
        start: DateTime<Local>,
        /// Window end as given, None = now (for display)
        end: Option<DateTime<Local>>,
    },
}

/// A validated invocation
#[derive(Clone, Debug)]
pub struct RunRequest {
    /// Listing or downloading
    pub mode: Mode,
    /// None when a cached refresh token will be used instead
    pub credentials: Option<Credentials>,
    /// Kind filter
    pub kind: Option<String>,
    /// Apply the resume filter
    pub resume: bool,
    /// Engine configuration derived from the flags
    pub config: Config,
}

/// Rewrite legacy single-dash long flags (`-username`, `-deviceId`) to `--username`.
///
/// Only the known flag names are rewritten, so values such as `-5` pass through. The
/// first element (program name) is left alone.
pub fn normalize_legacy_args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 {
                return arg;
            }
            let name = arg.trim_start_matches('-');
            let dashes = arg.len() - name.len();
            if (dashes == 1 || dashes == 2)
                && LEGACY_FLAGS.contains(&name.to_ascii_lowercase().as_str())
            {
                format!("--{}", name.to_ascii_lowercase())
            } else {
                arg
            }
        })
        .collect()
}

/// Parse a `--startdate` / `--enddate` value as local time
pub fn parse_date(raw: &str) -> std::result::Result<DateTime<Local>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Local));
    }

    let naive = DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| {
            format!(
                "unrecognized date '{}' (use YYYY-MM-DD[ HH:MM:SS] or DD-MM-YYYY[ HH:MM:SS])",
                raw
            )
        })?;

    // Ambiguous times (DST fall-back) take the earlier instant
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("'{}' does not exist in the local time zone", raw))
}

/// Exit code for a flag parsing failure
///
/// `--help` and `--version` end the process successfully; a missing or malformed flag
/// value is a usage error like any other pre-flight failure.
pub fn parse_error_exit_code(err: &clap::Error) -> u8 {
    match err.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
            EXIT_SUCCESS
        }
        _ => EXIT_FAILURE,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Cli {
    /// Validate the flags and derive the run configuration.
    ///
    /// `has_cached_token` says whether the state database holds a refresh token; it
    /// makes credentials optional unless `--ignorecachedtoken` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending flag.
    pub fn into_request(self, has_cached_token: bool, now: DateTime<Local>) -> Result<RunRequest> {
        let username = non_blank(self.username);
        let password = non_blank(self.password);
        let token_usable = has_cached_token && !self.ignorecachedtoken;

        if username.is_none() && !token_usable {
            return Err(Error::config("username", "--username is required"));
        }
        if password.is_none() && !token_usable {
            return Err(Error::config("password", "--password is required"));
        }
        let credentials = match (username, password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        if self.deviceid.is_none() && !self.list {
            return Err(Error::config("deviceid", "--deviceid or --list is required"));
        }

        let mut start = None;
        let mut end = None;
        if let Some(days) = self.lastdays {
            if !days.is_finite() || days < 0.0 {
                return Err(Error::config(
                    "lastdays",
                    "--lastdays must be a non-negative number of days",
                ));
            }
            let window_start = chrono::Duration::try_milliseconds((days * 86_400_000.0) as i64)
                .and_then(|window| now.checked_sub_signed(window))
                .ok_or_else(|| Error::config("lastdays", "--lastdays is too large"))?;
            start = Some(window_start);
            end = Some(now);
        }
        if self.startdate.is_some() {
            start = self.startdate;
        }
        if self.enddate.is_some() {
            end = self.enddate;
        }

        let mode = if self.list {
            Mode::ListDevices
        } else {
            let Some(start) = start else {
                return Err(Error::config(
                    "startdate",
                    "--startdate or --lastdays is required",
                ));
            };
            if end.is_some_and(|end| end < start) {
                return Err(Error::config(
                    "enddate",
                    "--enddate must not be before --startdate",
                ));
            }
            Mode::Download {
                query: HistoryQuery {
                    start: start.with_timezone(&Utc),
                    end: end.map(|e| e.with_timezone(&Utc)),
                    device_id: self.deviceid,
                },
                start,
                end,
            }
        };

        let mut config = Config::default();
        config.download.output_dir = self.out;
        config.download.concurrency = self.threads;
        config.download.launch_interval = Duration::from_millis(self.launch_interval_ms);
        config.retry.max_retries = self.retries;
        config.persistence.resume_policy = self.resume_policy;
        config.validate()?;

        Ok(RunRequest {
            mode,
            credentials,
            kind: non_blank(self.kind),
            resume: self.resumefromlastdownload,
            config,
        })
    }
}
