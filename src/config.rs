//! Configuration types for ring-recordings-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Download behavior configuration (output location, concurrency, pacing)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory recordings are written to (default: current directory)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum concurrent downloads (default: 10, must be at least 1)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Pause between successive task launches (default: 1 second)
    ///
    /// Independent of `concurrency`: this smooths the request rate against the
    /// remote service even while permits are free.
    #[serde(default = "default_launch_interval", with = "duration_ms_serde")]
    pub launch_interval: Duration,

    /// File extension for downloaded recordings (default: "mp4")
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            launch_interval: default_launch_interval(),
            file_extension: default_file_extension(),
        }
    }
}

/// Retry configuration for failed recording downloads
///
/// The delay between attempts is fixed; there is no backoff.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 3, so up to 4 attempts)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the next attempt (default: 1 second)
    #[serde(default = "default_retry_delay", with = "duration_ms_serde")]
    pub retry_delay: Duration,
}

impl RetryConfig {
    /// Total number of attempts the retry loop may make
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
        }
    }
}

/// Which completed item becomes the persisted resume marker
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResumePolicy {
    /// Only the chronologically first scheduled item updates the marker, and only
    /// when it is actually downloaded. Compatible with markers written by earlier runs.
    #[default]
    FirstScheduled,
    /// The marker follows the longest prefix of the ordered work list whose items
    /// are all on disk (downloaded or already present).
    ContiguousPrefix,
}

/// Data storage and state management
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Resume marker update policy
    #[serde(default)]
    pub resume_policy: ResumePolicy,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            resume_policy: ResumePolicy::default(),
        }
    }
}

/// Ring API endpoints and client identity
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RingConfig {
    /// OAuth token endpoint
    #[serde(default = "default_oauth_url")]
    pub oauth_url: String,

    /// Base URL of the clients API (must end with '/')
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// OAuth client id presented to Ring
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// User-Agent header for all requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout for API calls (recording bodies stream without a total limit)
    #[serde(default = "default_request_timeout", with = "duration_ms_serde")]
    pub request_timeout: Duration,

    /// Number of history events requested per page
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            oauth_url: default_oauth_url(),
            api_base_url: default_api_base_url(),
            client_id: default_client_id(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
            history_page_size: default_history_page_size(),
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry policy for individual recordings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Persisted state location and resume policy
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Ring API settings
    #[serde(default)]
    pub ring: RingConfig,
}

impl Config {
    /// Check invariants that must hold before any work starts
    pub fn validate(&self) -> Result<()> {
        if self.download.concurrency == 0 {
            return Err(Error::config(
                "threads",
                "concurrency must be at least 1",
            ));
        }
        if self.download.file_extension.is_empty() {
            return Err(Error::config(
                "file_extension",
                "file extension must not be empty",
            ));
        }
        if self.ring.history_page_size == 0 {
            return Err(Error::config(
                "history_page_size",
                "history page size must be at least 1",
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_concurrency() -> usize {
    10
}

fn default_launch_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_file_extension() -> String {
    "mp4".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_oauth_url() -> String {
    "https://oauth.ring.com/oauth/token".to_string()
}

fn default_api_base_url() -> String {
    "https://api.ring.com/clients_api/".to_string()
}

fn default_client_id() -> String {
    "ring_official_android".to_string()
}

fn default_user_agent() -> String {
    concat!("ring-recordings-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_history_page_size() -> u32 {
    50
}

// Duration serialization helper (milliseconds)
pub(crate) mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
