//! Thin client for the Ring REST API.
//!
//! [`RingClient`] authenticates against Ring's OAuth endpoint and implements the two
//! collaborator traits the downloader needs:
//! - [`HistoryProvider`](crate::history::HistoryProvider) - paged event history
//! - [`RecordingFetcher`](crate::downloader::RecordingFetcher) - recording download
//!
//! Methods are organized by domain:
//! - [`auth`] - Password / refresh-token login and access-token refresh
//! - [`api`] - Device listing and history enumeration
//! - [`recording`] - Streaming a recording to disk

mod api;
mod auth;
mod models;
mod recording;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use models::{Device, DeviceList};

use url::Url;

use crate::config::RingConfig;
use crate::error::{Error, Result};

use models::Session;

/// Authenticated Ring API client (one per account)
pub struct RingClient {
    http: reqwest::Client,
    config: RingConfig,
    /// Parsed `config.api_base_url`
    api_base: Url,
    /// None until a login succeeds
    session: tokio::sync::Mutex<Option<Session>>,
}

impl RingClient {
    /// Create a client; no network activity happens until a login method is called
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the API base URL is invalid.
    pub fn new(config: RingConfig) -> Result<Self> {
        let mut base = config.api_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let api_base = Url::parse(&base).map_err(|e| {
            Error::config("api_base_url", format!("invalid Ring API URL '{}': {}", base, e))
        })?;

        // No total timeout on the client: recording bodies may take long to stream.
        // API calls set `request_timeout` per request.
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "Failed to create HTTP client: {}",
                    e
                )))
            })?;

        Ok(Self {
            http,
            config,
            api_base,
            session: tokio::sync::Mutex::new(None),
        })
    }

    /// Resolve a path relative to the API base URL
    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_base
            .join(path)
            .map_err(|e| Error::Other(format!("invalid Ring API path '{}': {}", path, e)))
    }
}
