//! Streaming a recording to disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::downloader::RecordingFetcher;
use crate::error::FetchError;
use crate::types::{RecordingId, WorkItem};

use super::RingClient;
use super::models::RecordingUrl;

/// Sibling path a recording is streamed to before it is renamed into place
pub(crate) fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

impl RingClient {
    /// Ask Ring for the (short-lived, pre-signed) download URL of a recording
    async fn recording_url(&self, id: RecordingId) -> Result<Url, FetchError> {
        let mut url = self
            .endpoint(&format!("dings/{}/recording", id))
            .map_err(|e| FetchError::Permanent(e.to_string()))?;
        url.query_pairs_mut().append_pair("disable_redirect", "true");

        let response = self.authorized_get(url).await.map_err(|e| match e {
            crate::Error::Network(err) => FetchError::from_reqwest(&err),
            // Session refresh failures may clear up on a later attempt
            other => FetchError::Transient(other.to_string()),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status, "requesting recording URL"));
        }

        let body: RecordingUrl = response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;
        Url::parse(&body.url)
            .map_err(|e| FetchError::Permanent(format!("invalid recording URL: {}", e)))
    }

    /// Stream `url` to `destination` through a `.part` file
    async fn download_to(&self, url: Url, destination: &Path) -> Result<u64, FetchError> {
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status, "downloading recording"));
        }

        let partial = partial_path(destination);
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(|e| FetchError::from_io(&e))?;

        let written = async {
            let mut written: u64 = 0;
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| FetchError::from_reqwest(&e))?
            {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| FetchError::from_io(&e))?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(|e| FetchError::from_io(&e))?;
            Ok::<u64, FetchError>(written)
        }
        .await;
        drop(file);

        let result = match written {
            Ok(bytes) => tokio::fs::rename(&partial, destination)
                .await
                .map(|()| bytes)
                .map_err(|e| FetchError::from_io(&e)),
            Err(e) => Err(e),
        };
        if result.is_err() {
            // Never leave a partial file behind
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result
    }
}

#[async_trait]
impl RecordingFetcher for RingClient {
    async fn fetch(&self, item: &WorkItem, destination: &Path) -> Result<u64, FetchError> {
        let url = self.recording_url(item.id()).await?;
        tracing::debug!(recording_id = %item.id(), host = ?url.host_str(), "Downloading recording");
        self.download_to(url, destination).await
    }
}
