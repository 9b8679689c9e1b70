//! Wire models for the Ring REST API.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Treat an access token as expired this long before Ring would
const EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// OAuth token endpoint response
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) refresh_token: String,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub(crate) expires_in: Option<u64>,
}

/// OAuth token request body
#[derive(Debug, Serialize)]
pub(crate) struct TokenRequest<'a> {
    pub(crate) client_id: &'a str,
    pub(crate) grant_type: &'a str,
    pub(crate) scope: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) refresh_token: Option<&'a str>,
}

/// Authenticated session state
#[derive(Clone, Debug)]
pub(crate) struct Session {
    pub(crate) access_token: String,
    pub(crate) refresh_token: String,
    pub(crate) expires_at: Option<Instant>,
}

impl Session {
    pub(crate) fn from_token(token: TokenResponse) -> Self {
        Self {
            expires_at: token
                .expires_in
                .map(|secs| Instant::now() + Duration::from_secs(secs)),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
        }
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| Instant::now() + EXPIRY_SKEW >= at)
    }
}

/// A Ring doorbell or camera
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device id (used with `--deviceid`)
    pub id: i64,
    /// User-assigned name
    #[serde(default)]
    pub description: String,
    /// Hardware kind reported by Ring
    #[serde(default)]
    pub kind: Option<String>,
}

/// Devices registered under the account, grouped the way Ring reports them
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceList {
    /// Doorbells owned by the account
    #[serde(default)]
    pub doorbots: Vec<Device>,
    /// Doorbells shared with the account
    #[serde(default)]
    pub authorized_doorbots: Vec<Device>,
    /// Stick-up and other cameras
    #[serde(default)]
    pub stickup_cams: Vec<Device>,
}

impl DeviceList {
    /// Number of devices across all groups
    pub fn total(&self) -> usize {
        self.doorbots.len() + self.authorized_doorbots.len() + self.stickup_cams.len()
    }

    /// Non-empty groups with a display heading, in listing order
    pub fn groups(&self) -> Vec<(&'static str, &[Device])> {
        [
            ("Authorized Doorbells", self.authorized_doorbots.as_slice()),
            ("Doorbells", self.doorbots.as_slice()),
            ("Stickup cams", self.stickup_cams.as_slice()),
        ]
        .into_iter()
        .filter(|(_, devices)| !devices.is_empty())
        .collect()
    }
}

/// Response of the recording URL endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct RecordingUrl {
    pub(crate) url: String,
}
