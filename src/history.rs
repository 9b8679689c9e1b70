//! Raw history events and the provider that enumerates them.
//!
//! [`HistoryEvent`] mirrors the JSON the Ring API returns for one entry of a device's
//! event history. Every field is optional so that partial or evolving payloads still
//! parse; the selection step decides what is usable.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::RecordingId;

/// Naive layouts accepted for `created_at` when it is not RFC 3339 (read as UTC)
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// One historical event as returned by the remote service
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Unique identifier of this event
    #[serde(default)]
    pub id: Option<i64>,

    /// Raw creation timestamp
    #[serde(default)]
    pub created_at: Option<String>,

    /// Event kind (e.g., "motion", "ding", "on_demand")
    #[serde(default)]
    pub kind: Option<String>,

    /// Whether the event was answered
    #[serde(default)]
    pub answered: bool,

    /// Whether the event is marked as favorite
    #[serde(default)]
    pub favorite: bool,

    /// Snapshot image URL
    #[serde(default)]
    pub snapshot_url: Option<String>,

    /// Recording availability
    #[serde(default)]
    pub recording: Option<RecordingStatus>,

    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,

    /// Computer vision properties
    #[serde(default)]
    pub cv_properties: Option<CvProperties>,

    /// General event properties
    #[serde(default)]
    pub properties: Option<EventProperties>,

    /// Device that captured the event
    #[serde(default)]
    pub doorbot: Option<DoorbotInfo>,

    /// End-to-end encrypted recording
    #[serde(default)]
    pub is_e2ee: bool,

    /// Subscription active at the time of the event
    #[serde(default)]
    pub had_subscription: bool,

    /// Owner of the device
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl HistoryEvent {
    /// Identifier, if present
    pub fn recording_id(&self) -> Option<RecordingId> {
        self.id.map(RecordingId)
    }

    /// Parsed creation time, or `None` when absent or unparsable
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_event_timestamp)
    }
}

/// Parse an event timestamp: RFC 3339 first, then the naive layouts as UTC
pub fn parse_event_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Recording availability
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingStatus {
    /// Status string (e.g., "ready")
    #[serde(default)]
    pub status: Option<String>,
}

/// Computer vision properties
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CvProperties {
    /// A person was detected
    #[serde(default)]
    pub person_detected: Option<bool>,
    /// The stream was broken
    #[serde(default)]
    pub stream_broken: Option<bool>,
    /// Primary detection type
    #[serde(default)]
    pub detection_type: Option<String>,
    /// All detection types
    #[serde(default)]
    pub detection_types: Option<Vec<DetectionType>>,
    /// Opaque security alert payload
    #[serde(default)]
    pub security_alerts: Option<serde_json::Value>,
}

/// One detection classification
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionType {
    /// Detection type name
    #[serde(rename = "detection_type", default)]
    pub kind: Option<String>,
    /// Verified timestamps
    #[serde(default)]
    pub verified_timestamps: Vec<i64>,
}

/// General event properties
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventProperties {
    /// Triggered through Alexa
    #[serde(default)]
    pub is_alexa: bool,
    /// Delivered over Sidewalk
    #[serde(default)]
    pub is_sidewalk: bool,
    /// Auto-reply was used
    #[serde(default)]
    pub is_autoreply: bool,
}

/// Device that captured an event
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorbotInfo {
    /// Device id
    #[serde(default)]
    pub id: i64,
    /// Device description
    #[serde(default)]
    pub description: Option<String>,
    /// Device type
    #[serde(rename = "type", default)]
    pub device_type: Option<String>,
}

/// Time window and device scope of a history enumeration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Oldest event time to include
    pub start: DateTime<Utc>,
    /// Newest event time to include (None = now)
    pub end: Option<DateTime<Utc>>,
    /// Restrict to one device (None = all devices)
    pub device_id: Option<i64>,
}

/// Source of historical events
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Enumerate events within the query window, in any order
    ///
    /// Fails with [`crate::Error::DeviceNotFound`] when `device_id` is unknown.
    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryEvent>>;
}
