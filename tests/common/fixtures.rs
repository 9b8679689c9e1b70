//! History payloads and configuration helpers

use ring_recordings_dl::Config;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;

/// Device id used by the mock account
pub const DEVICE_ID: i64 = 1234567;

/// One history entry as Ring reports it
pub fn history_event(id: i64, created_at: &str, kind: &str) -> Value {
    json!({
        "id": id,
        "created_at": created_at,
        "answered": false,
        "kind": kind,
        "favorite": false,
        "snapshot_url": "",
        "recording": { "status": "ready" },
        "duration": 31.0,
        "cv_properties": {
            "person_detected": null,
            "stream_broken": null,
            "detection_type": null,
            "detection_types": [],
            "security_alerts": null
        },
        "properties": { "is_alexa": false, "is_sidewalk": false, "is_autoreply": false },
        "doorbot": { "id": DEVICE_ID, "description": "Front Door", "type": "doorbell_v3" },
        "is_e2ee": false,
        "had_subscription": true,
        "owner_id": "42"
    })
}

/// Newest-first page of five events on 2024-03-01, one of them undated
pub fn sample_history() -> Value {
    json!([
        history_event(5005, "2024-03-01T14:00:00.000Z", "motion"),
        history_event(5004, "2024-03-01T13:00:00.000Z", "ding"),
        { "id": 5003, "kind": "motion" },
        history_event(5002, "2024-03-01T11:00:00.000Z", "Motion"),
        history_event(5001, "2024-03-01T10:00:00.000Z", "motion")
    ])
}

/// Engine config writing into `dir`, with short delays
pub fn fast_config(dir: &Path, concurrency: usize) -> Config {
    let mut config = Config::default();
    config.download.output_dir = dir.to_path_buf();
    config.download.concurrency = concurrency;
    config.download.launch_interval = Duration::from_millis(5);
    config.retry.max_retries = 1;
    config.retry.retry_delay = Duration::from_millis(5);
    config
}
