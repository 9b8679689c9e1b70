use super::*;
use crate::downloader::RecordingFetcher;
use crate::error::{FetchError, RingError};
use crate::history::{HistoryProvider, HistoryQuery};
use crate::types::{RecordingId, WorkItem, WorkItemLayout};
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{body_partial_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_body(access: &str, refresh: &str, expires_in: u64) -> serde_json::Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": expires_in,
        "scope": "client",
        "token_type": "Bearer"
    })
}

fn client_for(server: &MockServer) -> RingClient {
    let config = RingConfig {
        oauth_url: format!("{}/oauth/token", server.uri()),
        api_base_url: format!("{}/clients_api", server.uri()),
        request_timeout: Duration::from_secs(5),
        history_page_size: 2,
        ..RingConfig::default()
    };
    RingClient::new(config).unwrap()
}

/// Client logged in with a long-lived access token "access-1"
async fn logged_in_client(server: &MockServer) -> RingClient {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({"grant_type": "password"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1", "refresh-1", 3600)))
        .mount(server)
        .await;
    let client = client_for(server);
    client.login_with_password("me@example.com", "hunter2", None).await.unwrap();
    client
}

fn event(id: i64, created_at: &str) -> serde_json::Value {
    json!({"id": id, "created_at": created_at, "kind": "motion", "answered": false})
}

// -----------------------------------------------------------------------
// authentication
// -----------------------------------------------------------------------

#[tokio::test]
async fn password_login_sends_credentials_and_caches_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(header("2fa-support", "true"))
        .and(body_partial_json(json!({
            "client_id": "ring_official_android",
            "grant_type": "password",
            "scope": "client",
            "username": "me@example.com",
            "password": "hunter2"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a", "r-from-login", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.current_refresh_token().await, None);

    client.login_with_password("me@example.com", "hunter2", None).await.unwrap();

    assert_eq!(client.current_refresh_token().await.as_deref(), Some("r-from-login"));
}

#[tokio::test]
async fn two_factor_required_then_code_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(header("2fa-code", "123456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a", "r", 3600)))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(412))
        .with_priority(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.login_with_password("me@example.com", "pw", None).await.unwrap_err();
    assert!(matches!(err, Error::Ring(RingError::TwoFactorRequired)));

    client
        .login_with_password("me@example.com", "pw", Some("123456"))
        .await
        .unwrap();
    assert_eq!(client.current_refresh_token().await.as_deref(), Some("r"));
}

#[tokio::test]
async fn throttled_and_rejected_logins_map_to_ring_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({"username": "throttled@example.com"})))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({"username": "wrong@example.com"})))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let client = client_for(&server);

    let err = client.login_with_password("throttled@example.com", "pw", None).await.unwrap_err();
    assert!(matches!(err, Error::Ring(RingError::Throttled)));

    let err = client.login_with_password("wrong@example.com", "pw", None).await.unwrap_err();
    match err {
        Error::Ring(RingError::AuthenticationFailed(msg)) => assert!(msg.contains("invalid_grant")),
        other => panic!("expected authentication failure, got {:?}", other),
    }
}

#[tokio::test]
async fn expired_access_token_is_refreshed_before_api_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({"grant_type": "refresh_token", "refresh_token": "cached"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("stale", "rotated-1", 0)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({"grant_type": "refresh_token", "refresh_token": "rotated-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh", "rotated-2", 3600)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clients_api/ring_devices"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"doorbots": [], "stickup_cams": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.login_with_refresh_token("cached").await.unwrap();

    let devices = client.devices().await.unwrap();

    assert_eq!(devices.total(), 0);
    assert_eq!(client.current_refresh_token().await.as_deref(), Some("rotated-2"));
}

#[tokio::test]
async fn api_call_without_login_fails() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let err = client.devices().await.unwrap_err();
    assert!(matches!(err, Error::Ring(RingError::AuthenticationFailed(_))));
}

// -----------------------------------------------------------------------
// devices and history
// -----------------------------------------------------------------------

#[tokio::test]
async fn devices_are_grouped_as_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clients_api/ring_devices"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "doorbots": [{"id": 1, "description": "Front Door", "kind": "doorbell_v3"}],
            "authorized_doorbots": [],
            "stickup_cams": [
                {"id": 2, "description": "Garden"},
                {"id": 3, "description": "Garage", "kind": "cocoa_camera"}
            ],
            "chimes": [{"id": 9}]
        })))
        .mount(&server)
        .await;
    let client = logged_in_client(&server).await;

    let devices = client.devices().await.unwrap();

    assert_eq!(devices.total(), 3);
    let groups = devices.groups();
    let headings: Vec<&str> = groups.iter().map(|(h, _)| *h).collect();
    assert_eq!(headings, vec!["Doorbells", "Stickup cams"]);
    assert_eq!(devices.doorbots[0].description, "Front Door");
    assert_eq!(devices.stickup_cams[0].kind, None);
}

#[tokio::test]
async fn history_pages_until_window_start() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clients_api/doorbots/42/history"))
        .and(query_param("limit", "2"))
        .and(query_param_is_missing("older_than"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            event(105, "2024-03-05T10:00:00Z"),
            event(104, "2024-03-04T10:00:00Z")
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clients_api/doorbots/42/history"))
        .and(query_param("older_than", "104"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 103, "kind": "ding"},
            event(102, "2024-02-01T10:00:00Z")
        ])))
        .expect(1)
        .mount(&server)
        .await;
    // Never requested: the previous page already reached past the start
    Mock::given(method("GET"))
        .and(path("/clients_api/doorbots/42/history"))
        .and(query_param("older_than", "102"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([event(101, "2024-01-01T10:00:00Z")])))
        .expect(0)
        .mount(&server)
        .await;
    let client = logged_in_client(&server).await;

    let query = HistoryQuery {
        start: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        end: Some(Utc.with_ymd_and_hms(2024, 3, 4, 23, 0, 0).unwrap()),
        device_id: Some(42),
    };
    let events = client.history(&query).await.unwrap();

    // 105 is after the end, 102 before the start, 103 is undated and passed through
    let ids: Vec<i64> = events.iter().filter_map(|e| e.id).collect();
    assert_eq!(ids, vec![104, 103]);
}

#[tokio::test]
async fn history_for_all_devices_stops_on_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clients_api/doorbots/history"))
        .and(query_param_is_missing("older_than"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([event(7, "2024-03-05T10:00:00Z")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clients_api/doorbots/history"))
        .and(query_param("older_than", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    let client = logged_in_client(&server).await;

    let query = HistoryQuery {
        start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        end: None,
        device_id: None,
    };
    let events = client.history(&query).await.unwrap();

    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn unknown_device_maps_to_device_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clients_api/doorbots/999/history"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let client = logged_in_client(&server).await;

    let query = HistoryQuery {
        start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        end: None,
        device_id: Some(999),
    };
    let err = client.history(&query).await.unwrap_err();

    assert!(matches!(err, Error::DeviceNotFound(999)));
}

// -----------------------------------------------------------------------
// recording download
// -----------------------------------------------------------------------

fn item_in(dir: &std::path::Path, id: i64) -> WorkItem {
    WorkItem::new(
        RecordingId(id),
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap(),
        "motion",
        &WorkItemLayout {
            output_dir: dir.to_path_buf(),
            extension: "mp4".to_string(),
        },
    )
}

#[tokio::test]
async fn recording_is_streamed_to_destination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clients_api/dings/555/recording"))
        .and(query_param("disable_redirect", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": format!("{}/media/555.mp4", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/555.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
        .mount(&server)
        .await;
    let client = logged_in_client(&server).await;
    let dir = tempdir().unwrap();
    let item = item_in(dir.path(), 555);

    let bytes = client.fetch(&item, item.destination()).await.unwrap();

    assert_eq!(bytes, 4096);
    assert_eq!(std::fs::read(item.destination()).unwrap().len(), 4096);
    assert!(!recording::partial_path(item.destination()).exists());
}

#[tokio::test]
async fn missing_recording_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clients_api/dings/556/recording"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let client = logged_in_client(&server).await;
    let dir = tempdir().unwrap();
    let item = item_in(dir.path(), 556);

    let err = client.fetch(&item, item.destination()).await.unwrap_err();

    assert!(matches!(err, FetchError::Permanent(_)));
    assert!(!item.destination().exists());
}

#[tokio::test]
async fn server_error_on_media_is_transient_and_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clients_api/dings/557/recording"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": format!("{}/media/557.mp4", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/557.mp4"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let client = logged_in_client(&server).await;
    let dir = tempdir().unwrap();
    let item = item_in(dir.path(), 557);

    let err = client.fetch(&item, item.destination()).await.unwrap_err();

    assert!(matches!(err, FetchError::Transient(_)));
    assert!(!item.destination().exists());
    assert!(!recording::partial_path(item.destination()).exists());
}

#[tokio::test]
async fn malformed_recording_url_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clients_api/dings/558/recording"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": "not a url"})))
        .mount(&server)
        .await;
    let client = logged_in_client(&server).await;
    let dir = tempdir().unwrap();
    let item = item_in(dir.path(), 558);

    let err = client.fetch(&item, item.destination()).await.unwrap_err();

    assert!(matches!(err, FetchError::Permanent(_)));
}

#[test]
fn invalid_api_base_is_a_config_error() {
    let config = RingConfig {
        api_base_url: "not a url".to_string(),
        ..RingConfig::default()
    };
    assert!(matches!(RingClient::new(config), Err(Error::Config { .. })));
}
