//! wiremock stand-in for the Ring API

use ring_recordings_dl::config::RingConfig;
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Start a mock account with the given newest-first history for [`super::DEVICE_ID`]
pub async fn start_mock_ring(history: Value) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "mock-access",
            "refresh_token": "mock-refresh",
            "expires_in": 3600,
            "scope": "client",
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let history_path = format!("/clients_api/doorbots/{}/history", super::DEVICE_ID);
    Mock::given(method("GET"))
        .and(path(history_path.clone()))
        .and(query_param_is_missing("older_than"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(history_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    server
}

/// Serve recording `id` with `bytes` of content
pub async fn mount_recording(server: &MockServer, id: i64, bytes: usize) {
    Mock::given(method("GET"))
        .and(path(format!("/clients_api/dings/{}/recording", id)))
        .and(query_param("disable_redirect", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": format!("{}/media/{}.mp4", server.uri(), id)
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/media/{}.mp4", id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; bytes]))
        .mount(server)
        .await;
}

/// Make every media request for `id` fail with a server error
pub async fn mount_broken_recording(server: &MockServer, id: i64) {
    Mock::given(method("GET"))
        .and(path(format!("/clients_api/dings/{}/recording", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": format!("{}/media/{}.mp4", server.uri(), id)
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(format!(r"^/media/{}\.mp4$", id)))
        .respond_with(ResponseTemplate::new(503))
        .mount(server)
        .await;
}

/// Client configuration pointing at the mock server
pub fn ring_config(server: &MockServer) -> RingConfig {
    RingConfig {
        oauth_url: format!("{}/oauth/token", server.uri()),
        api_base_url: format!("{}/clients_api/", server.uri()),
        request_timeout: Duration::from_secs(5),
        ..RingConfig::default()
    }
}
