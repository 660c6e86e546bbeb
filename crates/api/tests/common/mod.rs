//! Common test utilities for integration tests.
//!
//! Tests run the full router against a wiremock server standing in for the
//! tracking platform.

// Allow dead code in this module - not every integration test uses every helper.
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{Method, Request},
    response::Response,
    Router,
};
use gps_tracker_api::{
    app::create_app,
    config::{
        Config, DisplayConfig, LoggingConfig, SecurityConfig, ServerConfig, UpstreamConfig,
    },
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const ACCESS_PASSWORD: &str = "map-secret";
pub const ADMIN_PASSWORD: &str = "admin-secret";
pub const SERVICE_USERNAME: &str = "dispatch";
pub const SERVICE_PASSWORD: &str = "dispatch-secret";

/// Test configuration pointing at the given upstream URL.
pub fn test_config(upstream_url: &str) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            access_password: ACCESS_PASSWORD.to_string(),
            admin_password: ADMIN_PASSWORD.to_string(),
            service_username: SERVICE_USERNAME.to_string(),
            service_password: SERVICE_PASSWORD.to_string(),
            cors_origins: vec!["https://map.example.com".to_string()],
            rate_limit_per_minute: 0, // Disable rate limiting for tests
            hsts_enabled: false,
        },
        upstream: UpstreamConfig {
            url: upstream_url.to_string(),
            username: "svc@example.com".to_string(),
            password: "platform-secret".to_string(),
            timeout_secs: 5,
        },
        display: DisplayConfig {
            timezone: "Europe/Warsaw".to_string(),
        },
    }
}

/// Create a test application router.
pub fn create_test_app(config: Config) -> Router {
    create_app(config).expect("Failed to build test app")
}

/// Build a request, optionally with a JSON body.
pub fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Attach a peer address the way `into_make_service_with_connect_info` does.
pub fn from_peer(mut request: Request<Body>, peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// Parse a JSON response body.
pub async fn parse_response_body(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

pub fn tracker_uri(query: &str) -> String {
    format!("/backend/api.php?pass={}{}", ACCESS_PASSWORD, query)
}

/// Devices, positions and groups as the tracking platform returns them.
pub fn sample_devices() -> Value {
    json!([
        {"id": 1, "name": "Karetka 1", "uniqueId": "2111111111", "groupId": 5,
         "attributes": {"description": "Stacja główna"}},
        {"id": 2, "name": "Pickup", "uniqueId": "3222222222", "groupId": 0},
        {"id": 3, "name": "Bez pozycji", "uniqueId": "4333333333"}
    ])
}

pub fn sample_positions() -> Value {
    json!([
        {"id": 100, "deviceId": 1, "latitude": 52.2296756, "longitude": 21.0122287,
         "fixTime": "2024-06-01T10:00:00.000+00:00", "attributes": {"batteryLevel": 87}},
        {"id": 200, "deviceId": 2, "latitude": 50.0647, "longitude": 19.945,
         "fixTime": "2024-01-15T08:30:00Z", "attributes": {}}
    ])
}

pub fn sample_groups() -> Value {
    json!([{"id": 5, "name": "Fleet A"}])
}

/// Mount a GET mock for one upstream collection.
pub async fn mount_list(server: &MockServer, resource: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/api/{}", resource)))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Mount the sample devices, positions and groups.
pub async fn mount_sample_fleet(server: &MockServer) {
    mount_list(
        server,
        "devices",
        ResponseTemplate::new(200).set_body_json(sample_devices()),
    )
    .await;
    mount_list(
        server,
        "positions",
        ResponseTemplate::new(200).set_body_json(sample_positions()),
    )
    .await;
    mount_list(
        server,
        "groups",
        ResponseTemplate::new(200).set_body_json(sample_groups()),
    )
    .await;
}
