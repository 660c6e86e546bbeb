//! HTTP client for the Traccar tracking server.
//!
//! Reads use a client that never follows redirects; device creation uses a
//! second client limited to three redirect hops. When the TLS client cannot
//! be constructed a minimal HTTP/1 client is used instead.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use domain::models::{Device, Group, NewDevice, Position};
use domain::services::{SourceError, TrackingSource};
use metrics::{counter, histogram};
use reqwest::{header, redirect, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::UpstreamConfig;

/// User agent sent with every upstream request.
pub const USER_AGENT: &str = "WAPM-GPS-Tracker/1.0";

/// Maximum redirect hops followed when creating a device.
const MAX_CREATE_REDIRECTS: usize = 3;

/// Longest upstream text body carried into an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while talking to the tracking server.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tracking server returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response from tracking server: {0}")]
    InvalidResponse(String),
}

impl From<UpstreamError> for SourceError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Timeout(_) => SourceError::Timeout,
            UpstreamError::Status { status, message } => SourceError::Status { status, message },
            UpstreamError::InvalidResponse(msg) => SourceError::InvalidResponse(msg),
            UpstreamError::ClientBuild(msg) => SourceError::Transport(msg),
            UpstreamError::Http(e) => SourceError::Transport(e.to_string()),
        }
    }
}

// ============================================================================
// Resources and transports
// ============================================================================

/// Collection endpoints exposed by the tracking server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Devices,
    Positions,
    Groups,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Devices, Resource::Positions, Resource::Groups];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Devices => "devices",
            Resource::Positions => "positions",
            Resource::Groups => "groups",
        }
    }
}

/// Which HTTP client the upstream connection was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Primary,
    Fallback,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Primary => "primary",
            Transport::Fallback => "fallback",
        }
    }
}

/// Read and write clients built together so they share a transport.
#[derive(Debug, Clone)]
struct Clients {
    read: Client,
    write: Client,
}

fn primary_clients(timeout: Duration) -> reqwest::Result<Clients> {
    let build = |policy: redirect::Policy| {
        Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(policy)
            .build()
    };

    Ok(Clients {
        read: build(redirect::Policy::none())?,
        write: build(redirect::Policy::limited(MAX_CREATE_REDIRECTS))?,
    })
}

/// Minimal clients without the primary's builder options.
///
/// Same reqwest and TLS stack as the primary, so this only recovers from a
/// rejected builder option (user agent, timeout, TLS backend selection), not
/// from a broken TLS stack. Timeouts are still applied per request.
fn fallback_clients() -> reqwest::Result<Clients> {
    let build = |policy: redirect::Policy| Client::builder().http1_only().redirect(policy).build();

    Ok(Clients {
        read: build(redirect::Policy::none())?,
        write: build(redirect::Policy::limited(MAX_CREATE_REDIRECTS))?,
    })
}

/// Uses the primary clients when they build, otherwise the fallback.
fn select_transport<P, F>(primary: P, fallback: F) -> Result<(Clients, Transport), UpstreamError>
where
    P: FnOnce() -> reqwest::Result<Clients>,
    F: FnOnce() -> reqwest::Result<Clients>,
{
    match primary() {
        Ok(clients) => Ok((clients, Transport::Primary)),
        Err(primary_err) => {
            warn!(error = %primary_err, "Primary HTTP client unavailable, using fallback transport");
            fallback()
                .map(|clients| (clients, Transport::Fallback))
                .map_err(|e| UpstreamError::ClientBuild(e.to_string()))
        }
    }
}

/// Normalizes an operator supplied base URL so it ends in `/api`.
///
/// A trailing resource segment (`/positions`, `/devices`, `/groups`) is
/// dropped, so both `https://host/api/positions` and `https://host` work.
pub fn normalize_base_url(raw: &str) -> String {
    let mut url = raw.trim().trim_end_matches('/').to_string();

    for resource in Resource::ALL {
        let suffix = format!("/{}", resource.as_str());
        if let Some(stripped) = url.strip_suffix(suffix.as_str()) {
            url = stripped.trim_end_matches('/').to_string();
            break;
        }
    }

    if !url.ends_with("/api") {
        url.push_str("/api");
    }
    url
}

/// Picks the most useful message out of an upstream error body.
///
/// Prefers a JSON `message` field, then the trimmed text body, then the
/// status line.
fn upstream_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            if !message.trim().is_empty() {
                return message.trim().to_string();
            }
        }
    }

    let text = body.trim();
    if !text.is_empty() {
        return text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    }

    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Decodes a list body, skipping entries that do not match `T`.
///
/// Valid JSON that is not an array is treated as an empty list.
fn decode_list<T: DeserializeOwned>(
    resource: Resource,
    body: &str,
) -> Result<Vec<T>, UpstreamError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| UpstreamError::InvalidResponse(format!("{}: {}", resource.as_str(), e)))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        other => {
            warn!(
                resource = resource.as_str(),
                kind = json_kind(&other),
                "Expected a JSON array from tracking server, treating as empty"
            );
            return Ok(Vec::new());
        }
    };

    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(
                    resource = resource.as_str(),
                    index,
                    error = %e,
                    "Skipping malformed entry from tracking server"
                );
                None
            }
        })
        .collect();

    debug!(
        resource = resource.as_str(),
        total,
        decoded = decoded.len(),
        "Decoded upstream list"
    );
    Ok(decoded)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn record_call<T>(
    resource: Resource,
    operation: &'static str,
    started: Instant,
    result: &Result<T, UpstreamError>,
) {
    let outcome = match result {
        Ok(_) => "success",
        Err(UpstreamError::Timeout(_)) => "timeout",
        Err(UpstreamError::Status { .. }) => "http_error",
        Err(UpstreamError::InvalidResponse(_)) => "invalid_response",
        Err(_) => "transport_error",
    };

    counter!(
        "upstream_requests_total",
        "resource" => resource.as_str(),
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        "upstream_request_duration_seconds",
        "resource" => resource.as_str(),
        "operation" => operation
    )
    .record(started.elapsed().as_secs_f64());
}

// ============================================================================
// Client
// ============================================================================

/// Authenticated client for the tracking server REST API.
#[derive(Clone)]
pub struct TraccarClient {
    base_url: String,
    username: String,
    password: String,
    timeout: Duration,
    clients: Clients,
    transport: Transport,
}

impl TraccarClient {
    /// Create a client from configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let (clients, transport) = select_transport(|| primary_clients(timeout), fallback_clients)?;
        Ok(Self::with_clients(config, clients, transport))
    }

    fn with_clients(config: &UpstreamConfig, clients: Clients, transport: Transport) -> Self {
        Self {
            base_url: normalize_base_url(&config.url),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            clients,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    fn url(&self, resource: Resource) -> String {
        format!("{}/{}", self.base_url, resource.as_str())
    }

    fn map_send_error(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.timeout.as_secs())
        } else {
            UpstreamError::Http(err)
        }
    }

    async fn read_body(&self, response: Response) -> Result<String, UpstreamError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: upstream_message(status, &body),
            });
        }
        Ok(body)
    }

    /// GET a collection resource.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        resource: Resource,
    ) -> Result<Vec<T>, UpstreamError> {
        let started = Instant::now();
        let result = self.fetch_inner(resource).await;
        record_call(resource, "fetch", started, &result);

        if let Err(e) = &result {
            error!(resource = resource.as_str(), error = %e, "Tracking server fetch failed");
        }
        result
    }

    async fn fetch_inner<T: DeserializeOwned>(
        &self,
        resource: Resource,
    ) -> Result<Vec<T>, UpstreamError> {
        let response = self
            .clients
            .read
            .get(self.url(resource))
            .basic_auth(&self.username, Some(&self.password))
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let body = self.read_body(response).await?;
        decode_list(resource, &body)
    }

    /// POST a new record to a collection resource.
    pub async fn create(
        &self,
        resource: Resource,
        payload: &impl serde::Serialize,
    ) -> Result<serde_json::Value, UpstreamError> {
        let started = Instant::now();
        let result = self.create_inner(resource, payload).await;
        record_call(resource, "create", started, &result);

        if let Err(e) = &result {
            error!(resource = resource.as_str(), error = %e, "Tracking server create failed");
        }
        result
    }

    async fn create_inner(
        &self,
        resource: Resource,
        payload: &impl serde::Serialize,
    ) -> Result<serde_json::Value, UpstreamError> {
        let response = self
            .clients
            .write
            .post(self.url(resource))
            .basic_auth(&self.username, Some(&self.password))
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let body = self.read_body(response).await?;
        serde_json::from_str(&body).map_err(|e| {
            UpstreamError::InvalidResponse(format!("{}: {}", resource.as_str(), e))
        })
    }
}

impl std::fmt::Debug for TraccarClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraccarClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("transport", &self.transport)
            .finish()
    }
}

#[async_trait]
impl TrackingSource for TraccarClient {
    async fn devices(&self) -> Result<Vec<Device>, SourceError> {
        Ok(self.fetch(Resource::Devices).await?)
    }

    async fn positions(&self) -> Result<Vec<Position>, SourceError> {
        Ok(self.fetch(Resource::Positions).await?)
    }

    async fn groups(&self) -> Result<Vec<Group>, SourceError> {
        Ok(self.fetch(Resource::Groups).await?)
    }

    async fn create_device(&self, device: &NewDevice) -> Result<serde_json::Value, SourceError> {
        let payload = device.clone().transliterated();
        Ok(self.create(Resource::Devices, &payload).await?)
    }
}
