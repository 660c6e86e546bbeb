//! Authentication middleware.
//!
//! Requires the shared access password (`?pass=`) or, for server-to-server
//! callers, HTTP Basic credentials of the configured service account.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, Query, State},
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use domain::services::AccessGate;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::{ApiError, INVALID_PASSWORD_MESSAGE};

/// How an authenticated request proved its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// Holder of the shared access password.
    MapClient,
    /// Server-to-server service account.
    Service,
}

impl Caller {
    pub fn as_str(&self) -> &'static str {
        match self {
            Caller::MapClient => "map_client",
            Caller::Service => "service",
        }
    }
}

impl std::fmt::Display for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PassQuery {
    #[serde(default)]
    pass: Option<String>,
}

/// Middleware that requires the end-user credential.
///
/// The authenticated [`Caller`] is stored in request extensions.
pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state.gate, &req) {
        Some(caller) => {
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        None => {
            tracing::warn!(
                remote_addr = %remote_addr(&req),
                method = %req.method(),
                path = %req.uri().path(),
                "Unauthorized access attempt"
            );
            ApiError::Forbidden(INVALID_PASSWORD_MESSAGE.to_string()).into_response()
        }
    }
}

fn authenticate(gate: &AccessGate, req: &Request<Body>) -> Option<Caller> {
    let pass = Query::<PassQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(query)| query.pass);

    if let Some(pass) = pass {
        if gate.authorize_user(&pass) {
            return Some(Caller::MapClient);
        }
    }

    if gate.service_enabled() {
        if let Some((username, password)) = basic_credentials(req) {
            if gate.authorize_service(&username, &password) {
                return Some(Caller::Service);
            }
        }
    }

    None
}

/// Decodes `Authorization: Basic` credentials.
fn basic_credentials(req: &Request<Body>) -> Option<(String, String)> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Remote peer address, when the server was started with connect info.
pub fn remote_addr(req: &Request<Body>) -> String {
    peer_ip(req.extensions().get::<ConnectInfo<SocketAddr>>())
}

/// Peer IP for log fields; `unknown` without connect info.
pub fn peer_ip(connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
