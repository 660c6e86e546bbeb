//! Security and caching headers middleware.
//!
//! Tracker data changes on every request, so every response is marked as
//! non-cacheable in addition to the usual hardening headers.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;

/// `Cache-Control` value sent with every response.
pub const NO_CACHE: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// Middleware that adds security and no-cache headers to all responses.
///
/// Headers added:
/// - `Cache-Control: no-store, no-cache, must-revalidate, max-age=0`
/// - `Pragma: no-cache` and `Expires: 0` for HTTP/1.0 caches
/// - `X-Content-Type-Options: nosniff` - Prevents MIME type sniffing
/// - `X-Frame-Options: DENY` - Prevents clickjacking by disallowing framing
/// - `Strict-Transport-Security` - only when `security.hsts_enabled` is set
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    apply_headers(&mut response, state.config.security.hsts_enabled);
    response
}

fn apply_headers(response: &mut Response, hsts_enabled: bool) {
    let headers = response.headers_mut();

    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));

    // Only meaningful behind TLS termination
    if hsts_enabled {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }
}
