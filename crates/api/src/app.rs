use axum::{
    error_handling::HandleErrorLayer,
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use domain::services::{AccessGate, AggregationService, TrackingSource};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::{Config, ConfigValidationError};
use crate::error::handle_layer_error;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, require_user,
    security_headers_middleware, trace_id, RateLimiterState,
};
use crate::routes::{health, health::UpstreamHealth, tracker};
use crate::services::TraccarClient;

/// Preflight cache lifetime sent to browsers.
const CORS_MAX_AGE: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub source: Arc<dyn TrackingSource>,
    pub upstream: UpstreamHealth,
    pub gate: Arc<AccessGate>,
    pub aggregation: AggregationService,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    /// Builds shared state around any tracking data source.
    pub fn new(
        config: Config,
        source: Arc<dyn TrackingSource>,
        upstream: UpstreamHealth,
    ) -> Result<Self, ConfigValidationError> {
        let aggregation = AggregationService::new(config.display.zone()?);

        let security = &config.security;
        let gate = AccessGate::new(&security.access_password, &security.admin_password)
            .with_service_account(&security.service_username, &security.service_password);

        // Create rate limiter if rate limiting is enabled (rate_limit_per_minute > 0)
        let rate_limiter = (security.rate_limit_per_minute > 0)
            .then(|| Arc::new(RateLimiterState::new(security.rate_limit_per_minute)));

        info!(
            admin_enabled = gate.admin_enabled(),
            service_account = gate.service_enabled(),
            rate_limit_per_minute = security.rate_limit_per_minute,
            timezone = %aggregation.zone(),
            "Access gate configured"
        );

        Ok(Self {
            config: Arc::new(config),
            source,
            upstream,
            gate: Arc::new(gate),
            aggregation,
            rate_limiter,
        })
    }
}

/// Builds the application against the configured tracking server.
pub fn create_app(config: Config) -> anyhow::Result<Router> {
    let client = TraccarClient::new(&config.upstream)?;
    let upstream = UpstreamHealth {
        base_url: client.base_url().to_string(),
        transport: client.transport().as_str().to_string(),
    };
    info!(
        base_url = %upstream.base_url,
        transport = %upstream.transport,
        "Tracking server client ready"
    );

    let state = AppState::new(config, Arc::new(client), upstream)?;
    Ok(router(state))
}

fn cors_layer(config: &Config) -> CorsLayer {
    // Without configured origins no cross-origin access is granted
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(CORS_MAX_AGE)
}

/// Assembles routes and middleware around prepared state.
pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    // Rate limiting runs before the password check so guesses are throttled
    let tracker_routes = Router::new()
        .route("/backend/api.php", tracker::method_router())
        .route("/api/v1/tracker", tracker::method_router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(tracker_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        // Timed out requests get the JSON error body
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_layer_error))
                .timeout(Duration::from_secs(config.server.request_timeout_secs)),
        )
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config))
        // Outermost so preflight and timeout responses carry the headers too
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .with_state(state)
}
