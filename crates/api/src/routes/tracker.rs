//! Tracker endpoint handlers.
//!
//! One URL serves the map frontend:
//! - `GET` lists devices with their latest position (`action=list`, the default)
//! - `GET ?action=verify-admin` checks the administrator password
//! - `POST` registers a new device
//!
//! The shared access password is checked by middleware before any handler runs.

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, ConnectInfo, Query, State},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Extension, Json,
};
use domain::models::{DeviceRegistration, ViewModelRecord};
use domain::services::register_device;
use domain::services::registration::MISSING_FIELDS_MESSAGE;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::AppState;
use crate::error::{timestamp_now, ApiError};
use crate::middleware::auth::{peer_ip, Caller};
use crate::middleware::metrics::{record_device_registered, record_view_model_size};

/// Message returned after a successful registration.
pub const DEVICE_ADDED_MESSAGE: &str = "Device added successfully";

/// Query parameters understood by the tracker endpoint.
///
/// `pass` is consumed by the authentication middleware.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerQuery {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub admin_pass: Option<String>,
}

/// Actions available through `GET`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    List,
    VerifyAdmin,
}

impl Action {
    fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        match raw.map(str::trim).filter(|a| !a.is_empty()) {
            None | Some("list") => Ok(Action::List),
            Some("verify-admin") => Ok(Action::VerifyAdmin),
            Some(other) => Err(ApiError::Validation(format!("Unknown action: {}", other))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub count: usize,
    pub timestamp: String,
    pub data: Vec<ViewModelRecord>,
}

#[derive(Debug, Serialize)]
pub struct VerifyAdminResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateDeviceResponse {
    pub success: bool,
    pub message: String,
    pub device: serde_json::Value,
}

/// Method router mounted on every tracker path.
///
/// Methods other than `GET` and `POST` get a JSON 405.
pub fn method_router() -> MethodRouter<AppState> {
    get(handle_get).post(create_device).fallback(method_not_allowed)
}

fn parse_query(
    query: Result<Query<TrackerQuery>, QueryRejection>,
) -> Result<TrackerQuery, ApiError> {
    query
        .map(|Query(query)| query)
        .map_err(|e| ApiError::Validation(format!("Invalid query string: {}", e.body_text())))
}

/// Who sent a request, for audit log fields.
struct Requester {
    caller: Caller,
    remote_addr: String,
}

impl Requester {
    fn new(caller: Caller, connect_info: Option<ConnectInfo<SocketAddr>>) -> Self {
        Self {
            caller,
            remote_addr: peer_ip(connect_info.as_ref()),
        }
    }

    /// Checks the administrator password, logging rejections.
    fn require_admin(
        &self,
        state: &AppState,
        admin_pass: &str,
        action: &'static str,
    ) -> Result<(), ApiError> {
        state.gate.require_admin(admin_pass).map_err(|e| {
            warn!(
                remote_addr = %self.remote_addr,
                caller = %self.caller,
                action,
                "Administrator password rejected"
            );
            ApiError::from(e)
        })
    }
}

/// `GET` dispatcher.
pub async fn handle_get(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    query: Result<Query<TrackerQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let query = parse_query(query)?;
    match Action::parse(query.action.as_deref())? {
        Action::List => Ok(list_devices(&state).await?.into_response()),
        Action::VerifyAdmin => {
            let requester = Requester::new(caller, connect_info);
            requester.require_admin(
                &state,
                query.admin_pass.as_deref().unwrap_or_default(),
                "verify-admin",
            )?;
            Ok(Json(VerifyAdminResponse { success: true }).into_response())
        }
    }
}

/// Lists every device that has a known position.
async fn list_devices(state: &AppState) -> Result<Json<ListResponse>, ApiError> {
    let data = state
        .aggregation
        .build_view_model(state.source.as_ref())
        .await?;

    record_view_model_size(data.len());

    Ok(Json(ListResponse {
        success: true,
        count: data.len(),
        timestamp: timestamp_now(),
        data,
    }))
}

/// `POST` handler registering a new device.
///
/// The administrator password may be sent as the `adminPass` query
/// parameter or body field; the query parameter wins.
pub async fn create_device(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    query: Result<Query<TrackerQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Json<CreateDeviceResponse>, ApiError> {
    let requester = Requester::new(caller, connect_info);
    let query = parse_query(query)?;
    let registration: Option<DeviceRegistration> = serde_json::from_slice(&body).ok();

    let admin_pass = query
        .admin_pass
        .or_else(|| registration.as_ref().and_then(|r| r.admin_pass.clone()))
        .unwrap_or_default();
    requester.require_admin(&state, &admin_pass, "create-device")?;

    let registration = registration
        .ok_or_else(|| ApiError::Validation(MISSING_FIELDS_MESSAGE.to_string()))?;
    let category = registration.category.clone().unwrap_or_default();

    let device = register_device(state.source.as_ref(), registration).await?;

    record_device_registered(&category);
    info!(
        category = %category,
        caller = %requester.caller,
        remote_addr = %requester.remote_addr,
        "Device added through tracker endpoint"
    );

    Ok(Json(CreateDeviceResponse {
        success: true,
        message: DEVICE_ADDED_MESSAGE.to_string(),
        device,
    }))
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
