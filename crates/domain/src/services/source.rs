//! Tracking platform data source abstraction.
//!
//! The aggregation and registration services only see this trait; the HTTP
//! client that talks to the real platform lives in the API crate.

use std::sync::Mutex;

use thiserror::Error;

use crate::models::{Device, Group, NewDevice, Position};

/// Failure talking to the tracking platform.
///
/// Always distinct from a successful call returning an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Read and create operations against the tracking platform.
#[async_trait::async_trait]
pub trait TrackingSource: Send + Sync {
    /// All devices visible to the service account, in platform order.
    async fn devices(&self) -> Result<Vec<Device>, SourceError>;

    /// Latest positions of all devices.
    async fn positions(&self) -> Result<Vec<Position>, SourceError>;

    /// All device groups.
    async fn groups(&self) -> Result<Vec<Group>, SourceError>;

    /// Creates a device and returns the platform's representation of it.
    async fn create_device(&self, device: &NewDevice) -> Result<serde_json::Value, SourceError>;
}

/// In-memory data source for development and testing.
///
/// Each list can be set to fail independently; created devices are recorded.
#[derive(Debug)]
pub struct MockTrackingSource {
    pub devices: Result<Vec<Device>, SourceError>,
    pub positions: Result<Vec<Position>, SourceError>,
    pub groups: Result<Vec<Group>, SourceError>,
    /// Error returned by `create_device`, if any.
    pub create_error: Option<SourceError>,
    created: Mutex<Vec<NewDevice>>,
}

impl Default for MockTrackingSource {
    /// A source whose every read fails, as if the platform were unreachable.
    fn default() -> Self {
        let unreachable = || SourceError::Transport("connection refused".to_string());
        Self {
            devices: Err(unreachable()),
            positions: Err(unreachable()),
            groups: Err(unreachable()),
            create_error: Some(unreachable()),
            created: Mutex::new(Vec::new()),
        }
    }
}

impl MockTrackingSource {
    /// Create a mock source that serves the given entities.
    pub fn new(devices: Vec<Device>, positions: Vec<Position>, groups: Vec<Group>) -> Self {
        Self {
            devices: Ok(devices),
            positions: Ok(positions),
            groups: Ok(groups),
            create_error: None,
            created: Mutex::new(Vec::new()),
        }
    }

    /// Devices passed to `create_device` so far.
    pub fn created(&self) -> Vec<NewDevice> {
        self.created
            .lock()
            .map(|created| created.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl TrackingSource for MockTrackingSource {
    async fn devices(&self) -> Result<Vec<Device>, SourceError> {
        self.devices.clone()
    }

    async fn positions(&self) -> Result<Vec<Position>, SourceError> {
        self.positions.clone()
    }

    async fn groups(&self) -> Result<Vec<Group>, SourceError> {
        self.groups.clone()
    }

    async fn create_device(&self, device: &NewDevice) -> Result<serde_json::Value, SourceError> {
        if let Some(err) = &self.create_error {
            tracing::warn!(unique_id = %device.unique_id, "Mock source simulating create failure");
            return Err(err.clone());
        }

        let mut created = self
            .created
            .lock()
            .map_err(|_| SourceError::Transport("mock state poisoned".to_string()))?;
        created.push(device.clone());
        let id = created.len() as i64;

        let mut value = serde_json::to_value(device)
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
        value["id"] = serde_json::json!(id);
        Ok(value)
    }
}
