//! Registration of new tracked devices.

use rand::Rng;
use tracing::info;
use validator::Validate;

use crate::error::DomainError;
use crate::models::category::generate_unique_id;
use crate::models::device::NewDeviceAttributes;
use crate::models::{CreateDeviceRequest, DeviceRegistration, NewDevice};
use crate::services::source::TrackingSource;

/// Message returned when `name` or `category` is absent.
pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields: name, category";

impl DeviceRegistration {
    /// Checks required fields and converts into a validated request.
    pub fn into_request(self) -> Result<CreateDeviceRequest, DomainError> {
        let (name, category) = match (self.name, self.category) {
            (Some(name), Some(category)) => (name, category),
            _ => {
                return Err(DomainError::ValidationFailure(
                    MISSING_FIELDS_MESSAGE.to_string(),
                ))
            }
        };

        let request = CreateDeviceRequest {
            name: name.trim().to_string(),
            category,
            description: self.description.unwrap_or_default(),
            group_id: self.group_id,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Builds the platform payload for a request, generating its `uniqueId`.
pub fn prepare_new_device<R: Rng>(request: CreateDeviceRequest, rng: &mut R) -> NewDevice {
    let unique_id = generate_unique_id(&request.category, rng);
    NewDevice {
        name: request.name,
        unique_id,
        category: request.category,
        attributes: NewDeviceAttributes {
            description: request.description,
        },
        group_id: request.group_id,
    }
}

/// Validates a registration and creates the device on the tracking platform.
///
/// Validation failures are returned before the platform is contacted.
pub async fn register_device(
    source: &dyn TrackingSource,
    registration: DeviceRegistration,
) -> Result<serde_json::Value, DomainError> {
    let request = registration.into_request()?;
    let new_device = prepare_new_device(request, &mut rand::thread_rng());

    let created = source
        .create_device(&new_device)
        .await
        .map_err(DomainError::UpstreamRejected)?;

    info!(
        unique_id = %new_device.unique_id,
        category = %new_device.category,
        group_id = ?new_device.group_id,
        "Device registered"
    );

    Ok(created)
}
