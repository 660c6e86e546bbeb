//! Device domain model.

use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// A device as reported by the tracking platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    /// The platform reports `0` for devices outside any group.
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub attributes: DeviceAttributes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceAttributes {
    #[serde(default)]
    pub description: Option<String>,
}

impl Device {
    /// Group the device belongs to, treating `0` as no group.
    pub fn effective_group_id(&self) -> Option<i64> {
        self.group_id.filter(|id| *id > 0)
    }
}

/// Device creation payload as sent by the map frontend.
///
/// Every field is optional at the wire level so that missing fields surface
/// as a validation failure instead of a JSON rejection.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub group_id: Option<i64>,
    /// Administrator password, when not passed as a query parameter.
    #[serde(default)]
    pub admin_pass: Option<String>,
}

impl std::fmt::Debug for DeviceRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistration")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("description", &self.description)
            .field("group_id", &self.group_id)
            .field("admin_pass", &self.admin_pass.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Validated device creation request.
#[derive(Debug, Clone, Validate)]
pub struct CreateDeviceRequest {
    #[validate(length(max = 128, message = "Name must be at most 128 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    #[validate(custom(function = "shared::validation::validate_no_control_chars"))]
    pub name: String,

    #[validate(length(max = 32, message = "Category must be at most 32 characters"))]
    pub category: String,

    #[validate(length(max = 512, message = "Description must be at most 512 characters"))]
    pub description: String,

    pub group_id: Option<i64>,
}

/// Device payload sent to the tracking platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDevice {
    pub name: String,
    pub unique_id: String,
    pub category: String,
    pub attributes: NewDeviceAttributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDeviceAttributes {
    pub description: String,
}

impl NewDevice {
    /// Replaces characters the platform stores incorrectly in free-text fields.
    pub fn transliterated(mut self) -> Self {
        self.name = shared::transliteration::transliterate(&self.name);
        self.attributes.description =
            shared::transliteration::transliterate(&self.attributes.description);
        self
    }
}

/// Accepts a group id as a JSON number, a numeric string, or null.
///
/// Zero, empty strings and non-numeric strings mean "no group".
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Float(f64),
        Text(String),
    }

    let id = match Option::<RawId>::deserialize(deserializer)? {
        None => None,
        Some(RawId::Number(n)) => Some(n),
        Some(RawId::Float(f)) if f.fract() == 0.0 => Some(f as i64),
        Some(RawId::Float(_)) => None,
        Some(RawId::Text(s)) => s.trim().parse::<i64>().ok(),
    };
    Ok(id.filter(|id| *id > 0))
}
