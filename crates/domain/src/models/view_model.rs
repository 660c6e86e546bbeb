//! Map view model.

use serde::Serialize;

use super::category::Category;

/// One marker on the map: a device joined with its latest position.
///
/// Derived on every request; it has no identity of its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModelRecord {
    pub id: i64,
    pub device_id: i64,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub group_name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub last_update: String,
    pub battery_level: Option<serde_json::Number>,
}
