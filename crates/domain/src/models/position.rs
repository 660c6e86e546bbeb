//! Position domain model.

use serde::{Deserialize, Deserializer, Serialize};

/// A position fix as reported by the tracking platform.
///
/// Timestamps are kept as the platform's strings and only parsed when the
/// view model is built, so a malformed value can be passed through as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default)]
    pub id: Option<i64>,
    pub device_id: i64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub latitude: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub longitude: f64,
    #[serde(default)]
    pub fix_time: Option<String>,
    #[serde(default)]
    pub device_time: Option<String>,
    #[serde(default)]
    pub attributes: PositionAttributes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionAttributes {
    /// Kept as a raw JSON number so integers are not re-rendered as floats.
    #[serde(default)]
    pub battery_level: Option<serde_json::Number>,
}

impl Position {
    /// Timestamp the fix is reported at: `fixTime`, else `deviceTime`.
    ///
    /// Blank strings count as absent.
    pub fn reported_time(&self) -> Option<&str> {
        non_blank(&self.fix_time).or_else(|| non_blank(&self.device_time))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Coordinates reported as `null` decode as `0.0`.
fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}
