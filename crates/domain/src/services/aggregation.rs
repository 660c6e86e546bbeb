//! Aggregation of devices, positions and groups into the map view model.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::error::DomainError;
use crate::models::{Category, Device, Group, Position, ViewModelRecord};
use crate::services::source::TrackingSource;

/// Decimal places kept in emitted coordinates.
const COORDINATE_PRECISION: i32 = 6;

/// Lookups built for a single aggregation pass and dropped with it.
#[derive(Debug, Default)]
pub struct AggregationContext {
    positions: HashMap<i64, Position>,
    groups: HashMap<i64, String>,
}

impl AggregationContext {
    pub fn new(positions: Vec<Position>, groups: Vec<Group>) -> Self {
        let mut by_device: HashMap<i64, Position> = HashMap::with_capacity(positions.len());
        for position in positions {
            match by_device.entry(position.device_id) {
                Entry::Vacant(slot) => {
                    slot.insert(position);
                }
                Entry::Occupied(mut slot) => {
                    if !is_older(&position, slot.get()) {
                        slot.insert(position);
                    }
                }
            }
        }

        let groups = groups
            .into_iter()
            .map(|group| (group.id, group.display_name()))
            .collect();

        Self {
            positions: by_device,
            groups,
        }
    }

    pub fn position_for(&self, device_id: i64) -> Option<&Position> {
        self.positions.get(&device_id)
    }

    pub fn group_name(&self, group_id: Option<i64>) -> Option<String> {
        group_id.and_then(|id| self.groups.get(&id).cloned())
    }
}

/// Builds the map view model from the tracking platform.
#[derive(Debug, Clone, Copy)]
pub struct AggregationService {
    zone: Tz,
}

impl AggregationService {
    /// Create a service emitting timestamps in the given time zone.
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Joins devices with their latest positions and group names.
    ///
    /// A failed devices fetch fails the whole pass; failed positions or
    /// groups fetches degrade to empty lookups.
    pub async fn build_view_model(
        &self,
        source: &dyn TrackingSource,
    ) -> Result<Vec<ViewModelRecord>, DomainError> {
        self.build_view_model_at(source, Utc::now()).await
    }

    /// Same as [`build_view_model`](Self::build_view_model), with `now` used
    /// for positions that carry no timestamp.
    pub async fn build_view_model_at(
        &self,
        source: &dyn TrackingSource,
        now: DateTime<Utc>,
    ) -> Result<Vec<ViewModelRecord>, DomainError> {
        let devices = source
            .devices()
            .await
            .map_err(DomainError::UpstreamUnavailable)?;

        if devices.is_empty() {
            debug!("Tracking server returned no devices");
            return Ok(Vec::new());
        }

        let positions = source.positions().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to fetch positions, continuing without them");
            Vec::new()
        });

        let groups = source.groups().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to fetch groups, continuing without group names");
            Vec::new()
        });

        let context = AggregationContext::new(positions, groups);
        let records: Vec<ViewModelRecord> = devices
            .iter()
            .filter_map(|device| self.record_for(device, &context, now))
            .collect();

        debug!(
            devices = devices.len(),
            records = records.len(),
            "View model built"
        );

        Ok(records)
    }

    fn record_for(
        &self,
        device: &Device,
        context: &AggregationContext,
        now: DateTime<Utc>,
    ) -> Option<ViewModelRecord> {
        let position = context.position_for(device.id)?;

        let last_update = match position.reported_time() {
            Some(raw) => to_local_time(raw, self.zone),
            None => format_local(now, self.zone),
        };

        Some(ViewModelRecord {
            id: position.id.unwrap_or(device.id),
            device_id: device.id,
            name: device.name.clone().unwrap_or_else(|| "Unknown".to_string()),
            description: device.attributes.description.clone().unwrap_or_default(),
            category: Category::from_unique_id(device.unique_id.as_deref().unwrap_or("")),
            group_name: context.group_name(device.effective_group_id()),
            lat: round_coordinate(position.latitude),
            lon: round_coordinate(position.longitude),
            last_update,
            battery_level: position.attributes.battery_level.clone(),
        })
    }
}

/// Rounds a coordinate to six decimal places, halves away from zero.
pub fn round_coordinate(value: f64) -> f64 {
    let factor = 10f64.powi(COORDINATE_PRECISION);
    (value * factor).round() / factor
}

/// Parses a platform timestamp, assuming UTC when no offset is given.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Older platform versions emit offsets without a colon
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Converts a UTC platform timestamp to ISO-8601 in `zone`.
///
/// Unparseable input is returned unchanged.
pub fn to_local_time(raw: &str, zone: Tz) -> String {
    match parse_timestamp(raw) {
        Some(utc) => format_local(utc, zone),
        None => {
            warn!(timestamp = %raw, "Unparseable position timestamp, passing through");
            raw.to_string()
        }
    }
}

fn format_local(utc: DateTime<Utc>, zone: Tz) -> String {
    utc.with_timezone(&zone)
        .to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// True when `candidate` was reported strictly before `current`.
///
/// Positions whose time cannot be compared are never considered older, so
/// the later record in input order wins.
fn is_older(candidate: &Position, current: &Position) -> bool {
    let candidate = candidate.reported_time().and_then(parse_timestamp);
    let current = current.reported_time().and_then(parse_timestamp);
    match (candidate, current) {
        (Some(candidate), Some(current)) => candidate < current,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device::DeviceAttributes;
    use crate::models::position::PositionAttributes;
    use crate::services::source::{MockTrackingSource, SourceError};
    use chrono::TimeZone;

    fn device(id: i64, unique_id: &str, group_id: Option<i64>) -> Device {
        Device {
            id,
            name: Some(format!("Device {}", id)),
            unique_id: Some(unique_id.to_string()),
            group_id,
            attributes: DeviceAttributes {
                description: Some(format!("Description {}", id)),
            },
        }
    }

    fn position(id: i64, device_id: i64, lat: f64, lon: f64, fix_time: &str) -> Position {
        Position {
            id: Some(id),
            device_id,
            latitude: lat,
            longitude: lon,
            fix_time: Some(fix_time.to_string()),
            device_time: None,
            attributes: PositionAttributes::default(),
        }
    }

    fn group(id: i64, name: &str) -> Group {
        Group {
            id,
            name: Some(name.to_string()),
        }
    }

    fn warsaw() -> AggregationService {
        AggregationService::new(chrono_tz::Europe::Warsaw)
    }

    #[tokio::test]
    async fn test_single_device_fixture() {
        let source = MockTrackingSource::new(
            vec![device(1, "2xxxxxxxxx", Some(10))],
            vec![position(100, 1, 50.0, 19.0, "2024-01-01T00:00:00Z")],
            vec![group(10, "Fleet A")],
        );

        let records = warsaw().build_view_model(&source).await.unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, 100);
        assert_eq!(record.device_id, 1);
        assert_eq!(record.category, Category::Ambulance);
        assert_eq!(record.group_name.as_deref(), Some("Fleet A"));
        assert_eq!(record.lat, 50.0);
        assert_eq!(record.lon, 19.0);
        // Warsaw is UTC+1 in January
        assert_eq!(record.last_update, "2024-01-01T01:00:00+01:00");
        assert_eq!(record.name, "Device 1");
        assert_eq!(record.description, "Description 1");
    }

    #[tokio::test]
    async fn test_devices_without_position_are_dropped() {
        let source = MockTrackingSource::new(
            vec![
                device(1, "1000000001", None),
                device(2, "2000000002", None),
                device(3, "3000000003", None),
            ],
            vec![position(20, 2, 51.0, 17.0, "2024-06-01T12:00:00Z")],
            vec![],
        );

        let records = warsaw().build_view_model(&source).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device_id, 2);
        assert!(records.iter().all(|r| r.device_id != 1 && r.device_id != 3));
    }

    #[tokio::test]
    async fn test_output_follows_device_order() {
        let source = MockTrackingSource::new(
            vec![
                device(3, "4", None),
                device(1, "4", None),
                device(2, "4", None),
            ],
            vec![
                position(11, 1, 0.0, 0.0, "2024-06-01T12:00:00Z"),
                position(12, 2, 0.0, 0.0, "2024-06-01T12:00:00Z"),
                position(13, 3, 0.0, 0.0, "2024-06-01T12:00:00Z"),
            ],
            vec![],
        );

        let records = warsaw().build_view_model(&source).await.unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.device_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_devices_failure_is_upstream_unavailable() {
        let mut source = MockTrackingSource::new(vec![], vec![], vec![]);
        source.devices = Err(SourceError::Timeout);

        let result = warsaw().build_view_model(&source).await;
        assert!(matches!(
            result,
            Err(DomainError::UpstreamUnavailable(SourceError::Timeout))
        ));
    }

    #[tokio::test]
    async fn test_empty_devices_is_empty_view_model() {
        let source = MockTrackingSource::new(vec![], vec![], vec![]);
        let records = warsaw().build_view_model(&source).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_positions_failure_degrades_to_empty() {
        let mut source = MockTrackingSource::new(
            vec![device(1, "2", Some(10))],
            vec![],
            vec![group(10, "Fleet A")],
        );
        source.positions = Err(SourceError::Status {
            status: 500,
            message: "boom".into(),
        });

        let records = warsaw().build_view_model(&source).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_groups_failure_degrades_to_null_group_names() {
        let mut source = MockTrackingSource::new(
            vec![device(1, "3", Some(10))],
            vec![position(1, 1, 1.0, 2.0, "2024-06-01T12:00:00Z")],
            vec![],
        );
        source.groups = Err(SourceError::Timeout);

        let records = warsaw().build_view_model(&source).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].group_name.is_none());
        assert_eq!(records[0].category, Category::Pickup);
    }

    #[tokio::test]
    async fn test_unknown_or_missing_group_is_null() {
        let source = MockTrackingSource::new(
            vec![device(1, "1", Some(99)), device(2, "1", None), device(3, "1", Some(0))],
            vec![
                position(1, 1, 0.0, 0.0, "2024-06-01T12:00:00Z"),
                position(2, 2, 0.0, 0.0, "2024-06-01T12:00:00Z"),
                position(3, 3, 0.0, 0.0, "2024-06-01T12:00:00Z"),
            ],
            vec![group(10, "Fleet A"), group(0, "Zero")],
        );

        let records = warsaw().build_view_model(&source).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.group_name.is_none()));
    }

    #[tokio::test]
    async fn test_defaults_for_missing_device_fields() {
        let source = MockTrackingSource::new(
            vec![Device {
                id: 5,
                name: None,
                unique_id: None,
                group_id: None,
                attributes: DeviceAttributes::default(),
            }],
            vec![Position {
                id: None,
                ..position(0, 5, 10.0, 20.0, "2024-06-01T12:00:00Z")
            }],
            vec![],
        );

        let records = warsaw().build_view_model(&source).await.unwrap();
        let record = &records[0];
        assert_eq!(record.id, 5);
        assert_eq!(record.name, "Unknown");
        assert_eq!(record.description, "");
        assert_eq!(record.category, Category::Mobile);
    }

    #[tokio::test]
    async fn test_coordinates_are_rounded() {
        let source = MockTrackingSource::new(
            vec![device(1, "4", None)],
            vec![position(1, 1, 51.123456789, -0.1234564, "2024-06-01T12:00:00Z")],
            vec![],
        );

        let records = warsaw().build_view_model(&source).await.unwrap();
        assert_eq!(records[0].lat, 51.123457);
        assert_eq!(records[0].lon, -0.123456);
    }

    #[tokio::test]
    async fn test_timestamp_fallbacks() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 8, 30, 0).unwrap();
        let mut device_time_only = position(1, 1, 0.0, 0.0, "");
        device_time_only.fix_time = None;
        device_time_only.device_time = Some("2024-07-01T06:00:00.000+00:00".into());
        let mut no_time = position(2, 2, 0.0, 0.0, "");
        no_time.fix_time = None;

        let source = MockTrackingSource::new(
            vec![device(1, "4", None), device(2, "4", None)],
            vec![device_time_only, no_time],
            vec![],
        );

        let records = warsaw().build_view_model_at(&source, now).await.unwrap();
        // Warsaw is UTC+2 in July
        assert_eq!(records[0].last_update, "2024-07-01T08:00:00+02:00");
        assert_eq!(records[1].last_update, "2024-07-01T10:30:00+02:00");
    }

    #[tokio::test]
    async fn test_blank_fix_time_uses_device_time_then_now() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 8, 30, 0).unwrap();
        let mut blank_fix = position(1, 1, 0.0, 0.0, "");
        blank_fix.device_time = Some("2024-01-01T00:00:00Z".into());
        let all_blank = position(2, 2, 0.0, 0.0, " ");

        let source = MockTrackingSource::new(
            vec![device(1, "4", None), device(2, "4", None)],
            vec![blank_fix, all_blank],
            vec![],
        );

        let records = warsaw().build_view_model_at(&source, now).await.unwrap();
        assert_eq!(records[0].last_update, "2024-01-01T01:00:00+01:00");
        assert_eq!(records[1].last_update, "2024-07-01T10:30:00+02:00");
    }

    #[tokio::test]
    async fn test_battery_level_passed_through() {
        let mut with_battery = position(1, 1, 0.0, 0.0, "2024-06-01T12:00:00Z");
        with_battery.attributes.battery_level = Some(serde_json::Number::from(76));
        let source = MockTrackingSource::new(vec![device(1, "4", None)], vec![with_battery], vec![]);

        let records = warsaw().build_view_model(&source).await.unwrap();
        let value = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(value["batteryLevel"], serde_json::json!(76));
    }

    #[test]
    fn test_duplicate_positions_latest_fix_wins() {
        let context = AggregationContext::new(
            vec![
                position(2, 1, 2.0, 2.0, "2024-06-01T12:00:00Z"),
                position(1, 1, 1.0, 1.0, "2024-06-01T11:00:00Z"),
            ],
            vec![],
        );
        assert_eq!(context.position_for(1).unwrap().id, Some(2));
    }

    #[test]
    fn test_duplicate_positions_unparseable_later_wins() {
        let context = AggregationContext::new(
            vec![
                position(1, 1, 1.0, 1.0, "garbage"),
                position(2, 1, 2.0, 2.0, "also garbage"),
            ],
            vec![],
        );
        assert_eq!(context.position_for(1).unwrap().id, Some(2));
    }

    #[test]
    fn test_duplicate_positions_equal_time_later_wins() {
        let context = AggregationContext::new(
            vec![
                position(1, 1, 1.0, 1.0, "2024-06-01T12:00:00Z"),
                position(2, 1, 2.0, 2.0, "2024-06-01T12:00:00Z"),
            ],
            vec![],
        );
        assert_eq!(context.position_for(1).unwrap().id, Some(2));
    }

    #[test]
    fn test_round_coordinate() {
        assert_eq!(round_coordinate(51.123456789), 51.123457);
        assert_eq!(round_coordinate(19.0), 19.0);
        assert_eq!(round_coordinate(-12.3456789), -12.345679);
        assert_eq!(round_coordinate(0.0), 0.0);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T00:00:00.000+00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T01:00:00.000+0100"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T00:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01 00:00:00"), Some(expected));
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn test_to_local_time() {
        assert_eq!(
            to_local_time("2024-01-01T00:00:00Z", chrono_tz::UTC),
            "2024-01-01T00:00:00+00:00"
        );
        assert_eq!(
            to_local_time("2024-01-01T00:00:00Z", chrono_tz::America::New_York),
            "2023-12-31T19:00:00-05:00"
        );
        assert_eq!(to_local_time("yesterday", chrono_tz::UTC), "yesterday");
    }
}
