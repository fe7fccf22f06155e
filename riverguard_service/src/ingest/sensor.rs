//! Sensor sheet endpoint client.
//!
//! The depth sensor posts rows to a spreadsheet; a script endpoint in front
//! of the sheet answers GET requests with the newest row as JSON:
//!
//! ```json
//! { "WaterLevel": 42, "Rate": "0.3", "Timestamp": "2024-05-01T12:00:00.000Z" }
//! ```
//!
//! Sheet cells come back as numbers or strings depending on how they were
//! typed, so numeric fields accept both. Anything that is not a finite number
//! is rejected here rather than leaking a NaN into the gauge.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde_json::{Value, json};

use crate::model::{FIELD_RATE, FIELD_TIMESTAMP, FIELD_WATER_LEVEL, MonitorError, Reading};

// ============================================================================
// Source abstraction
// ============================================================================

/// Anything that can produce a raw sensor payload: the live endpoint, or the
/// dev-mode simulator.
#[async_trait]
pub trait SensorSource: Send + Sync {
    async fn fetch_payload(&self) -> Result<Value, MonitorError>;
}

/// Live sheet endpoint reached over HTTP GET.
pub struct HttpSensorSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSensorSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SensorSource for HttpSensorSource {
    async fn fetch_payload(&self) -> Result<Value, MonitorError> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MonitorError::HttpStatus(response.status().as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| MonitorError::Transport(format!("malformed JSON from sensor endpoint: {}", e)))
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Converts a raw payload into a `Reading`.
///
/// - `WaterLevel` absent or null → `MissingField`
/// - `WaterLevel` / `Rate` not a finite number → `Parse`
/// - `Rate` absent, null or blank → 0
/// - `Timestamp` absent or unparsable → `timestamp: None`
pub fn normalize_payload(payload: &Value) -> Result<Reading, MonitorError> {
    let fields = payload
        .as_object()
        .ok_or(MonitorError::MissingField(FIELD_WATER_LEVEL))?;

    let depth_cm = match fields.get(FIELD_WATER_LEVEL) {
        None | Some(Value::Null) => return Err(MonitorError::MissingField(FIELD_WATER_LEVEL)),
        Some(value) => parse_number(FIELD_WATER_LEVEL, value)?,
    };

    let rate = match fields.get(FIELD_RATE) {
        None | Some(Value::Null) => 0.0,
        Some(Value::String(s)) if s.trim().is_empty() => 0.0,
        Some(value) => parse_number(FIELD_RATE, value)?,
    };

    let timestamp = fields.get(FIELD_TIMESTAMP).and_then(parse_timestamp);

    Ok(Reading {
        depth_cm,
        rate,
        timestamp,
    })
}

fn parse_number(field: &'static str, value: &Value) -> Result<f64, MonitorError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| MonitorError::Parse {
            field,
            value: value.to_string(),
        })
}

/// Accepts RFC 3339 strings, naive `YYYY-MM-DD HH:MM:SS` strings (taken as
/// host local time) and epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    parse_timestamp_in(value, &Local)
}

/// As `parse_timestamp`, resolving naive strings in `zone`. A naive time that
/// falls in a DST gap does not exist and yields `None`; one in a DST fold
/// takes the earlier instant.
pub fn parse_timestamp_in<Tz: TimeZone>(value: &Value, zone: &Tz) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .and_then(|naive| zone.from_local_datetime(&naive).earliest())
                .map(|dt| dt.with_timezone(&Utc))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

/// Builds a payload in the sheet endpoint's wire format.
pub fn encode_payload(depth_cm: f64, rate: f64, timestamp: DateTime<Utc>) -> Value {
    json!({
        FIELD_WATER_LEVEL: depth_cm,
        FIELD_RATE: rate,
        FIELD_TIMESTAMP: timestamp.to_rfc3339(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_numeric_payload_normalizes() {
        let reading = normalize_payload(&json!({
            "WaterLevel": 72.5,
            "Rate": 0.4,
            "Timestamp": "2024-05-01T12:00:00.000Z"
        }))
        .expect("valid payload");

        assert_eq!(reading.depth_cm, 72.5);
        assert_eq!(reading.rate, 0.4);
        assert_eq!(
            reading.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_string_cells_are_parsed() {
        let reading = normalize_payload(&json!({
            "WaterLevel": " 64 ",
            "Rate": "-1.5",
            "Timestamp": "2024-05-01T07:00:00-05:00"
        }))
        .expect("numeric strings are accepted");

        assert_eq!(reading.depth_cm, 64.0);
        assert_eq!(reading.rate, -1.5);
        assert_eq!(
            reading.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_missing_water_level_is_missing_field() {
        let result = normalize_payload(&json!({ "Timestamp": "2024-05-01T12:00:00Z" }));
        assert_eq!(result, Err(MonitorError::MissingField(FIELD_WATER_LEVEL)));
    }

    #[test]
    fn test_null_water_level_is_missing_field() {
        let result = normalize_payload(&json!({ "WaterLevel": null }));
        assert_eq!(result, Err(MonitorError::MissingField(FIELD_WATER_LEVEL)));
    }

    #[test]
    fn test_non_object_payload_is_missing_field() {
        assert!(matches!(
            normalize_payload(&json!([1, 2, 3])),
            Err(MonitorError::MissingField(_))
        ));
        assert!(matches!(
            normalize_payload(&Value::Null),
            Err(MonitorError::MissingField(_))
        ));
    }

    #[test]
    fn test_non_numeric_water_level_is_parse_error() {
        let result = normalize_payload(&json!({ "WaterLevel": "high" }));
        assert!(
            matches!(result, Err(MonitorError::Parse { field: FIELD_WATER_LEVEL, .. })),
            "got {:?}",
            result
        );
    }

    #[test]
    fn test_nan_string_is_rejected() {
        for bad in ["NaN", "inf", "", "   "] {
            let result = normalize_payload(&json!({ "WaterLevel": bad }));
            assert!(result.is_err(), "{:?} should not normalize", bad);
        }
    }

    #[test]
    fn test_boolean_water_level_is_parse_error() {
        let result = normalize_payload(&json!({ "WaterLevel": true }));
        assert!(matches!(result, Err(MonitorError::Parse { .. })));
    }

    #[test]
    fn test_rate_defaults_to_zero() {
        let absent = normalize_payload(&json!({ "WaterLevel": 10 })).expect("valid");
        let blank = normalize_payload(&json!({ "WaterLevel": 10, "Rate": "" })).expect("valid");
        let null = normalize_payload(&json!({ "WaterLevel": 10, "Rate": null })).expect("valid");
        assert_eq!(absent.rate, 0.0);
        assert_eq!(blank.rate, 0.0);
        assert_eq!(null.rate, 0.0);
    }

    #[test]
    fn test_non_numeric_rate_is_parse_error() {
        let result = normalize_payload(&json!({ "WaterLevel": 10, "Rate": "fast" }));
        assert!(matches!(result, Err(MonitorError::Parse { field: FIELD_RATE, .. })));
    }

    #[test]
    fn test_unparsable_timestamp_yields_none() {
        let reading = normalize_payload(&json!({ "WaterLevel": 10, "Timestamp": "yesterday" }))
            .expect("bad timestamp does not abort normalization");
        assert!(reading.timestamp.is_none());
    }

    #[test]
    fn test_naive_timestamps_are_wall_clock_in_the_given_zone() {
        // Chicago in May: UTC-5
        let central = FixedOffset::west_opt(5 * 3600).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 17, 0, 0).unwrap();
        assert_eq!(parse_timestamp_in(&json!("2024-05-01 12:00:00"), &central), Some(expected));
        assert_eq!(parse_timestamp_in(&json!("2024-05-01T12:00:00.000"), &central), Some(expected));

        let lagos = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(
            parse_timestamp_in(&json!("2024-05-01 18:00:00"), &lagos),
            Some(expected)
        );
    }

    #[test]
    fn test_offset_and_epoch_timestamps_ignore_the_zone() {
        let central = FixedOffset::west_opt(5 * 3600).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp_in(&json!("2024-05-01T12:00:00Z"), &central), Some(expected));
        assert_eq!(
            parse_timestamp_in(&json!(expected.timestamp_millis()), &central),
            Some(expected)
        );
        assert_eq!(parse_timestamp_in(&json!(true), &central), None);
    }

    #[test]
    fn test_fresh_local_row_is_online_on_host_clock() {
        let now = Utc::now();
        let local_label = (now - chrono::Duration::seconds(10))
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let reading = normalize_payload(&json!({ "WaterLevel": 10, "Timestamp": local_label }))
            .expect("valid payload");
        assert_eq!(
            crate::alert::stalenesses::reading_status_at(&reading, now),
            crate::model::DeviceStatus::Online
        );
    }

    #[test]
    fn test_encoded_payload_uses_sheet_keys() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let payload = encode_payload(55.0, 1.0, ts);
        assert_eq!(payload["WaterLevel"], json!(55.0));
        assert_eq!(payload["Rate"], json!(1.0));
        let reading = normalize_payload(&payload).expect("encoded payload normalizes");
        assert_eq!(reading.timestamp, Some(ts));
    }
}
