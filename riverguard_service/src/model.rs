//! Reading, DeviceStatus, SeverityTier, DashboardState, MonitorError
//! core data structures and error handling
//!
//! Core data types for the RiverGuard water-depth monitoring service.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no I/O, only types and the small conversions that belong to them.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Sensor payload field names
// ---------------------------------------------------------------------------

/// Key carrying the water depth in centimeters. Required.
pub const FIELD_WATER_LEVEL: &str = "WaterLevel";

/// Key carrying the rate of rise. Optional, defaults to 0.
pub const FIELD_RATE: &str = "Rate";

/// Key carrying the ISO 8601 reading time.
pub const FIELD_TIMESTAMP: &str = "Timestamp";

/// Label shown when a reading has no usable timestamp.
pub const PLACEHOLDER_TIME_LABEL: &str = "--:--";

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A single normalized measurement from the depth sensor.
///
/// `depth` is the raw value as reported and is used as-is for
/// classification. Display code should go through `display_depth`, which
/// clamps negative readings to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub depth_cm: f64,
    pub rate: f64,
    /// `None` when the payload timestamp was missing or unparsable.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Reading {
    pub fn display_depth(&self) -> f64 {
        self.depth_cm.max(0.0)
    }

    /// Chart/status label for this reading, e.g. "14:03:27".
    pub fn time_label(&self) -> String {
        match self.timestamp {
            Some(ts) => format_time_label(ts),
            None => PLACEHOLDER_TIME_LABEL.to_string(),
        }
    }
}

/// Formats an instant as local wall-clock time with second resolution.
pub fn format_time_label(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

// ---------------------------------------------------------------------------
// Derived states
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Online => write!(f, "ONLINE"),
            DeviceStatus::Offline => write!(f, "OFFLINE"),
        }
    }
}

/// Severity tiers, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    Normal,
    Warning,
    Critical,
}

impl SeverityTier {
    /// Badge text shown under the gauge.
    pub fn badge(&self) -> &'static str {
        match self {
            SeverityTier::Normal => "NORMAL FLOW",
            SeverityTier::Warning => "WARNING: HIGH LEVEL",
            SeverityTier::Critical => "CRITICAL FLOOD RISK",
        }
    }
}

impl std::fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeverityTier::Normal => write!(f, "NORMAL"),
            SeverityTier::Warning => write!(f, "WARNING"),
            SeverityTier::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// One point of the recent-trend chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub label: String,
    pub value: f64,
}

// ---------------------------------------------------------------------------
// Published state
// ---------------------------------------------------------------------------

/// Everything the gauge needs to draw the latest accepted reading.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeView {
    /// Raw depth as reported.
    pub depth_cm: f64,
    pub rate: f64,
    pub tier: SeverityTier,
    /// Fill level of the container, always within 0..=100.
    pub percentage: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Snapshot handed to the render layer after every state change.
///
/// `gauge` is `None` until the first reading has been accepted; an
/// offline snapshot can be published before that.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub status: DeviceStatus,
    pub gauge: Option<GaugeView>,
    pub history: Vec<HistoryPoint>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while polling, normalizing, or dispatching.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonitorError {
    /// A required key was absent (or null) in the sensor payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    /// A field was present but not numeric.
    #[error("Parse error: {field} = {value:?} is not numeric")]
    Parse { field: &'static str, value: String },
    /// Network failure, timeout, or malformed response body.
    #[error("Transport error: {0}")]
    Transport(String),
    /// Non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    HttpStatus(u16),
    /// Alert dispatch attempted with an empty recipient set.
    #[error("No recipients to send alerts to")]
    NoRecipients,
    /// Recipient rejected when adding it to the set.
    #[error("Invalid recipient: {0:?}")]
    InvalidRecipient(String),
    /// The relay could not be reached or rejected the request.
    #[error("Dispatch error: {0}")]
    Dispatch(String),
    /// A dispatch is already in flight.
    #[error("Alert dispatch already in progress")]
    DispatchInProgress,
}

impl MonitorError {
    /// True for failures of the HTTP exchange itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, MonitorError::Transport(_) | MonitorError::HttpStatus(_))
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => MonitorError::HttpStatus(status.as_u16()),
            None => MonitorError::Transport(err.to_string()),
        }
    }
}
