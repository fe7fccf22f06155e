//! Sensor staleness detection.
//!
//! The sensor pushes a new row to the sheet every few seconds. If the newest
//! row is older than the staleness window the device is considered offline,
//! even though the endpoint itself is still answering.
//!
//! # Clock injection
//! All functions accept a `now: DateTime<Utc>` parameter rather than calling
//! `Utc::now()` internally. This makes staleness purely deterministic in
//! tests without mocking or time manipulation.

use chrono::{DateTime, Duration, Utc};

use crate::model::{DeviceStatus, Reading};

/// Maximum age of a reading before the device is reported offline.
pub const STALENESS_WINDOW_MINUTES: i64 = 5;

pub fn staleness_window() -> Duration {
    Duration::minutes(STALENESS_WINDOW_MINUTES)
}

// ---------------------------------------------------------------------------
// Status evaluation
// ---------------------------------------------------------------------------

/// Derives the device status from a reading time.
///
/// Staleness is strictly greater than the window:
///   age > 5 min  →  Offline
///   age == 5 min →  Online
///
/// A reading time in the future (clock skew between the sensor and this host)
/// has a negative age and counts as Online.
pub fn evaluate_at(reading_time: DateTime<Utc>, now: DateTime<Utc>) -> DeviceStatus {
    if now - reading_time > staleness_window() {
        DeviceStatus::Offline
    } else {
        DeviceStatus::Online
    }
}

/// Status for a normalized reading. A reading without a usable timestamp
/// cannot prove freshness and is treated as Offline.
pub fn reading_status_at(reading: &Reading, now: DateTime<Utc>) -> DeviceStatus {
    match reading.timestamp {
        Some(ts) => evaluate_at(ts, now),
        None => DeviceStatus::Offline,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
