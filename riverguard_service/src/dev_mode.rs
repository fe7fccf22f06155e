//! Development mode sensor
//!
//! When the sheet endpoint is unavailable (or while working on the
//! dashboard offline), this source stands in for it. Each fetch returns a
//! payload in the sheet's wire format with the depth sweeping up to the top
//! of the container and back down, so every tier and the chart eviction get
//! exercised within a few minutes.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::ingest::sensor::{SensorSource, encode_payload};
use crate::model::MonitorError;

/// Configuration for simulated readings.
pub struct DevMode {
    /// Depth change per poll, in centimeters.
    pub step_cm: f64,
    /// Sweep ceiling; normally the container height.
    pub max_depth_cm: f64,
    sweep: Mutex<Sweep>,
}

#[derive(Debug)]
struct Sweep {
    depth_cm: f64,
    rising: bool,
}

impl DevMode {
    pub fn new(step_cm: f64, max_depth_cm: f64) -> Self {
        Self {
            step_cm,
            max_depth_cm,
            sweep: Mutex::new(Sweep {
                depth_cm: 0.0,
                rising: true,
            }),
        }
    }

    /// Advances the sweep and returns (depth, signed rate).
    fn next_depth(&self) -> (f64, f64) {
        let mut sweep = self.sweep.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = sweep.depth_cm;
        let rate = if sweep.rising { self.step_cm } else { -self.step_cm };

        let next = current + rate;
        if next >= self.max_depth_cm {
            sweep.depth_cm = self.max_depth_cm;
            sweep.rising = false;
        } else if next <= 0.0 {
            sweep.depth_cm = 0.0;
            sweep.rising = true;
        } else {
            sweep.depth_cm = next;
        }
        (current, rate)
    }
}

#[async_trait]
impl SensorSource for DevMode {
    async fn fetch_payload(&self) -> Result<Value, MonitorError> {
        let (depth_cm, rate) = self.next_depth();
        Ok(encode_payload(depth_cm, rate, Utc::now()))
    }
}
