//! Endpoint Verification Module
//!
//! Probes the configured sensor and weather endpoints and reports whether
//! they are reachable and returning usable data. Run at startup and on the
//! `verify` console command; failures are reported, never fatal.
//!
//! The alert relay is deliberately not probed: every POST to it sends mail.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::DashboardConfig;
use crate::ingest::sensor::{HttpSensorSource, SensorSource, normalize_payload};
use crate::ingest::weather;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub sensor: EndpointVerification,
    pub weather: EndpointVerification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointVerification {
    pub url: String,
    pub status: VerificationStatus,
    /// The endpoint answered with a 2xx response and a JSON body.
    pub reachable: bool,
    /// The body contained the fields the dashboard needs.
    pub payload_valid: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl VerificationReport {
    pub fn all_ok(&self) -> bool {
        self.sensor.status == VerificationStatus::Success
            && self.weather.status == VerificationStatus::Success
    }
}

impl EndpointVerification {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            status: VerificationStatus::Failed,
            reachable: false,
            payload_valid: false,
            error_message: None,
        }
    }

    fn finish(mut self) -> Self {
        self.status = match (self.reachable, self.payload_valid) {
            (true, true) => VerificationStatus::Success,
            (true, false) => VerificationStatus::PartialSuccess,
            _ => VerificationStatus::Failed,
        };
        self
    }
}

// ============================================================================
// Probes
// ============================================================================

pub async fn verify_sensor_endpoint(client: &reqwest::Client, url: &str) -> EndpointVerification {
    let mut result = EndpointVerification::new(url);
    let source = HttpSensorSource::new(client.clone(), url);

    match source.fetch_payload().await {
        Ok(payload) => {
            result.reachable = true;
            match normalize_payload(&payload) {
                Ok(reading) if reading.timestamp.is_some() => result.payload_valid = true,
                Ok(_) => result.error_message = Some("Timestamp missing or unparsable".to_string()),
                Err(e) => result.error_message = Some(e.to_string()),
            }
        }
        Err(e) => result.error_message = Some(e.to_string()),
    }

    result.finish()
}

pub async fn verify_weather_endpoint(
    client: &reqwest::Client,
    config: &DashboardConfig,
) -> EndpointVerification {
    let url = weather::build_forecast_url(&config.weather.base_url, &config.location);
    let mut result = EndpointVerification::new(&url);

    match weather::fetch_current(client, &config.weather.base_url, &config.location).await {
        Ok(snapshot) => {
            result.reachable = true;
            if snapshot.precipitation_probability.is_some() {
                result.payload_valid = true;
            } else {
                result.error_message = Some("No hourly precipitation probability".to_string());
            }
        }
        Err(e) => result.error_message = Some(e.to_string()),
    }

    result.finish()
}

/// Probes both endpoints concurrently.
pub async fn verify_endpoints(client: &reqwest::Client, config: &DashboardConfig) -> VerificationReport {
    let (sensor, weather) = tokio::join!(
        verify_sensor_endpoint(client, &config.sensor.url),
        verify_weather_endpoint(client, config),
    );
    VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        sensor,
        weather,
    }
}
