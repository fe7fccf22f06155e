//! Open-Meteo forecast client
//!
//! Retrieves current conditions for the gauge location so the dashboard can
//! show whether it is raining upstream of the sensor.
//!
//! API documentation: https://open-meteo.com/en/docs

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;

use crate::config::Location;
use crate::logging::{DataSource, log_failure};
use crate::model::MonitorError;

// ============================================================================
// Open-Meteo response structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub current: CurrentConditions,
    #[serde(default)]
    pub hourly: Option<HourlyForecast>,
}

#[derive(Debug, Deserialize)]
pub struct CurrentConditions {
    pub temperature_2m: f64,
    #[serde(default)]
    pub rain: Option<f64>,             // mm over the preceding hour
    #[serde(default)]
    pub relative_humidity_2m: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct HourlyForecast {
    #[serde(default)]
    pub precipitation_probability: Vec<Option<f64>>,
}

/// Processed weather panel contents.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    pub rain_mm: Option<f64>,
    pub relative_humidity: Option<f64>,
    /// Probability for the first forecast hour, in percent.
    pub precipitation_probability: Option<f64>,
}

impl WeatherSnapshot {
    pub fn is_raining(&self) -> bool {
        self.rain_mm.is_some_and(|mm| mm > 0.0)
    }
}

// ============================================================================
// API client functions
// ============================================================================

pub fn build_forecast_url(base_url: &str, location: &Location) -> String {
    format!(
        "{}/v1/forecast?latitude={}&longitude={}&current=temperature_2m,rain,relative_humidity_2m&hourly=precipitation_probability&forecast_days=1",
        base_url.trim_end_matches('/'),
        location.latitude,
        location.longitude
    )
}

/// Fetch current conditions for a location.
pub async fn fetch_current(
    client: &reqwest::Client,
    base_url: &str,
    location: &Location,
) -> Result<WeatherSnapshot, MonitorError> {
    let url = build_forecast_url(base_url, location);

    let response = client
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(MonitorError::HttpStatus(response.status().as_u16()));
    }

    let body = response.text().await?;
    parse_forecast(&body)
}

/// Parse a forecast body into a snapshot.
pub fn parse_forecast(body: &str) -> Result<WeatherSnapshot, MonitorError> {
    let forecast: ForecastResponse = serde_json::from_str(body)
        .map_err(|e| MonitorError::Transport(format!("malformed forecast response: {}", e)))?;

    let precipitation_probability = forecast
        .hourly
        .and_then(|h| h.precipitation_probability.into_iter().next())
        .flatten();

    Ok(WeatherSnapshot {
        temperature_c: forecast.current.temperature_2m,
        rain_mm: forecast.current.rain,
        relative_humidity: forecast.current.relative_humidity_2m,
        precipitation_probability,
    })
}

/// Refreshes the weather panel on a fixed interval, starting immediately.
///
/// Failures are logged and the previous snapshot stays on screen. Stops once
/// every receiver has been dropped.
pub async fn run_weather_refresh(
    client: reqwest::Client,
    base_url: String,
    location: Location,
    every: Duration,
    publisher: watch::Sender<Option<WeatherSnapshot>>,
) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        if publisher.is_closed() {
            break;
        }
        match fetch_current(&client, &base_url, &location).await {
            Ok(snapshot) => {
                tracing::debug!(source = %DataSource::Weather, temperature_c = snapshot.temperature_c, "weather updated");
                publisher.send_replace(Some(snapshot));
            }
            Err(e) => log_failure(DataSource::Weather, "weather refresh", &e),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
