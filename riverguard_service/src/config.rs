//! Deployment configuration.
//!
//! Loaded once at startup from a TOML file (default `riverguard.toml`,
//! overridable through `RIVERGUARD_CONFIG`). Endpoint URLs can also be
//! overridden from the environment so the sheet URL does not have to be
//! committed alongside the thresholds.
//!
//! The configuration is validated before anything else starts; an invalid
//! threshold ordering is a startup error, not something the poller copes with.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::model::SeverityTier;

pub const CONFIG_PATH_VAR: &str = "RIVERGUARD_CONFIG";
pub const SENSOR_URL_VAR: &str = "RIVERGUARD_SENSOR_URL";
pub const RELAY_URL_VAR: &str = "RIVERGUARD_RELAY_URL";
pub const DEFAULT_CONFIG_PATH: &str = "riverguard.toml";

/// Fixed poll cadence for the sensor endpoint.
pub const POLL_INTERVAL_MS: u64 = 3000;

// ---------------------------------------------------------------------------
// Config sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub sensor: SensorConfig,
    pub gauge: GaugeThresholds,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub dev_mode: DevModeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    /// Spreadsheet-backed script endpoint returning the latest row.
    pub url: String,
    /// Per-request timeout. A hung request would otherwise hold the
    /// in-flight guard and stop polling.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Container geometry and alert thresholds, in centimeters.
///
/// Expected ordering: warning < flood <= container height.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GaugeThresholds {
    pub container_height_cm: f64,
    pub warning_cm: f64,
    pub flood_cm: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for Location {
    fn default() -> Self {
        // Lagos
        Location {
            latitude: 6.5244,
            longitude: 3.3792,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    #[serde(default = "default_weather_refresh_minutes")]
    pub refresh_minutes: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        WeatherConfig {
            base_url: default_weather_base_url(),
            refresh_minutes: default_weather_refresh_minutes(),
        }
    }
}

/// How the relay response is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    /// Require a 2xx status and read the `sentTo` confirmation if present.
    ReadResponse,
    /// Any response at all counts as accepted; the body is never read.
    FireAndForget,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Email relay endpoint. Falls back to the sensor URL, since the sheet
    /// script usually serves both.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_relay_mode")]
    pub mode: RelayMode,
    #[serde(default = "default_alert_message")]
    pub message: String,
    /// Recipients preloaded into the alert list.
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Dispatch automatically when the tier rises to at least this level.
    #[serde(default)]
    pub auto_alert_tier: Option<SeverityTier>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            url: None,
            mode: default_relay_mode(),
            message: default_alert_message(),
            recipients: Vec::new(),
            auto_alert_tier: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Append log lines to this file in addition to the console.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevModeConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Depth change per simulated poll.
    #[serde(default = "default_step_cm")]
    pub step_cm: f64,
}

impl Default for DevModeConfig {
    fn default() -> Self {
        DevModeConfig {
            enabled: false,
            step_cm: default_step_cm(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_weather_base_url() -> String {
    "https://api.open-meteo.com".to_string()
}

fn default_weather_refresh_minutes() -> u64 {
    30
}

fn default_relay_mode() -> RelayMode {
    RelayMode::ReadResponse
}

fn default_alert_message() -> String {
    "CRITICAL TEST ALERT: RiverGuard System Triggered!".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_step_cm() -> f64 {
    5.0
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Loads `.env`, reads the config file named by `RIVERGUARD_CONFIG`, applies
/// environment overrides and validates the result.
pub fn load_config() -> Result<DashboardConfig, ConfigError> {
    dotenv::dotenv().ok();
    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = load_from_path(Path::new(&path))?;
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Reads and parses a config file without applying overrides or validation.
pub fn load_from_path(path: &Path) -> Result<DashboardConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    DashboardConfig::from_toml_str(&text)
}

impl DashboardConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies URL overrides from an environment lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(SENSOR_URL_VAR).filter(|u| !u.trim().is_empty()) {
            self.sensor.url = url;
        }
        if let Some(url) = lookup(RELAY_URL_VAR).filter(|u| !u.trim().is_empty()) {
            self.relay.url = Some(url);
        }
    }

    /// Effective relay endpoint.
    pub fn relay_url(&self) -> &str {
        self.relay.url.as_deref().unwrap_or(&self.sensor.url)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.gauge;
        for (name, value) in [
            ("container_height_cm", g.container_height_cm),
            ("warning_cm", g.warning_cm),
            ("flood_cm", g.flood_cm),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("gauge.{} must be finite", name)));
            }
        }
        if g.container_height_cm <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "gauge.container_height_cm must be positive, got {}",
                g.container_height_cm
            )));
        }
        if g.warning_cm >= g.flood_cm {
            return Err(ConfigError::Invalid(format!(
                "gauge.warning_cm ({}) must be below gauge.flood_cm ({})",
                g.warning_cm, g.flood_cm
            )));
        }
        if g.flood_cm > g.container_height_cm {
            return Err(ConfigError::Invalid(format!(
                "gauge.flood_cm ({}) must not exceed gauge.container_height_cm ({})",
                g.flood_cm, g.container_height_cm
            )));
        }

        if self.sensor.url.trim().is_empty() && !self.dev_mode.enabled {
            return Err(ConfigError::Invalid("sensor.url must be set".to_string()));
        }
        if self.sensor.timeout_secs == 0 {
            return Err(ConfigError::Invalid("sensor.timeout_secs must be at least 1".to_string()));
        }
        if !(-90.0..=90.0).contains(&self.location.latitude)
            || !(-180.0..=180.0).contains(&self.location.longitude)
        {
            return Err(ConfigError::Invalid(format!(
                "location ({}, {}) is out of range",
                self.location.latitude, self.location.longitude
            )));
        }
        if self.weather.refresh_minutes == 0 {
            return Err(ConfigError::Invalid("weather.refresh_minutes must be at least 1".to_string()));
        }
        if let Some(bad) = self.relay.recipients.iter().find(|r| !r.contains('@')) {
            return Err(ConfigError::Invalid(format!("relay recipient {:?} is not an email address", bad)));
        }
        if self.dev_mode.enabled && !(self.dev_mode.step_cm.is_finite() && self.dev_mode.step_cm > 0.0) {
            return Err(ConfigError::Invalid("dev_mode.step_cm must be positive".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
