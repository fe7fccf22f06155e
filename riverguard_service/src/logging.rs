//! Structured logging for the water-depth monitoring service
//!
//! Every event carries a `source` field naming the collaborator involved
//! (sensor sheet, weather API, email relay, or the service itself). Console
//! output goes through `tracing-subscriber`; an optional log file receives
//! the same events without ANSI colors for daemon operations.

use std::fmt;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::config::LoggingConfig;
use crate::model::MonitorError;

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Sensor,
    Weather,
    Relay,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Sensor => write!(f, "SENSOR"),
            DataSource::Weather => write!(f, "WEATHER"),
            DataSource::Relay => write!(f, "RELAY"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the sheet has no row yet, or the sensor sent a partial row
    Expected,
    /// Unexpected failure - indicates service degradation or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a failure based on the error kind and where it came from.
pub fn classify_failure(source: DataSource, err: &MonitorError) -> FailureType {
    match err {
        // A missing key usually means the sheet row is still being written.
        MonitorError::MissingField(_) => FailureType::Expected,
        // Garbage in a numeric cell points at the sensor firmware or sheet formulas.
        MonitorError::Parse { .. } => FailureType::Unexpected,
        MonitorError::HttpStatus(code) if *code >= 500 => FailureType::Unknown,
        MonitorError::HttpStatus(_) => FailureType::Unexpected,
        // Weather is decorative; a flaky forecast API is not worth an error line.
        MonitorError::Transport(_) if source == DataSource::Weather => FailureType::Unknown,
        MonitorError::Transport(_) | MonitorError::Dispatch(_) => FailureType::Unexpected,
        MonitorError::NoRecipients
        | MonitorError::InvalidRecipient(_)
        | MonitorError::DispatchInProgress => FailureType::Expected,
    }
}

/// Log a failure with automatic classification.
pub fn log_failure(source: DataSource, operation: &str, err: &MonitorError) {
    let failure_type = classify_failure(source, err);
    match failure_type {
        FailureType::Expected => {
            tracing::debug!(source = %source, kind = %failure_type, "{} failed: {}", operation, err)
        }
        FailureType::Unexpected => {
            tracing::error!(source = %source, kind = %failure_type, "{} failed: {}", operation, err)
        }
        FailureType::Unknown => {
            tracing::warn!(source = %source, kind = %failure_type, "{} failed: {}", operation, err)
        }
    }
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Builds the level filter: `RUST_LOG` wins over the configured level.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = build_filter(&config.level);

    match &config.file {
        Some(path) => {
            let (directory, file_name) = split_log_path(path);
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::io::stderr.and(file_writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

fn split_log_path(path: &Path) -> (&Path, &std::ffi::OsStr) {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("riverguard.log"));
    (directory, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FIELD_WATER_LEVEL;

    #[test]
    fn test_failure_classification() {
        let missing = MonitorError::MissingField(FIELD_WATER_LEVEL);
        assert_eq!(classify_failure(DataSource::Sensor, &missing), FailureType::Expected);

        let parse = MonitorError::Parse { field: FIELD_WATER_LEVEL, value: "\"abc\"".into() };
        assert_eq!(classify_failure(DataSource::Sensor, &parse), FailureType::Unexpected);

        assert_eq!(
            classify_failure(DataSource::Sensor, &MonitorError::HttpStatus(503)),
            FailureType::Unknown
        );
        assert_eq!(
            classify_failure(DataSource::Sensor, &MonitorError::HttpStatus(404)),
            FailureType::Unexpected
        );
    }

    #[test]
    fn test_weather_transport_failures_are_not_errors() {
        let err = MonitorError::Transport("connection reset".into());
        assert_eq!(classify_failure(DataSource::Weather, &err), FailureType::Unknown);
        assert_eq!(classify_failure(DataSource::Sensor, &err), FailureType::Unexpected);
    }

    #[test]
    fn test_source_labels() {
        assert_eq!(DataSource::Sensor.to_string(), "SENSOR");
        assert_eq!(DataSource::System.to_string(), "SYS");
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("logs/riverguard.log"));
        assert_eq!(dir, Path::new("logs"));
        assert_eq!(name, "riverguard.log");

        let (dir, name) = split_log_path(Path::new("riverguard.log"));
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "riverguard.log");
    }
}
