//! Console render layer.
//!
//! Subscribes to dashboard and weather snapshots and redraws a text version
//! of the gauge panel whenever either changes. Everything here is a pure
//! function of a snapshot except `run_renderer`.

use tokio::sync::watch;

use crate::alert::thresholds::check_depth;
use crate::config::GaugeThresholds;
use crate::ingest::weather::WeatherSnapshot;
use crate::model::{DashboardState, DeviceStatus, HistoryPoint, PLACEHOLDER_TIME_LABEL, format_time_label};

const GAUGE_WIDTH: usize = 40;
const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Ruler labels from the container top down, one per tenth of the height.
pub fn ruler_marks(container_height_cm: f64) -> Vec<String> {
    (0..10)
        .map(|i| format!("{:.0}", container_height_cm - i as f64 * (container_height_cm / 10.0)))
        .collect()
}

pub fn gauge_bar(percentage: f64, width: usize) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

pub fn status_line(state: &DashboardState) -> String {
    let dot = match state.status {
        DeviceStatus::Online => "●",
        DeviceStatus::Offline => "○",
    };
    let last_update = state
        .gauge
        .as_ref()
        .and_then(|g| g.timestamp)
        .map(format_time_label)
        .unwrap_or_else(|| PLACEHOLDER_TIME_LABEL.to_string());
    format!("{} {}  Last Update: {}", dot, state.status, last_update)
}

/// One character per history point, scaled against the container height.
pub fn sparkline(points: &[HistoryPoint], container_height_cm: f64) -> String {
    points
        .iter()
        .map(|p| {
            let ratio = (p.value / container_height_cm).clamp(0.0, 1.0);
            let index = (ratio * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
            SPARK_LEVELS[index]
        })
        .collect()
}

pub fn render_dashboard(state: &DashboardState, thresholds: &GaugeThresholds) -> String {
    let mut lines = vec![status_line(state)];

    match &state.gauge {
        Some(gauge) => {
            lines.push(format!(
                "Depth: {:.1} cm of {:.0} cm ({:.0}%)  rate {:+.1}",
                gauge.depth_cm.max(0.0),
                thresholds.container_height_cm,
                gauge.percentage,
                gauge.rate
            ));
            lines.push(format!("{} {}", gauge_bar(gauge.percentage, GAUGE_WIDTH), gauge.tier.badge()));
            if let Some(alert) = check_depth(gauge.depth_cm, thresholds) {
                lines.push(format!("!! {}: {}", alert.title, alert.message));
            }
        }
        None => lines.push("Depth: waiting for first reading".to_string()),
    }

    if let (Some(first), Some(last)) = (state.history.first(), state.history.last()) {
        lines.push(format!(
            "Trend {} .. {}  {}",
            first.label,
            last.label,
            sparkline(&state.history, thresholds.container_height_cm)
        ));
    }

    lines.join("\n")
}

pub fn render_weather(weather: &WeatherSnapshot) -> String {
    let mut parts = vec![format!("{:.1}°C", weather.temperature_c)];
    parts.push(if weather.is_raining() { "raining".to_string() } else { "dry".to_string() });
    if let Some(humidity) = weather.relative_humidity {
        parts.push(format!("humidity {:.0}%", humidity));
    }
    if let Some(probability) = weather.precipitation_probability {
        parts.push(format!("rain chance {:.0}%", probability));
    }
    format!("Weather: {}", parts.join(", "))
}

/// Redraws on every published change until both channels close.
pub async fn run_renderer(
    mut dashboard: watch::Receiver<Option<DashboardState>>,
    mut weather: watch::Receiver<Option<WeatherSnapshot>>,
    thresholds: GaugeThresholds,
) {
    let ruler = ruler_marks(thresholds.container_height_cm).join(" ");
    println!("Ruler (cm): {}", ruler);

    let mut dashboard_open = true;
    let mut weather_open = true;
    while dashboard_open || weather_open {
        tokio::select! {
            changed = dashboard.changed(), if dashboard_open => {
                if changed.is_err() {
                    dashboard_open = false;
                    continue;
                }
                if let Some(state) = dashboard.borrow_and_update().clone() {
                    println!("\n{}", render_dashboard(&state, &thresholds));
                }
            }
            changed = weather.changed(), if weather_open => {
                if changed.is_err() {
                    weather_open = false;
                    continue;
                }
                if let Some(snapshot) = weather.borrow_and_update().clone() {
                    println!("{}", render_weather(&snapshot));
                }
            }
        }
    }
}
