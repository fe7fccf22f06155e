//! Polling coordinator and dashboard state reconciliation.
//!
//! `DashboardModel` owns every piece of mutable dashboard state (last
//! reading, device status, chart history) and turns one input, either a
//! fetched payload or a simulated depth, into a `TickOutcome`. It does no
//! I/O and takes `now` explicitly.
//!
//! `PollingCoordinator` drives the model on a fixed timer. Fetches run as
//! spawned tasks and report back over a channel, so the loop keeps serving
//! simulation commands while a request is outstanding. A new tick is skipped
//! while a fetch is still in flight; the HTTP client timeout bounds how long
//! that can be.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::alert::stalenesses::reading_status_at;
use crate::alert::thresholds::{classify, fill_percentage};
use crate::config::{GaugeThresholds, POLL_INTERVAL_MS};
use crate::history::RollingHistory;
use crate::ingest::sensor::{SensorSource, normalize_payload};
use crate::logging::{DataSource, log_failure};
use crate::model::{DashboardState, DeviceStatus, GaugeView, MonitorError, Reading};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Where a reading came from. Only sensor readings take part in the
/// superseded-response check; a simulated reading is always "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingOrigin {
    Sensor,
    Simulated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Reading accepted; this state was published.
    Published(DashboardState),
    /// Sensor unreachable; the offline state was published.
    WentOffline {
        state: DashboardState,
        error: MonitorError,
    },
    /// Payload rejected; nothing changed and nothing was published.
    Aborted(MonitorError),
    /// Sensor reading older than one already accepted; ignored.
    Superseded {
        received: DateTime<Utc>,
        latest: DateTime<Utc>,
    },
}

// ---------------------------------------------------------------------------
// State model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DashboardModel {
    thresholds: GaugeThresholds,
    status: DeviceStatus,
    last_reading: Option<Reading>,
    latest_sensor_time: Option<DateTime<Utc>>,
    history: RollingHistory,
}

impl DashboardModel {
    pub fn new(thresholds: GaugeThresholds) -> Self {
        Self {
            thresholds,
            status: DeviceStatus::Offline,
            last_reading: None,
            latest_sensor_time: None,
            history: RollingHistory::default(),
        }
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    pub fn last_reading(&self) -> Option<&Reading> {
        self.last_reading.as_ref()
    }

    pub fn history(&self) -> &RollingHistory {
        &self.history
    }

    /// Handles the result of one sensor fetch.
    pub fn apply_payload(
        &mut self,
        payload: Result<Value, MonitorError>,
        now: DateTime<Utc>,
    ) -> TickOutcome {
        let payload = match payload {
            Ok(payload) => payload,
            Err(error) if error.is_transport() => {
                self.status = DeviceStatus::Offline;
                return TickOutcome::WentOffline {
                    state: self.snapshot(),
                    error,
                };
            }
            Err(error) => return TickOutcome::Aborted(error),
        };

        match normalize_payload(&payload) {
            Ok(reading) => self.apply_reading(reading, ReadingOrigin::Sensor, now),
            Err(error) => TickOutcome::Aborted(error),
        }
    }

    /// Shared downstream path for sensor and simulated readings.
    pub fn apply_reading(
        &mut self,
        reading: Reading,
        origin: ReadingOrigin,
        now: DateTime<Utc>,
    ) -> TickOutcome {
        if origin == ReadingOrigin::Sensor {
            if let (Some(received), Some(latest)) = (reading.timestamp, self.latest_sensor_time) {
                if received < latest {
                    return TickOutcome::Superseded { received, latest };
                }
            }
            // A row stamped ahead of our clock must not lock out every
            // correct row that follows it.
            if let Some(ts) = reading.timestamp {
                self.latest_sensor_time = Some(ts.min(now));
            }
        }

        self.status = reading_status_at(&reading, now);
        // No chart point for a reading whose time is unknown.
        if reading.timestamp.is_some() {
            self.history.append(reading.time_label(), reading.display_depth());
        }
        self.last_reading = Some(reading);

        TickOutcome::Published(self.snapshot())
    }

    pub fn snapshot(&self) -> DashboardState {
        DashboardState {
            status: self.status,
            gauge: self.last_reading.as_ref().map(|r| self.gauge_view(r)),
            history: self.history.snapshot(),
        }
    }

    fn gauge_view(&self, reading: &Reading) -> GaugeView {
        GaugeView {
            depth_cm: reading.depth_cm,
            rate: reading.rate,
            tier: classify(reading.depth_cm, &self.thresholds),
            percentage: fill_percentage(reading.depth_cm, self.thresholds.container_height_cm),
            timestamp: reading.timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// User-triggered inputs to the polling loop.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorCommand {
    Simulate(f64),
    Shutdown,
}

pub struct PollingCoordinator<S: ?Sized> {
    source: Arc<S>,
    model: DashboardModel,
    publisher: watch::Sender<Option<DashboardState>>,
    poll_interval: Duration,
    in_flight: bool,
}

impl<S> PollingCoordinator<S>
where
    S: SensorSource + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, thresholds: GaugeThresholds) -> Self {
        let (publisher, _) = watch::channel(None);
        Self {
            source,
            model: DashboardModel::new(thresholds),
            publisher,
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            in_flight: false,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DashboardState>> {
        self.publisher.subscribe()
    }

    pub fn model(&self) -> &DashboardModel {
        &self.model
    }

    /// Fetches and applies one reading inline.
    pub async fn poll_once(&mut self) -> TickOutcome {
        let payload = self.source.fetch_payload().await;
        self.apply_fetch(payload, Utc::now())
    }

    /// Injects a depth as if the sensor had just reported it.
    pub fn simulate(&mut self, depth_cm: f64) -> TickOutcome {
        let now = Utc::now();
        tracing::info!(source = %DataSource::System, depth_cm, "simulating water depth");
        let reading = Reading {
            depth_cm,
            rate: 0.0,
            timestamp: Some(now),
        };
        let outcome = self.model.apply_reading(reading, ReadingOrigin::Simulated, now);
        self.publish(&outcome);
        outcome
    }

    fn apply_fetch(&mut self, payload: Result<Value, MonitorError>, now: DateTime<Utc>) -> TickOutcome {
        let outcome = self.model.apply_payload(payload, now);
        match &outcome {
            TickOutcome::Published(state) => {
                if let Some(gauge) = &state.gauge {
                    tracing::debug!(
                        source = %DataSource::Sensor,
                        depth_cm = gauge.depth_cm,
                        tier = %gauge.tier,
                        status = %state.status,
                        "reading accepted"
                    );
                }
                if state.status == DeviceStatus::Offline {
                    tracing::warn!(source = %DataSource::Sensor, "device status OFFLINE (data is old)");
                }
            }
            TickOutcome::WentOffline { error, .. } => log_failure(DataSource::Sensor, "poll", error),
            TickOutcome::Aborted(error) => log_failure(DataSource::Sensor, "normalize", error),
            TickOutcome::Superseded { received, latest } => tracing::warn!(
                source = %DataSource::Sensor,
                %received,
                %latest,
                "ignoring reading older than the latest accepted one"
            ),
        }
        self.publish(&outcome);
        outcome
    }

    fn publish(&self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Published(state) | TickOutcome::WentOffline { state, .. } => {
                self.publisher.send_replace(Some(state.clone()));
            }
            TickOutcome::Aborted(_) | TickOutcome::Superseded { .. } => {}
        }
    }

    /// Runs until `Shutdown` is received or the command channel closes.
    pub async fn run(mut self, mut commands: mpsc::Receiver<MonitorCommand>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let (done_tx, mut done_rx) = mpsc::channel::<Result<Value, MonitorError>>(4);

        tracing::info!(
            source = %DataSource::System,
            interval_ms = self.poll_interval.as_millis() as u64,
            "polling started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.start_fetch(&done_tx),
                Some(payload) = done_rx.recv() => {
                    self.in_flight = false;
                    self.apply_fetch(payload, Utc::now());
                }
                command = commands.recv() => match command {
                    Some(MonitorCommand::Simulate(depth_cm)) => {
                        self.simulate(depth_cm);
                    }
                    Some(MonitorCommand::Shutdown) | None => break,
                },
            }
        }

        tracing::info!(source = %DataSource::System, "polling stopped");
    }

    fn start_fetch(&mut self, done: &mpsc::Sender<Result<Value, MonitorError>>) {
        if self.in_flight {
            tracing::debug!(source = %DataSource::Sensor, "previous fetch still in flight, skipping tick");
            return;
        }
        self.in_flight = true;

        let source = Arc::clone(&self.source);
        let done = done.clone();
        tokio::spawn(async move {
            // The fetch runs in its own task so a panic inside the source
            // still produces a result and releases the in-flight flag.
            let fetch = tokio::spawn(async move { source.fetch_payload().await });
            let payload = match fetch.await {
                Ok(payload) => payload,
                Err(e) => Err(MonitorError::Transport(format!("sensor fetch task failed: {}", e))),
            };
            let _ = done.send(payload).await;
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
