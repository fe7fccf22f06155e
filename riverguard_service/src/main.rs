use std::process::ExitCode;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use riverguard_service::alert::notifier::{AlertNotifier, DispatchReceipt, EscalationTrigger, RecipientSet};
use riverguard_service::commands::{ConsoleCommand, HELP_TEXT, parse_command};
use riverguard_service::config;
use riverguard_service::dev_mode::DevMode;
use riverguard_service::ingest::sensor::{HttpSensorSource, SensorSource};
use riverguard_service::ingest::weather::{self, WeatherSnapshot};
use riverguard_service::logging::{DataSource, init_logging, log_failure};
use riverguard_service::model::{DashboardState, MonitorError, SeverityTier};
use riverguard_service::monitor::{MonitorCommand, PollingCoordinator};
use riverguard_service::render;
use riverguard_service::verify::{VerificationReport, VerificationStatus, verify_endpoints};

type SharedRecipients = Arc<Mutex<RecipientSet>>;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("riverguard: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = init_logging(&config.logging);

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.sensor.timeout_secs))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(source = %DataSource::System, error = %e, "failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };

    let recipients: SharedRecipients = match RecipientSet::from_list(&config.relay.recipients) {
        Ok(set) => Arc::new(Mutex::new(set)),
        Err(e) => {
            tracing::error!(source = %DataSource::System, error = %e, "invalid recipient in config");
            return ExitCode::FAILURE;
        }
    };

    let source: Arc<dyn SensorSource> = if config.dev_mode.enabled {
        tracing::warn!(
            source = %DataSource::System,
            step_cm = config.dev_mode.step_cm,
            "dev mode enabled, readings are simulated"
        );
        Arc::new(DevMode::new(config.dev_mode.step_cm, config.gauge.container_height_cm))
    } else {
        tracing::info!(source = %DataSource::System, url = %config.sensor.url, "polling sensor endpoint");
        let report = verify_endpoints(&client, &config).await;
        log_report(&report);
        Arc::new(HttpSensorSource::new(client.clone(), config.sensor.url.clone()))
    };

    // Polling loop
    let coordinator = PollingCoordinator::new(source, config.gauge.clone());
    let dashboard_rx = coordinator.subscribe();
    let (monitor_tx, monitor_rx) = mpsc::channel(16);
    let monitor = tokio::spawn(coordinator.run(monitor_rx));

    // Weather panel
    let (weather_tx, weather_rx) = watch::channel(None::<WeatherSnapshot>);
    tokio::spawn(weather::run_weather_refresh(
        client.clone(),
        config.weather.base_url.clone(),
        config.location.clone(),
        Duration::from_secs(config.weather.refresh_minutes * 60),
        weather_tx,
    ));

    tokio::spawn(render::run_renderer(
        dashboard_rx.clone(),
        weather_rx.clone(),
        config.gauge.clone(),
    ));

    let notifier = Arc::new(AlertNotifier::new(client.clone(), config.relay_url(), config.relay.mode));
    if let Some(tier) = config.relay.auto_alert_tier {
        tokio::spawn(run_auto_alert(
            dashboard_rx.clone(),
            tier,
            Arc::clone(&notifier),
            Arc::clone(&recipients),
            config.relay.message.clone(),
        ));
    }

    println!("{}", HELP_TEXT);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => break,
        };
        let line = match line {
            Ok(Some(line)) => line,
            // stdin closed
            Ok(None) => break,
            Err(e) => {
                tracing::error!(source = %DataSource::System, error = %e, "failed to read console input");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        match command {
            ConsoleCommand::Simulate(depth_cm) => {
                if monitor_tx.send(MonitorCommand::Simulate(depth_cm)).await.is_err() {
                    break;
                }
            }
            ConsoleCommand::AddRecipient(email) => match lock(&recipients).add(&email) {
                Ok(true) => println!("Added {}", email.trim()),
                Ok(false) => println!("{} is already a recipient", email.trim()),
                Err(e) => println!("{}", e),
            },
            ConsoleCommand::RemoveRecipient(email) => {
                if lock(&recipients).remove(&email) {
                    println!("Removed {}", email.trim());
                } else {
                    println!("{} is not a recipient", email.trim());
                }
            }
            ConsoleCommand::ListRecipients => {
                let set = lock(&recipients);
                if set.is_empty() {
                    println!("No recipients.");
                }
                for email in set.as_slice() {
                    println!("  {}", email);
                }
            }
            ConsoleCommand::SendAlert(message) => {
                let message = message.unwrap_or_else(|| config.relay.message.clone());
                let set = lock(&recipients).clone();
                let notifier = Arc::clone(&notifier);
                tokio::spawn(async move {
                    report_dispatch(notifier.dispatch(&set, &message).await);
                });
            }
            ConsoleCommand::Weather => match weather_rx.borrow().as_ref() {
                Some(snapshot) => println!("{}", render::render_weather(snapshot)),
                None => println!("No weather data yet."),
            },
            ConsoleCommand::Verify => {
                let report = verify_endpoints(&client, &config).await;
                log_report(&report);
                println!(
                    "sensor: {:?}, weather: {:?}",
                    report.sensor.status, report.weather.status
                );
            }
            ConsoleCommand::Help => println!("{}", HELP_TEXT),
            ConsoleCommand::Quit => break,
        }
    }

    let _ = monitor_tx.send(MonitorCommand::Shutdown).await;
    if let Err(e) = monitor.await {
        tracing::error!(source = %DataSource::System, error = %e, "polling task failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn lock(recipients: &Mutex<RecipientSet>) -> MutexGuard<'_, RecipientSet> {
    recipients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Dispatches once each time the published tier climbs to `trigger_tier`.
async fn run_auto_alert(
    mut dashboard: watch::Receiver<Option<DashboardState>>,
    trigger_tier: SeverityTier,
    notifier: Arc<AlertNotifier>,
    recipients: SharedRecipients,
    message: String,
) {
    let mut trigger = EscalationTrigger::new(trigger_tier);
    while dashboard.changed().await.is_ok() {
        let tier = dashboard
            .borrow_and_update()
            .as_ref()
            .and_then(|state| state.gauge.as_ref())
            .map(|gauge| gauge.tier);
        let Some(tier) = tier else { continue };
        if !trigger.observe(tier) {
            continue;
        }

        tracing::warn!(source = %DataSource::System, %tier, "water level escalated, sending automatic alert");
        let set = lock(&recipients).clone();
        report_dispatch(notifier.dispatch(&set, &message).await);
    }
}

fn report_dispatch(result: Result<DispatchReceipt, MonitorError>) {
    match result {
        Ok(DispatchReceipt { confirmed: Some(sent), .. }) if !sent.is_empty() => {
            println!("Alerts sent successfully to: {}", sent.join(", "));
        }
        Ok(receipt) => println!("Alert signal sent to system! ({} recipients)", receipt.recipients),
        Err(MonitorError::NoRecipients) => println!("Add at least one recipient first (add <email>)."),
        Err(MonitorError::DispatchInProgress) => println!("An alert is already being sent."),
        Err(e) => {
            log_failure(DataSource::Relay, "dispatch", &e);
            println!("Error sending alerts.");
        }
    }
}

fn log_report(report: &VerificationReport) {
    for (name, endpoint) in [("sensor", &report.sensor), ("weather", &report.weather)] {
        if endpoint.status == VerificationStatus::Success {
            tracing::info!(source = %DataSource::System, endpoint = name, url = %endpoint.url, "endpoint verified");
        } else {
            tracing::warn!(
                source = %DataSource::System,
                endpoint = name,
                url = %endpoint.url,
                status = ?endpoint.status,
                error = endpoint.error_message.as_deref().unwrap_or("none"),
                "endpoint check failed"
            );
        }
    }
}
