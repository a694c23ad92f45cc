// Main entry point - Dependency injection and source wiring
use std::sync::{Arc, Mutex};

use groundstation_telemetry::application::event_log::EventLog;
use groundstation_telemetry::application::simulation_engine::{SimulationEngine, TelemetrySink};
use groundstation_telemetry::application::telemetry_history::TelemetryHistory;
use groundstation_telemetry::domain::connection::{Frame, LinkEvent};
use groundstation_telemetry::domain::telemetry::LogLevel;
use groundstation_telemetry::infrastructure::config::{load_settings, SourceMode};
use groundstation_telemetry::infrastructure::websocket_link::{LinkConfig, TelemetryLink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let settings = load_settings()?;

    // Session-owned state, mutated only through its append APIs
    let history = Arc::new(Mutex::new(TelemetryHistory::new(settings.history_capacity)));
    let log = Arc::new(Mutex::new(EventLog::new(settings.log_capacity)));
    log.lock()
        .unwrap()
        .append(LogLevel::Info, "Ground station initialized", "System");

    // Shared sample callback: the same contract serves both sources, so
    // downstream consumers never care where a sample came from.
    let sink: TelemetrySink = {
        let history = history.clone();
        let log = log.clone();
        Arc::new(move |sample, log_event| {
            tracing::debug!(
                voltage = sample.voltage,
                speed = sample.speed,
                "sample received"
            );
            history.lock().unwrap().append(&sample);
            if let Some(event) = log_event {
                log.lock()
                    .unwrap()
                    .append(event.level, &event.message, &event.source);
            }
        })
    };

    // Exactly one source is active at a time; the shell picks it here and
    // starts it against a freshly reset history.
    let engine = SimulationEngine::new();
    let link = TelemetryLink::new(LinkConfig {
        reconnect_delay: settings.reconnect_delay(),
        max_reconnect_attempts: settings.max_reconnect_attempts,
    });

    match settings.mode {
        SourceMode::Simulate => {
            history.lock().unwrap().reset();
            log.lock().unwrap().append(
                LogLevel::Success,
                "Simulation started - generating synthetic data",
                "SimulationEngine",
            );
            engine.start(sink, settings.tick_interval());
        }
        SourceMode::Connect => {
            let history = history.clone();
            let log_for_events = log.clone();
            link.subscribe(move |event: &LinkEvent| match event {
                LinkEvent::Connected { url } => {
                    history.lock().unwrap().reset();
                    log_for_events.lock().unwrap().append(
                        LogLevel::Success,
                        &format!("WebSocket connection established: {}", url),
                        "WebSocket",
                    );
                }
                LinkEvent::Disconnected { code, reason } => {
                    let reason = if reason.is_empty() {
                        "no reason"
                    } else {
                        reason.as_str()
                    };
                    log_for_events.lock().unwrap().append(
                        LogLevel::Warning,
                        &format!("Connection closed ({}): {}", code, reason),
                        "WebSocket",
                    );
                }
                LinkEvent::Reconnecting {
                    attempt,
                    max_attempts,
                } => {
                    log_for_events.lock().unwrap().append(
                        LogLevel::Info,
                        &format!("Reconnecting... attempt {}/{}", attempt, max_attempts),
                        "WebSocket",
                    );
                }
                LinkEvent::Data { frame, log_event } => match frame {
                    Frame::Sample(sample) => sink(*sample.clone(), log_event.clone()),
                    Frame::Raw(payload) => {
                        tracing::debug!(payload, "raw frame passed through");
                    }
                },
                LinkEvent::Error { message } => {
                    log_for_events.lock()
                        .unwrap()
                        .append(LogLevel::Error, &format!("WebSocket error: {}", message), "WebSocket");
                }
            });

            log.lock().unwrap().append(
                LogLevel::Info,
                &format!("Connecting to {}...", settings.url),
                "WebSocket",
            );
            if let Err(err) = link.connect(&settings.url).await {
                tracing::error!(error = %err, "initial connect failed");
            }
        }
    }

    tokio::signal::ctrl_c().await?;

    engine.stop();
    link.disconnect().await;
    let packets = history.lock().unwrap().packet_count();
    tracing::info!(packets, "ground station shut down");

    Ok(())
}
