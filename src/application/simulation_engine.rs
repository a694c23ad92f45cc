// Synthetic telemetry generator - emulates the vehicle's live feed
use crate::application::models::{gaussian_noise, BatteryModel, MotorModel, ThermalModel};
use crate::domain::telemetry::{display_timestamp, LogEventDraft, LogLevel, TelemetrySample};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1000);
const LOG_EVENT_PROBABILITY: f64 = 0.05;
const SOURCE: &str = "SimulationEngine";

/// Callback contract shared by the synthetic generator and the live link:
/// one sample per delivery, optionally carrying an embedded log event.
pub type TelemetrySink = Arc<dyn Fn(TelemetrySample, Option<LogEventDraft>) + Send + Sync>;

/// Mutable process state for one generator run. Rebuilt on every `start`,
/// never shared across sessions.
#[derive(Debug)]
struct ProcessState {
    battery: BatteryModel,
    thermal: ThermalModel,
    left_motor: MotorModel,
    right_motor: MotorModel,
    distance_m: f64,
    last_tick_ms: i64,
}

impl ProcessState {
    fn new(now_ms: i64) -> Self {
        Self {
            battery: BatteryModel::new(now_ms),
            thermal: ThermalModel::new(),
            left_motor: MotorModel::new(),
            right_motor: MotorModel::new(),
            distance_m: 0.0,
            last_tick_ms: now_ms,
        }
    }

    /// Advance all models one tick and assemble a complete sample.
    fn tick(&mut self, now_ms: i64) -> (TelemetrySample, Option<LogEventDraft>) {
        self.left_motor.auto_vary(now_ms);
        self.right_motor.auto_vary(now_ms);
        // Right track lags/leads the left slightly, like a real differential drive.
        self.right_motor
            .set_target_rpm(self.left_motor.target_rpm() + gaussian_noise(0.0, 30.0));

        let voltage = self.battery.voltage(now_ms);
        let temperature = self.thermal.temperature(now_ms);
        let rpm_left = self.left_motor.update();
        let rpm_right = self.right_motor.update();

        let avg_rpm = (rpm_left + rpm_right) / 2.0;
        // Scale: 1500 RPM ~ 1.5 m/s.
        let speed = (avg_rpm / 1500.0) * 1.5;
        let current = (avg_rpm / 3000.0) * 15.0 + gaussian_noise(0.0, 0.5);

        // Integrate distance tick by tick; speed is never negative, so the
        // odometer never runs backwards.
        let dt_s = (now_ms - self.last_tick_ms).max(0) as f64 / 1000.0;
        self.distance_m += dt_s * speed;
        self.last_tick_ms = now_ms;

        let sample = TelemetrySample {
            voltage,
            temperature,
            speed,
            rpm_left,
            rpm_right,
            current,
            distance: self.distance_m,
            timestamp: display_timestamp(),
            source_timestamp_ms: now_ms,
        };

        let log_event = if rand::random::<f64>() < LOG_EVENT_PROBABILITY {
            random_log_event(voltage, temperature)
        } else {
            None
        };

        (sample, log_event)
    }
}

/// Pick at most one log event from the candidate table. Candidates are
/// ordered by priority; the first to win its independent draw is emitted.
/// Battery and temperature warnings become likely only once their values
/// cross the alarm thresholds.
fn random_log_event(voltage: f64, temperature: f64) -> Option<LogEventDraft> {
    let candidates: [(LogLevel, String, f64); 9] = [
        (LogLevel::Info, "System operating normally".to_string(), 0.4),
        (LogLevel::Info, "Telemetry synchronized".to_string(), 0.3),
        (
            LogLevel::Info,
            "GPS fix acquired: 8 satellites".to_string(),
            0.2,
        ),
        (
            LogLevel::Warning,
            format!("Battery voltage low: {:.2}V", voltage),
            if voltage < 10.5 { 0.8 } else { 0.1 },
        ),
        (
            LogLevel::Warning,
            format!("Temperature elevated: {:.1}\u{b0}C", temperature),
            if temperature > 55.0 { 0.7 } else { 0.05 },
        ),
        (
            LogLevel::Warning,
            "Weak WiFi signal: -75 dBm".to_string(),
            0.1,
        ),
        (LogLevel::Error, "I2C communication timeout".to_string(), 0.02),
        (LogLevel::Error, "IMU sensor not responding".to_string(), 0.02),
        (
            LogLevel::Critical,
            "Lost signal from right motor".to_string(),
            0.01,
        ),
    ];

    for (level, message, probability) in candidates {
        if rand::random::<f64>() < probability {
            return Some(LogEventDraft {
                level,
                message,
                source: SOURCE.to_string(),
            });
        }
    }
    None
}

struct ActiveRun {
    cancelled: Arc<AtomicBool>,
    state: Arc<Mutex<ProcessState>>,
    handle: JoinHandle<()>,
}

/// Drives the process models on a fixed tick, producing one sample per
/// tick through the shared [`TelemetrySink`] contract. An explicitly
/// constructed instance; each `start` owns its own process state.
pub struct SimulationEngine {
    run: Mutex<Option<ActiveRun>>,
}

impl SimulationEngine {
    pub fn new() -> Self {
        Self {
            run: Mutex::new(None),
        }
    }

    /// Start producing samples every `interval`. A previous run, if any, is
    /// cancelled first and its process state discarded - no orphaned tickers.
    pub fn start(&self, sink: TelemetrySink, interval: Duration) {
        let mut slot = self.run.lock().expect("simulation run lock poisoned");
        if let Some(previous) = slot.take() {
            previous.cancelled.store(true, Ordering::SeqCst);
            previous.handle.abort();
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(ProcessState::new(Utc::now().timestamp_millis())));

        let task_cancelled = cancelled.clone();
        let task_state = state.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately;
            // consume it so the first sample lands one full period in.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // Check-before-act: a stop racing this tick wins.
                if task_cancelled.load(Ordering::SeqCst) {
                    break;
                }
                let (sample, log_event) = {
                    let mut state = task_state.lock().expect("process state lock poisoned");
                    state.tick(Utc::now().timestamp_millis())
                };
                sink(sample, log_event);
            }
        });

        *slot = Some(ActiveRun {
            cancelled,
            state,
            handle,
        });
        tracing::info!(interval_ms = interval.as_millis() as u64, "simulation started");
    }

    /// Cancel the active run. Repeated calls are no-ops.
    pub fn stop(&self) {
        let mut slot = self.run.lock().expect("simulation run lock poisoned");
        if let Some(run) = slot.take() {
            run.cancelled.store(true, Ordering::SeqCst);
            run.handle.abort();
            tracing::info!("simulation stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.run
            .lock()
            .expect("simulation run lock poisoned")
            .is_some()
    }

    /// Re-anchor the simulated battery, as if recharged.
    pub fn recharge_battery(&self) {
        self.with_state(|state| state.battery.recharge(Utc::now().timestamp_millis()));
    }

    /// Adjust the simulated system load (drives temperature), clamped to [0, 1].
    pub fn set_load(&self, load: f64) {
        self.with_state(|state| state.thermal.set_load(load));
    }

    /// Set both motors' target RPM, clamped to the motor range.
    pub fn set_target_rpm(&self, rpm: f64) {
        self.with_state(|state| {
            state.left_motor.set_target_rpm(rpm);
            state.right_motor.set_target_rpm(rpm);
        });
    }

    fn with_state(&self, f: impl FnOnce(&mut ProcessState)) {
        let slot = self.run.lock().expect("simulation run lock poisoned");
        if let Some(run) = slot.as_ref() {
            let mut state = run.state.lock().expect("process state lock poisoned");
            f(&mut state);
        }
    }
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SimulationEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting_sink() -> (TelemetrySink, Arc<Mutex<Vec<TelemetrySample>>>) {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink_collected = collected.clone();
        let sink: TelemetrySink = Arc::new(move |sample, _log_event| {
            sink_collected.lock().unwrap().push(sample);
        });
        (sink, collected)
    }

    #[tokio::test]
    async fn test_one_second_of_100ms_ticks_yields_about_ten_samples() {
        let engine = SimulationEngine::new();
        let (sink, collected) = collecting_sink();
        engine.start(sink, Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(1050)).await;
        engine.stop();

        let samples = collected.lock().unwrap();
        assert!(
            (8..=12).contains(&samples.len()),
            "expected ~10 samples, got {}",
            samples.len()
        );
        for sample in samples.iter() {
            assert!(sample.all_finite(), "non-finite field in {:?}", sample);
            assert!(sample.speed >= 0.0);
        }
        for pair in samples.windows(2) {
            assert!(
                pair[1].distance >= pair[0].distance,
                "odometer ran backwards: {} -> {}",
                pair[0].distance,
                pair[1].distance
            );
            assert!(pair[1].source_timestamp_ms >= pair[0].source_timestamp_ms);
        }
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_halts_delivery() {
        let engine = SimulationEngine::new();
        let (sink, collected) = collecting_sink();
        engine.start(sink, Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.stop();
        engine.stop();
        assert!(!engine.is_active());

        let count_after_stop = collected.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(collected.lock().unwrap().len(), count_after_stop);
    }

    #[tokio::test]
    async fn test_restart_replaces_previous_run() {
        let engine = SimulationEngine::new();
        let (first_sink, first) = collecting_sink();
        engine.start(first_sink, Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(60)).await;

        let (second_sink, second) = collecting_sink();
        engine.start(second_sink, Duration::from_millis(20));
        let first_count = first.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The first run's ticker is gone; only the second keeps producing.
        assert_eq!(first.lock().unwrap().len(), first_count);
        assert!(!second.lock().unwrap().is_empty());
        assert!(engine.is_active());
        engine.stop();
    }

    #[tokio::test]
    async fn test_process_adjustments_apply_to_live_run() {
        let engine = SimulationEngine::new();

        // Adjusting with no run active is a harmless no-op.
        engine.set_load(0.3);
        engine.recharge_battery();

        let (sink, collected) = collecting_sink();
        engine.start(sink, Duration::from_millis(20));
        engine.set_load(0.0);
        engine.set_target_rpm(1200.0);
        engine.recharge_battery();
        tokio::time::sleep(Duration::from_millis(400)).await;
        engine.stop();

        let samples = collected.lock().unwrap();
        assert!(!samples.is_empty());
        // Zero load keeps the mean temperature near ambient: base 35 plus at
        // most the 0.3 wobble of the 30-degree span plus jitter.
        let mean_temp =
            samples.iter().map(|s| s.temperature).sum::<f64>() / samples.len() as f64;
        assert!(mean_temp < 50.0, "mean temperature {} with zero load", mean_temp);
        // A freshly recharged pack barely discharges in under a second.
        for sample in samples.iter() {
            assert!(sample.voltage > 12.0, "voltage {} after recharge", sample.voltage);
        }
    }

    #[test]
    fn test_random_log_event_prefers_battery_warning_when_low() {
        // At 9.2V the battery candidate wins 80% of its draws; over many
        // trials the warning must show up.
        let mut saw_battery_warning = false;
        for _ in 0..200 {
            if let Some(event) = random_log_event(9.2, 40.0) {
                if event.message.starts_with("Battery voltage low") {
                    assert_eq!(event.level, LogLevel::Warning);
                    saw_battery_warning = true;
                    break;
                }
            }
        }
        assert!(saw_battery_warning);
    }
}
