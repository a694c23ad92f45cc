// Telemetry data domain models
use chrono::Local;

/// One complete reading from the vehicle. Samples are built atomically;
/// a sample is never partially populated.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub voltage: f64,
    pub temperature: f64,
    pub speed: f64,
    pub rpm_left: f64,
    pub rpm_right: f64,
    pub current: f64,
    pub distance: f64,
    /// Display timestamp ("HH:MM:SS"), producer-side.
    pub timestamp: String,
    /// Producer-side instant in epoch milliseconds.
    pub source_timestamp_ms: i64,
}

impl TelemetrySample {
    pub fn all_finite(&self) -> bool {
        [
            self.voltage,
            self.temperature,
            self.speed,
            self.rpm_left,
            self.rpm_right,
            self.current,
            self.distance,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Parse a wire-format level, defaulting unknown strings to INFO.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => LogLevel::Debug,
            "SUCCESS" => LogLevel::Success,
            "WARNING" | "WARN" => LogLevel::Warning,
            "ERROR" => LogLevel::Error,
            "CRITICAL" => LogLevel::Critical,
            _ => LogLevel::Info,
        }
    }
}

/// An entry in the scrollable event log. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub id: u64,
    pub level: LogLevel,
    pub message: String,
    pub source: String,
    pub timestamp: String,
}

/// A log event as carried inside a telemetry frame, before the log buffer
/// assigns it an id and a local timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEventDraft {
    pub level: LogLevel,
    pub message: String,
    pub source: String,
}

/// Current local time formatted for display, matching the dashboard clock.
pub fn display_timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
