// Wire codec for inbound telemetry frames and outbound command frames
use crate::domain::telemetry::{display_timestamp, LogEventDraft, LogLevel, TelemetrySample};
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing or non-numeric field `{0}`")]
    BadField(&'static str),
}

/// Accept a JSON number or a decimal string; firmware on the vehicle side
/// sends both depending on the field.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn metric(object: &serde_json::Map<String, Value>, field: &'static str) -> Result<f64, DecodeError> {
    object
        .get(field)
        .and_then(numeric)
        .ok_or(DecodeError::BadField(field))
}

/// Decode one inbound frame into a sample plus any embedded log event.
/// Callers degrade a `DecodeError` to a raw passthrough; a frame is never
/// dropped for being malformed.
pub fn decode_frame(payload: &str) -> Result<(TelemetrySample, Option<LogEventDraft>), DecodeError> {
    let value: Value = serde_json::from_str(payload).map_err(|_| DecodeError::NotAnObject)?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let sample = TelemetrySample {
        voltage: metric(object, "voltage")?,
        temperature: metric(object, "temperature")?,
        speed: metric(object, "speed")?,
        rpm_left: metric(object, "rpmLeft")?,
        rpm_right: metric(object, "rpmRight")?,
        current: metric(object, "current")?,
        distance: metric(object, "distance")?,
        timestamp: object
            .get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(display_timestamp),
        source_timestamp_ms: object
            .get("timestampMs")
            .and_then(Value::as_i64)
            .unwrap_or_else(|| Utc::now().timestamp_millis()),
    };

    let log_event = object.get("logEvent").and_then(Value::as_object).map(|ev| {
        LogEventDraft {
            level: ev
                .get("level")
                .and_then(Value::as_str)
                .map(LogLevel::parse)
                .unwrap_or(LogLevel::Info),
            message: ev
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            source: ev
                .get("source")
                .and_then(Value::as_str)
                .unwrap_or("Vehicle")
                .to_string(),
        }
    });

    Ok((sample, log_event))
}

/// Serialize an outbound command frame.
pub fn encode_command(command: &str, params: Value) -> String {
    json!({
        "type": "command",
        "command": command,
        "params": params,
        "timestamp": Utc::now().timestamp_millis(),
    })
    .to_string()
}
