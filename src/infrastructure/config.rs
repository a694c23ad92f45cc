// Runtime configuration for the ground station shell
use serde::Deserialize;
use std::time::Duration;

/// Which telemetry source the shell drives. Exactly one is active at a time.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Simulate,
    Connect,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub mode: SourceMode,
    /// WebSocket endpoint of the vehicle, e.g. ws://192.168.1.100:81
    pub url: String,
    pub tick_interval_ms: u64,
    pub history_capacity: usize,
    pub log_capacity: usize,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl Settings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Load settings from `config/groundstation.{toml,yaml,json}` when present,
/// falling back to the documented defaults for every knob.
pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .set_default("mode", "simulate")?
        .set_default("url", "ws://192.168.1.100:81")?
        .set_default("tick_interval_ms", 1000)?
        .set_default("history_capacity", 60)?
        .set_default("log_capacity", 200)?
        .set_default("reconnect_delay_ms", 3000)?
        .set_default("max_reconnect_attempts", 5)?
        .add_source(config::File::with_name("config/groundstation").required(false))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_no_config_file() {
        let settings = load_settings().expect("defaults must deserialize");
        assert_eq!(settings.mode, SourceMode::Simulate);
        assert_eq!(settings.tick_interval_ms, 1000);
        assert_eq!(settings.history_capacity, 60);
        assert_eq!(settings.log_capacity, 200);
        assert_eq!(settings.reconnect_delay_ms, 3000);
        assert_eq!(settings.max_reconnect_attempts, 5);
    }
}
