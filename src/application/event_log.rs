// Fixed-capacity event log buffer
use crate::domain::telemetry::{display_timestamp, LogEvent, LogLevel};
use std::collections::VecDeque;

pub const DEFAULT_LOG_CAPACITY: usize = 200;

/// Chronological, front-truncating buffer of log entries. Filtering and
/// search happen in the presentation layer; this only owns ordering,
/// identity, and the size bound.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<LogEvent>,
    capacity: usize,
    next_id: u64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            next_id: 0,
        }
    }

    /// Append a new entry with a fresh unique id and current-time stamp,
    /// then truncate from the front to capacity.
    pub fn append(&mut self, level: LogLevel, message: &str, source: &str) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_back(LogEvent {
            id,
            level,
            message: message.to_string(),
            source: source.to_string(),
            timestamp: display_timestamp(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        id
    }

    /// Reset to a single synthetic entry marking the clear.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.append(LogLevel::Info, "Logs cleared", "System");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEvent> {
        self.entries.iter()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
