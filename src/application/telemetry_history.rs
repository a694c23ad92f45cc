// Bounded history aggregator feeding the time-series charts
use crate::domain::telemetry::TelemetrySample;
use chrono::Utc;
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub label: String,
    pub value: f64,
}

/// FIFO-evicting fixed-capacity series of chart points.
#[derive(Debug, Clone)]
pub struct HistorySeries {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl HistorySeries {
    fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, point: HistoryPoint) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }
}

/// Turns the unbounded sample stream into fixed-size plot data plus
/// running session counters. Mutated only through `append`/`reset`;
/// the presentation layer reads it on each render.
#[derive(Debug)]
pub struct TelemetryHistory {
    voltage: HistorySeries,
    temperature: HistorySeries,
    speed: HistorySeries,
    packet_count: u64,
    started_at_ms: Option<i64>,
}

impl TelemetryHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            voltage: HistorySeries::new(capacity),
            temperature: HistorySeries::new(capacity),
            speed: HistorySeries::new(capacity),
            packet_count: 0,
            started_at_ms: None,
        }
    }

    /// Append one sample to every tracked series. Non-finite values are
    /// stored as-is so the series stay positionally aligned.
    pub fn append(&mut self, sample: &TelemetrySample) {
        if self.started_at_ms.is_none() {
            self.started_at_ms = Some(Utc::now().timestamp_millis());
        }
        let label = sample.timestamp.clone();
        self.voltage.push(HistoryPoint {
            label: label.clone(),
            value: sample.voltage,
        });
        self.temperature.push(HistoryPoint {
            label: label.clone(),
            value: sample.temperature,
        });
        self.speed.push(HistoryPoint {
            label,
            value: sample.speed,
        });
        self.packet_count += 1;
    }

    /// Drop everything so a new session's chart starts empty instead of
    /// carrying over stale points.
    pub fn reset(&mut self) {
        self.voltage.clear();
        self.temperature.clear();
        self.speed.clear();
        self.packet_count = 0;
        self.started_at_ms = None;
    }

    pub fn voltage(&self) -> &HistorySeries {
        &self.voltage
    }

    pub fn temperature(&self) -> &HistorySeries {
        &self.temperature
    }

    pub fn speed(&self) -> &HistorySeries {
        &self.speed
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    pub fn started_at_ms(&self) -> Option<i64> {
        self.started_at_ms
    }
}

impl Default for TelemetryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
