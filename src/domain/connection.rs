// Connection session state machine and link events
use crate::domain::telemetry::{LogEventDraft, TelemetrySample};

/// Close code for an intentional disconnect.
pub const NORMAL_CLOSE_CODE: u16 = 1000;
/// Close code reported when the transport drops without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Unknown,
}

impl ConnectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionPhase::Disconnected => "DISCONNECTED",
            ConnectionPhase::Connecting => "CONNECTING",
            ConnectionPhase::Connected => "CONNECTED",
            ConnectionPhase::Closing => "CLOSING",
            ConnectionPhase::Unknown => "UNKNOWN",
        }
    }
}

/// What to do after the transport closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Stay disconnected; no automatic action.
    Final,
    /// Schedule a reconnect; `attempt` is 1-based.
    Reconnect { attempt: u32, max_attempts: u32 },
}

/// Bookkeeping for one logical connection, including its automatic
/// reconnection chain. Owned exclusively by the link; subscribers only
/// ever see emitted [`LinkEvent`]s.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: ConnectionPhase,
    pub url: Option<String>,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
}

impl SessionState {
    pub fn new(max_reconnect_attempts: u32) -> Self {
        Self {
            phase: ConnectionPhase::Disconnected,
            url: None,
            reconnect_attempts: 0,
            max_reconnect_attempts,
        }
    }

    /// Enter the Connecting phase for `url`. Reconnect attempts are left
    /// untouched: they reset only once a connection is actually established,
    /// so a failing retry chain still runs down its budget.
    pub fn begin_connect(&mut self, url: &str) {
        self.phase = ConnectionPhase::Connecting;
        self.url = Some(url.to_string());
    }

    pub fn mark_connected(&mut self) {
        self.phase = ConnectionPhase::Connected;
        self.reconnect_attempts = 0;
    }

    pub fn mark_closing(&mut self) {
        self.phase = ConnectionPhase::Closing;
    }

    /// Record a transport close and decide whether to reconnect.
    /// Abnormal closes consume one attempt from the budget.
    pub fn record_close(&mut self, code: u16) -> CloseDisposition {
        self.phase = ConnectionPhase::Disconnected;
        if code != NORMAL_CLOSE_CODE && self.reconnect_attempts < self.max_reconnect_attempts {
            self.reconnect_attempts += 1;
            CloseDisposition::Reconnect {
                attempt: self.reconnect_attempts,
                max_attempts: self.max_reconnect_attempts,
            }
        } else {
            CloseDisposition::Final
        }
    }

    /// Exhaust the reconnect budget so no scheduled reconnect fires.
    /// Used by intentional disconnects.
    pub fn suppress_reconnect(&mut self) {
        self.reconnect_attempts = self.max_reconnect_attempts;
    }
}

/// A decoded inbound frame. Malformed payloads degrade to `Raw` rather
/// than being dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Sample(Box<TelemetrySample>),
    Raw(String),
}

/// Everything the link can tell its subscribers. Consumers pattern-match
/// exhaustively instead of registering on string-keyed events.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Connected { url: String },
    Disconnected { code: u16, reason: String },
    Reconnecting { attempt: u32, max_attempts: u32 },
    Data { frame: Frame, log_event: Option<LogEventDraft> },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abnormal_close_consumes_attempts_up_to_max() {
        let mut session = SessionState::new(5);
        session.begin_connect("ws://vehicle:81");
        for expected in 1..=5 {
            let disposition = session.record_close(ABNORMAL_CLOSE_CODE);
            assert_eq!(
                disposition,
                CloseDisposition::Reconnect {
                    attempt: expected,
                    max_attempts: 5
                }
            );
        }
        // Budget exhausted: the sixth abnormal close stays down.
        assert_eq!(
            session.record_close(ABNORMAL_CLOSE_CODE),
            CloseDisposition::Final
        );
        assert_eq!(session.phase, ConnectionPhase::Disconnected);
    }

    #[test]
    fn test_normal_close_never_reconnects() {
        let mut session = SessionState::new(5);
        session.begin_connect("ws://vehicle:81");
        session.mark_connected();
        assert_eq!(session.record_close(NORMAL_CLOSE_CODE), CloseDisposition::Final);
        assert_eq!(session.reconnect_attempts, 0);
    }

    #[test]
    fn test_connected_resets_attempt_counter() {
        let mut session = SessionState::new(5);
        session.begin_connect("ws://vehicle:81");
        session.record_close(ABNORMAL_CLOSE_CODE);
        session.record_close(ABNORMAL_CLOSE_CODE);
        assert_eq!(session.reconnect_attempts, 2);
        session.mark_connected();
        assert_eq!(session.reconnect_attempts, 0);
    }

    #[test]
    fn test_suppress_reconnect_blocks_later_abnormal_close() {
        let mut session = SessionState::new(5);
        session.begin_connect("ws://vehicle:81");
        session.mark_connected();
        session.suppress_reconnect();
        assert_eq!(
            session.record_close(ABNORMAL_CLOSE_CODE),
            CloseDisposition::Final
        );
    }
}
