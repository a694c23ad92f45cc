// WebSocket connection state machine with bounded automatic reconnection
use crate::application::event_bus::{EventBus, SubscriberId};
use crate::domain::connection::{
    CloseDisposition, ConnectionPhase, Frame, LinkEvent, SessionState, ABNORMAL_CLOSE_CODE,
    NORMAL_CLOSE_CODE,
};
use crate::infrastructure::frame_codec;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("connect to {url} failed: {message}")]
    ConnectFailed { url: String, message: String },
    #[error("a connection attempt is already in progress")]
    ConnectInProgress,
    #[error("not connected; payload was not sent")]
    NotConnected,
    #[error("send failed: {0}")]
    SendFailed(String),
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(3000),
            max_reconnect_attempts: 5,
        }
    }
}

struct LinkShared {
    config: LinkConfig,
    bus: EventBus<LinkEvent>,
    session: Mutex<SessionState>,
    writer: tokio::sync::Mutex<Option<WsWriter>>,
    /// Bumped on every successful connect and every intentional disconnect;
    /// a reader task from an older connection observes the mismatch and
    /// performs no further work.
    generation: AtomicU64,
    /// Bumped by `disconnect` to invalidate scheduled reconnects.
    reconnect_epoch: AtomicU64,
}

/// Owns one physical WebSocket connection and its [`SessionState`],
/// translating transport callbacks into typed [`LinkEvent`]s. Constructed
/// explicitly and handed to whoever needs it; cloning yields another
/// handle to the same connection.
#[derive(Clone)]
pub struct TelemetryLink {
    shared: Arc<LinkShared>,
}

impl TelemetryLink {
    pub fn new(config: LinkConfig) -> Self {
        let max_attempts = config.max_reconnect_attempts;
        Self {
            shared: Arc::new(LinkShared {
                config,
                bus: EventBus::new(),
                session: Mutex::new(SessionState::new(max_attempts)),
                writer: tokio::sync::Mutex::new(None),
                generation: AtomicU64::new(0),
                reconnect_epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&LinkEvent) + Send + Sync + 'static,
    {
        self.shared.bus.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.shared.bus.unsubscribe(id);
    }

    /// Open the transport. No-op success when already connected to `url`;
    /// a second call while an attempt is in flight is refused rather than
    /// opening a second transport.
    pub async fn connect(&self, url: &str) -> Result<(), LinkError> {
        {
            let mut session = self.lock_session();
            match session.phase {
                ConnectionPhase::Connected if session.url.as_deref() == Some(url) => {
                    return Ok(());
                }
                ConnectionPhase::Connecting => return Err(LinkError::ConnectInProgress),
                _ => {}
            }
            session.begin_connect(url);
        }

        match connect_async(url).await {
            Ok((stream, _response)) => {
                let (writer, reader) = stream.split();
                let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
                *self.shared.writer.lock().await = Some(writer);
                self.lock_session().mark_connected();
                tracing::info!(url, "link connected");
                self.shared.bus.emit(&LinkEvent::Connected {
                    url: url.to_string(),
                });

                let shared = self.shared.clone();
                tokio::spawn(read_loop(shared, reader, generation));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(url, error = %err, "link connect failed");
                self.shared.bus.emit(&LinkEvent::Error {
                    message: err.to_string(),
                });
                // A refused endpoint surfaces like an abnormal close so the
                // bounded retry chain applies to it as well.
                handle_close(
                    &self.shared,
                    ABNORMAL_CLOSE_CODE,
                    "connect attempt failed".to_string(),
                );
                Err(LinkError::ConnectFailed {
                    url: url.to_string(),
                    message: err.to_string(),
                })
            }
        }
    }

    /// Close the transport intentionally and cancel any scheduled reconnect.
    /// Idempotent.
    pub async fn disconnect(&self) {
        self.shared.reconnect_epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.generation.fetch_add(1, Ordering::SeqCst);

        let had_transport = {
            let mut session = self.lock_session();
            session.suppress_reconnect();
            let active = session.phase == ConnectionPhase::Connected
                || session.phase == ConnectionPhase::Connecting;
            if active {
                session.mark_closing();
            }
            active
        };

        let mut writer = self.shared.writer.lock().await;
        if let Some(mut sink) = writer.take() {
            let close = Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "intentional disconnect".into(),
            }));
            // Best effort; the peer may already be gone.
            let _ = sink.send(close).await;
            let _ = sink.close().await;
        }
        drop(writer);

        {
            let mut session = self.lock_session();
            session.phase = ConnectionPhase::Disconnected;
        }
        if had_transport {
            tracing::info!("link disconnected");
            self.shared.bus.emit(&LinkEvent::Disconnected {
                code: NORMAL_CLOSE_CODE,
                reason: "intentional disconnect".to_string(),
            });
        }
    }

    /// Transmit a raw text payload. Fails with [`LinkError::NotConnected`]
    /// instead of panicking when no transport is up.
    pub async fn send(&self, payload: &str) -> Result<(), LinkError> {
        if !self.is_connected() {
            tracing::warn!("not connected, payload dropped");
            return Err(LinkError::NotConnected);
        }
        let mut writer = self.shared.writer.lock().await;
        let sink = writer.as_mut().ok_or(LinkError::NotConnected)?;
        sink.send(Message::Text(payload.to_string()))
            .await
            .map_err(|err| LinkError::SendFailed(err.to_string()))
    }

    /// Serialize and transmit a command frame.
    pub async fn send_command(
        &self,
        command: &str,
        params: serde_json::Value,
    ) -> Result<(), LinkError> {
        let payload = frame_codec::encode_command(command, params);
        self.send(&payload).await
    }

    pub fn is_connected(&self) -> bool {
        self.lock_session().phase == ConnectionPhase::Connected
    }

    pub fn state(&self) -> ConnectionPhase {
        self.lock_session().phase
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.lock_session().reconnect_attempts
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.shared.session.lock().expect("session lock poisoned")
    }
}

/// Pump inbound messages until the transport closes, then run the close
/// bookkeeping - unless a newer connection or an intentional disconnect
/// superseded this reader.
async fn read_loop(shared: Arc<LinkShared>, mut reader: WsReader, generation: u64) {
    let (code, reason) = loop {
        match reader.next().await {
            Some(Ok(Message::Text(text))) => emit_data(&shared, &text),
            Some(Ok(Message::Binary(bytes))) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                emit_data(&shared, &text);
            }
            Some(Ok(Message::Close(frame))) => {
                break match frame {
                    Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                    None => (ABNORMAL_CLOSE_CODE, String::new()),
                };
            }
            Some(Ok(_)) => {} // ping/pong handled by the protocol layer
            Some(Err(err)) => {
                tracing::warn!(error = %err, "link transport error");
                shared.bus.emit(&LinkEvent::Error {
                    message: err.to_string(),
                });
                break (ABNORMAL_CLOSE_CODE, "transport error".to_string());
            }
            None => break (ABNORMAL_CLOSE_CODE, "connection lost".to_string()),
        }
    };

    if shared.generation.load(Ordering::SeqCst) != generation {
        return;
    }
    *shared.writer.lock().await = None;
    handle_close(&shared, code, reason);
}

/// Structured decode with raw passthrough: a frame that does not parse as
/// telemetry is still delivered, never dropped.
fn emit_data(shared: &Arc<LinkShared>, payload: &str) {
    let event = match frame_codec::decode_frame(payload) {
        Ok((sample, log_event)) => LinkEvent::Data {
            frame: Frame::Sample(Box::new(sample)),
            log_event,
        },
        Err(err) => {
            tracing::debug!(error = %err, "undecodable frame, passing through raw");
            LinkEvent::Data {
                frame: Frame::Raw(payload.to_string()),
                log_event: None,
            }
        }
    };
    shared.bus.emit(&event);
}

/// Record the close, notify subscribers, and schedule a reconnect when the
/// closure was abnormal and attempts remain.
fn handle_close(shared: &Arc<LinkShared>, code: u16, reason: String) {
    let (disposition, url) = {
        let mut session = shared.session.lock().expect("session lock poisoned");
        (session.record_close(code), session.url.clone())
    };
    tracing::info!(code, reason = %reason, "link closed");
    shared.bus.emit(&LinkEvent::Disconnected { code, reason });

    if let CloseDisposition::Reconnect {
        attempt,
        max_attempts,
    } = disposition
    {
        let Some(url) = url else { return };
        tracing::info!(attempt, max_attempts, "scheduling reconnect");
        shared.bus.emit(&LinkEvent::Reconnecting {
            attempt,
            max_attempts,
        });

        let epoch = shared.reconnect_epoch.load(Ordering::SeqCst);
        let shared = shared.clone();
        tokio::spawn(async move {
            tokio::time::sleep(shared.config.reconnect_delay).await;
            // Check-before-act: an intentional disconnect in the meantime
            // invalidates this schedule.
            if shared.reconnect_epoch.load(Ordering::SeqCst) != epoch {
                return;
            }
            let link = TelemetryLink { shared };
            // Failures surface through error/disconnected events.
            let _ = link.connect(&url).await;
        });
    }
}
