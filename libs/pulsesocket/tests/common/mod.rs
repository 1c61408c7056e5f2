//! Common test utilities for pulsesocket integration tests
//!
//! - [`MockWsServer`]: real WebSocket server that answers probes and echoes
//!   everything else
//! - [`ScriptedConnector`]: in-memory transport whose opens, sends and closes
//!   are driven by the test

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pulsesocket::*;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Let spawned tasks run; with a paused clock this also fires due timers
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Clock following Tokio time, so paused-clock tests see timers and
/// timestamps advance together
pub struct TokioClock {
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start: tokio::time::Instant::now(),
        })
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> i64 {
        self.start.elapsed().as_millis() as i64
    }
}

/// A mock WebSocket server speaking the envelope protocol
///
/// Pings (`session/ping` and `heartbeat{kind: ping}`) get the matching pong;
/// every other text frame is echoed back unchanged.
pub struct MockWsServer {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    shutdown: Arc<Notify>,
}

fn pong_for(frame: &str) -> Option<String> {
    let value: Value = serde_json::from_str(frame).ok()?;
    let data = value.get("data")?;
    let ping_id = data.get("ping_id").cloned().unwrap_or(Value::Null);

    let reply = match value.get("type")?.as_str()? {
        "session" if data.get("action")?.as_str()? == "ping" => json!({
            "type": "session",
            "session_id": value.get("session_id").cloned().unwrap_or(Value::Null),
            "data": {"action": "pong", "ping_id": ping_id},
        }),
        "heartbeat" if data.get("kind")?.as_str()? == "ping" => json!({
            "type": "heartbeat",
            "data": {"kind": "pong", "ping_id": ping_id},
        }),
        _ => return None,
    };
    Some(reply.to_string())
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(Notify::new());

        let received_clone = Arc::clone(&received);
        let shutdown_clone = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let received = Arc::clone(&received_clone);
                                let shutdown = Arc::clone(&shutdown_clone);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, received, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            received,
            shutdown,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        received: Arc<Mutex<Vec<String>>>,
        shutdown: Arc<Notify>,
    ) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;
        use tokio_tungstenite::tungstenite::Message;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            received.lock().push(text.clone());
                            let reply = pong_for(&text).unwrap_or(text);
                            if write.send(Message::Text(reply)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => break,
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Text frames received so far, across all connections
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One transport handed out by [`ScriptedConnector`]
pub struct MockTransport {
    sent: Mutex<Vec<String>>,
    fail_sends: AtomicBool,
    closed_with: Mutex<Option<u16>>,
    events: TransportEvents,
}

impl MockTransport {
    /// Decoded envelopes in the order they were handed over
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent
            .lock()
            .iter()
            .map(|text| Envelope::decode(text).unwrap())
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn closed_with(&self) -> Option<u16> {
        *self.closed_with.lock()
    }

    /// Deliver an inbound frame as if the server sent it
    pub fn push_frame(&self, text: impl Into<String>) {
        let _ = self
            .events
            .send(TransportEvent::Frame(WsMessage::Text(text.into())));
    }

    pub fn push_error(&self, message: &str) {
        let _ = self.events.send(TransportEvent::Error(message.to_string()));
    }

    /// Report a close as if the server or network ended the connection
    pub fn drop_connection(&self, code: u16, was_clean: bool) {
        let _ = self.events.send(TransportEvent::Closed {
            code,
            reason: "scripted".into(),
            was_clean,
        });
    }
}

impl Transport for MockTransport {
    fn send(&self, frame: WsMessage) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PulseError::WebSocket("injected send failure".into()));
        }
        match frame {
            WsMessage::Text(text) => self.sent.lock().push(text),
            WsMessage::Binary(_) => return Err(PulseError::Other("binary frame".into())),
        }
        Ok(())
    }

    fn close(&self, code: u16, _reason: &str) {
        *self.closed_with.lock() = Some(code);
    }
}

/// In-memory connector driven by the test
#[derive(Default)]
pub struct ScriptedConnector {
    transports: Mutex<Vec<Arc<MockTransport>>>,
    failures: Mutex<VecDeque<String>>,
    attempts: Mutex<usize>,
    open_delay: Mutex<Option<Duration>>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `count` opens fail as refused connections
    pub fn fail_next_opens(&self, count: usize) {
        let mut failures = self.failures.lock();
        for _ in 0..count {
            failures.push_back("connection refused".into());
        }
    }

    /// Hold every open for `delay` before completing it
    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock() = Some(delay);
    }

    /// Opens attempted, failed ones included
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }

    /// Transports successfully opened
    pub fn opened(&self) -> usize {
        self.transports.lock().len()
    }

    pub fn last(&self) -> Arc<MockTransport> {
        Arc::clone(self.transports.lock().last().expect("no transport opened"))
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, _url: &str, events: TransportEvents) -> Result<Arc<dyn Transport>> {
        *self.attempts.lock() += 1;

        let delay = *self.open_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failures.lock().pop_front();
        if let Some(reason) = failure {
            return Err(PulseError::WebSocket(reason));
        }

        let transport = Arc::new(MockTransport {
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            closed_with: Mutex::new(None),
            events,
        });
        self.transports.lock().push(Arc::clone(&transport));
        Ok(transport)
    }
}

/// Builder wired to a scripted connector, heartbeat off
pub fn scripted_client(
    connector: &Arc<ScriptedConnector>,
) -> RealtimeClientBuilder<states::HasUrl> {
    RealtimeClient::builder()
        .url("ws://scripted.test/ws")
        .connector(Arc::clone(connector) as Arc<dyn Connector>)
        .session_source(Arc::new(StaticSession::new("session-1")))
        .heartbeat(Duration::ZERO)
}

pub fn typing(label: &str) -> Envelope {
    Envelope::new(
        "session-1",
        0,
        Payload::Typing(TypingData {
            keystroke: label.to_string(),
            duration: 80.0,
            interval: 120.0,
            is_backspace: false,
        }),
    )
}

/// Keystroke labels of the typing envelopes in `sent`
pub fn keystrokes(sent: &[Envelope]) -> Vec<String> {
    sent.iter()
        .filter_map(|envelope| match envelope.payload() {
            Payload::Typing(data) => Some(data.keystroke.clone()),
            _ => None,
        })
        .collect()
}

/// Drain the polled event stream
pub fn drain_events(client: &RealtimeClient) -> Vec<ClientEvent> {
    std::iter::from_fn(|| client.try_recv_event()).collect()
}
