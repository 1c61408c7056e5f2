//! WebSocket transport over tokio-tungstenite
//!
//! ```text
//!                 ┌──────────────┐
//! Transport::send │ unbounded tx │──> writer task ──> SplitSink ──> socket
//!                 └──────────────┘
//! socket ──> SplitStream ──> reader task ──> TransportEvents (Frame/Error/Closed)
//! ```
//!
//! A close frame with code 1000 is a clean close. Any other code, a stream
//! error, or EOF without a close frame is unclean.

use crate::error::{PulseError, Result};
use crate::traits::{
    Connector, HeaderProvider, Transport, TransportEvent, TransportEvents, WsMessage,
    ABNORMAL_CLOSURE, NORMAL_CLOSURE,
};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Close frame received without a status code
const NO_STATUS_RECEIVED: u16 = 1005;

/// Opens real WebSocket connections
#[derive(Default)]
pub struct TungsteniteConnector {
    headers: Option<Arc<dyn HeaderProvider>>,
}

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send the provider's headers with every handshake
    pub fn with_headers(headers: Arc<dyn HeaderProvider>) -> Self {
        Self {
            headers: Some(headers),
        }
    }
}

struct TungsteniteTransport {
    outbound: UnboundedSender<Message>,
    open: Arc<AtomicBool>,
}

impl Transport for TungsteniteTransport {
    fn send(&self, frame: WsMessage) -> Result<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(PulseError::NotOpen);
        }
        let message = match frame {
            WsMessage::Text(text) => Message::Text(text),
            WsMessage::Binary(data) => Message::Binary(data),
        };
        self.outbound.send(message).map_err(|_| PulseError::NotOpen)
    }

    fn close(&self, code: u16, reason: &str) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_string()),
        };
        let _ = self.outbound.send(Message::Close(Some(frame)));
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn open(&self, url: &str, events: TransportEvents) -> Result<Arc<dyn Transport>> {
        let mut request = url
            .into_client_request()
            .map_err(|e| PulseError::WebSocket(format!("Invalid url '{}': {}", url, e)))?;

        if let Some(ref provider) = self.headers {
            for (key, value) in provider.get_headers().await {
                match (
                    key.parse::<http::header::HeaderName>(),
                    value.parse::<http::header::HeaderValue>(),
                ) {
                    (Ok(name), Ok(value)) => {
                        request.headers_mut().insert(name, value);
                    }
                    (Err(_), _) => warn!("Invalid header name: {}", key),
                    (_, Err(_)) => warn!("Invalid header value for key '{}'", key),
                }
            }
            debug!("Connecting with custom headers");
        }

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| PulseError::WebSocket(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let open = Arc::new(AtomicBool::new(true));

        let writer_open = Arc::clone(&open);
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = write.send(message).await {
                    debug!("WebSocket write failed: {}", e);
                    writer_open.store(false, Ordering::Release);
                    break;
                }
                if closing {
                    break;
                }
            }
            debug!("Writer task exiting");
        });

        let reader_open = Arc::clone(&open);
        tokio::spawn(async move {
            let closed = loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let _ = events.send(TransportEvent::Frame(WsMessage::Text(text)));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let _ = events.send(TransportEvent::Frame(WsMessage::Binary(data)));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.into_owned()))
                            .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                        break TransportEvent::Closed {
                            code,
                            reason,
                            was_clean: code == NORMAL_CLOSURE,
                        };
                    }
                    // Control frames are answered by tungstenite itself
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break TransportEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: e.to_string(),
                            was_clean: false,
                        };
                    }
                    None => {
                        break TransportEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: "stream ended".into(),
                            was_clean: false,
                        };
                    }
                }
            };

            reader_open.store(false, Ordering::Release);
            let _ = events.send(closed);
            debug!("Reader task exiting");
        });

        Ok(Arc::new(TungsteniteTransport { outbound, open }))
    }
}
