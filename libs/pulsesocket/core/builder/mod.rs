pub mod states;

use crate::core::client::RealtimeClient;
use crate::core::config::ClientConfig;
use crate::core::websocket::TungsteniteConnector;
use crate::traits::*;
use states::*;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for [`RealtimeClient`]
///
/// The endpoint is required, either through [`url`](Self::url) or a complete
/// [`ClientConfig`](Self::config). Everything else has a default:
///
/// | seam | default |
/// |---|---|
/// | connector | [`TungsteniteConnector`] |
/// | clock | [`SystemClock`] |
/// | session source | no session (bare heartbeats, helpers fail) |
/// | pong detector | [`EnvelopePongDetector`] |
/// | reconnect strategy | exponential backoff from the config |
pub struct RealtimeClientBuilder<U: UrlState> {
    _state: PhantomData<U>,
    config: ClientConfig,
    connector: Option<Arc<dyn Connector>>,
    headers: Option<Arc<dyn HeaderProvider>>,
    clock: Option<Arc<dyn Clock>>,
    sessions: Option<Arc<dyn SessionSource>>,
    pong_detector: Option<Arc<dyn PongDetector>>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
}

impl RealtimeClientBuilder<NoUrl> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: PhantomData,
            config: ClientConfig::default(),
            connector: None,
            headers: None,
            clock: None,
            sessions: None,
            pong_detector: None,
            reconnect_strategy: None,
        }
    }

    pub fn url(self, url: impl Into<String>) -> RealtimeClientBuilder<HasUrl> {
        let config = ClientConfig {
            url: url.into(),
            ..self.config
        };
        self.with_config(config)
    }

    /// Start from a full configuration, typically loaded from a file
    pub fn config(self, config: ClientConfig) -> RealtimeClientBuilder<HasUrl> {
        self.with_config(config)
    }

    fn with_config(self, config: ClientConfig) -> RealtimeClientBuilder<HasUrl> {
        RealtimeClientBuilder {
            _state: PhantomData,
            config,
            connector: self.connector,
            headers: self.headers,
            clock: self.clock,
            sessions: self.sessions,
            pong_detector: self.pong_detector,
            reconnect_strategy: self.reconnect_strategy,
        }
    }
}

impl Default for RealtimeClientBuilder<NoUrl> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: UrlState> RealtimeClientBuilder<U> {
    /// Replace the WebSocket transport, e.g. with an in-memory one in tests
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Handshake headers for the default connector
    pub fn headers(mut self, provider: impl HeaderProvider + 'static) -> Self {
        self.headers = Some(Arc::new(provider));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Where outbound envelopes get their `session_id` from
    pub fn session_source(mut self, sessions: Arc<dyn SessionSource>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn pong_detector(mut self, detector: Arc<dyn PongDetector>) -> Self {
        self.pong_detector = Some(detector);
        self
    }

    /// Override the backoff derived from the config
    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Probe cadence; `Duration::ZERO` disables the heartbeat
    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Unanswered probes older than this force a reconnect
    ///
    /// Recommended value: 3x the heartbeat interval.
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.config.pong_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn reconnect(mut self, base_interval: Duration, max_attempts: usize) -> Self {
        self.config.reconnect_interval_ms = base_interval.as_millis() as u64;
        self.config.max_reconnect_attempts = max_attempts;
        self
    }

    pub fn queue(mut self, max_size: usize, backpressure_threshold: usize) -> Self {
        self.config.max_queue_size = max_size;
        self.config.backpressure_threshold = backpressure_threshold;
        self
    }

    pub fn message_timeout(mut self, timeout: Duration) -> Self {
        self.config.message_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Flush the queue periodically while connected
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval_ms = interval.as_millis() as u64;
        self
    }
}

impl RealtimeClientBuilder<HasUrl> {
    /// Validate the configuration and create the client
    ///
    /// The client starts disconnected; call
    /// [`connect`](RealtimeClient::connect) to open it.
    pub fn build(self) -> Result<RealtimeClient> {
        self.config.validate()?;

        let connector = match self.connector {
            Some(connector) => connector,
            None => Arc::new(match self.headers {
                Some(headers) => TungsteniteConnector::with_headers(headers),
                None => TungsteniteConnector::new(),
            }),
        };
        let strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| self.config.backoff());

        Ok(RealtimeClient::from_parts(
            self.config,
            connector,
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            self.sessions
                .unwrap_or_else(|| Arc::new(StaticSession::default())),
            self.pong_detector
                .unwrap_or_else(|| Arc::new(EnvelopePongDetector)),
            strategy,
        ))
    }
}

impl RealtimeClient {
    pub fn builder() -> RealtimeClientBuilder<NoUrl> {
        RealtimeClientBuilder::new()
    }
}
