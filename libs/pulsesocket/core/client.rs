//! Realtime client: connection state machine, outbound queue owner, dispatcher
//!
//! # Lifecycle
//!
//! ```text
//!              connect()                   open
//! DISCONNECTED ─────────> CONNECTING ─────────────> CONNECTED
//!      ^  ^                   │                        │
//!      │  │  open failed      │         close / error  │
//!      │  └───────────────────┘<───────────────────────┘
//!      │
//!      └── unclean close with attempts left: a reconnect timer is pending
//!          while the state is DISCONNECTED, firing connect() again
//! ```
//!
//! Every open attempt gets a new epoch. Transport events, timers and
//! reconnects carry the epoch they were started with and are ignored once it
//! is stale, so nothing from an old connection leaks into a new one.
//!
//! # Locking
//!
//! One mutex guards the transport handle, the queue, the statistics and the
//! timers. It is never held while calling user code (route handlers,
//! subscribers, the session source).

use crate::core::config::ClientConfig;
use crate::core::connection_state::{AtomicConnectionState, ConnectionState};
use crate::core::emitter::{EventEmitter, SubscriptionId};
use crate::core::envelope::{Envelope, HeartbeatData, HeartbeatKind, MessageKind, Payload, SessionData};
use crate::core::heartbeat::spawn_ticker;
use crate::core::latency::LatencyTracker;
use crate::core::messages::priority;
use crate::core::queue::{
    BackpressureState, EnqueueOutcome, FlushReport, OutboundQueue, Priority, QueuedMessage,
};
use crate::core::route_table::RouteTable;
use crate::core::stats::ConnectionStats;
use crate::traits::*;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Close code used when a probe went unanswered past the pong timeout
pub const HEARTBEAT_TIMEOUT: u16 = 4000;

const EVENT_CAPACITY: usize = 256;

/// Lifecycle notifications, polled with [`RealtimeClient::try_recv_event`]
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Disconnected { code: u16, was_clean: bool },
    /// A reconnect is scheduled; `attempt` is 1-based
    Reconnecting { attempt: usize, delay: Duration },
    /// Unclean close with no attempts left; only a manual connect() recovers
    ReconnectExhausted { attempts: usize },
    Error(String),
    /// Queue crossed the backpressure threshold (true) or fell below it
    Backpressure(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectEvent {
    pub connected_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectEvent {
    pub code: u16,
    pub reason: String,
    pub was_clean: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub message: String,
}

/// What happened to a message handed to [`RealtimeClient::send_message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the open transport
    Sent,
    /// Buffered until the next flush
    Queued,
    /// Shed under backpressure
    Dropped,
}

impl SendOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, SendOutcome::Dropped)
    }
}

#[derive(Default)]
struct Timers {
    connection: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    flush: Option<JoinHandle<()>>,
}

fn abort(slot: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = slot.take() {
        handle.abort();
    }
}

impl Timers {
    fn stop_connection(&mut self) {
        abort(&mut self.heartbeat);
        abort(&mut self.flush);
        abort(&mut self.connection);
    }

    fn stop_all(&mut self) {
        self.stop_connection();
        abort(&mut self.reconnect);
    }
}

struct Core {
    epoch: u64,
    transport: Option<Arc<dyn Transport>>,
    queue: OutboundQueue,
    stats: ConnectionStats,
    latency: LatencyTracker,
    reconnect_attempts: usize,
    strategy: Box<dyn ReconnectionStrategy>,
    timers: Timers,
    backpressure: bool,
}

impl Core {
    /// Report a change in backpressure since the last call
    fn backpressure_changed(&mut self) -> Option<ClientEvent> {
        let enabled = self.queue.is_backpressured();
        if enabled == self.backpressure {
            return None;
        }
        self.backpressure = enabled;

        if enabled {
            warn!(
                "Backpressure enabled: {} queued (threshold {})",
                self.queue.len(),
                self.queue.limits().backpressure_threshold
            );
        } else {
            info!("Backpressure cleared: {} queued", self.queue.len());
        }
        Some(ClientEvent::Backpressure(enabled))
    }
}

struct Inner {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    sessions: Arc<dyn SessionSource>,
    pong_detector: Arc<dyn PongDetector>,
    routes: RouteTable,
    state: AtomicConnectionState,
    core: Mutex<Core>,
    on_connect: EventEmitter<ConnectEvent>,
    on_disconnect: EventEmitter<DisconnectEvent>,
    on_error: EventEmitter<ErrorEvent>,
    event_tx: Sender<ClientEvent>,
    event_rx: Receiver<ClientEvent>,
}

/// Client side of the realtime connection
///
/// Cheap to clone; all clones drive the same connection. Dropping the last
/// clone tears the connection down the same way [`disconnect`](Self::disconnect)
/// does. Must be used from within a Tokio runtime.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

/// Non-owning handle, see [`RealtimeClient::downgrade`]
#[derive(Clone)]
pub struct WeakClient {
    inner: Weak<Inner>,
}

impl WeakClient {
    pub fn upgrade(&self) -> Option<RealtimeClient> {
        self.inner.upgrade().map(|inner| RealtimeClient { inner })
    }
}

/// Encode and hand off one envelope; returns the frame size
fn transmit(transport: &dyn Transport, envelope: &Envelope) -> Result<u64> {
    let text = envelope.encode()?;
    let bytes = text.len() as u64;
    transport.send(WsMessage::Text(text))?;
    Ok(bytes)
}

impl RealtimeClient {
    pub(crate) fn from_parts(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        clock: Arc<dyn Clock>,
        sessions: Arc<dyn SessionSource>,
        pong_detector: Arc<dyn PongDetector>,
        strategy: Box<dyn ReconnectionStrategy>,
    ) -> Self {
        let (event_tx, event_rx) = bounded(EVENT_CAPACITY);
        let core = Core {
            epoch: 0,
            transport: None,
            queue: OutboundQueue::new(config.queue_limits()),
            stats: ConnectionStats::default(),
            latency: LatencyTracker::new(config.latency_window),
            reconnect_attempts: 0,
            strategy,
            timers: Timers::default(),
            backpressure: false,
        };

        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                clock,
                sessions,
                pong_detector,
                routes: RouteTable::new(),
                state: AtomicConnectionState::new(ConnectionState::Disconnected),
                core: Mutex::new(core),
                on_connect: EventEmitter::new("connect"),
                on_disconnect: EventEmitter::new("disconnect"),
                on_error: EventEmitter::new("error"),
                event_tx,
                event_rx,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakClient {
        WeakClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Open the connection; a no-op while connecting or connected
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Close the connection and discard the queue
    ///
    /// Cancels every timer including a pending reconnect. Never triggers an
    /// automatic reconnect.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Send now if connected, otherwise queue under the backpressure policy
    pub fn send_message(&self, envelope: Envelope, priority: Priority) -> SendOutcome {
        self.inner.send_message(envelope, priority)
    }

    /// Flush the queue if connected
    pub fn flush(&self) -> FlushReport {
        self.inner.flush()
    }

    pub fn add_route(&self, kind: MessageKind, handler: Arc<dyn RouteHandler>, priority: i32) {
        self.inner.routes.add_route(kind, handler, priority);
    }

    pub fn remove_route(&self, kind: MessageKind, handler: &Arc<dyn RouteHandler>) -> bool {
        self.inner.routes.remove_route(kind, handler)
    }

    pub fn on_connect<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ConnectEvent) + Send + Sync + 'static,
    {
        self.inner.on_connect.subscribe(listener)
    }

    pub fn on_disconnect<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DisconnectEvent) + Send + Sync + 'static,
    {
        self.inner.on_disconnect.subscribe(listener)
    }

    pub fn on_error<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        self.inner.on_error.subscribe(listener)
    }

    /// Remove a connect, disconnect or error subscription
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.on_connect.unsubscribe(id)
            || self.inner.on_disconnect.unsubscribe(id)
            || self.inner.on_error.unsubscribe(id)
    }

    /// Copy of the connection statistics
    pub fn stats(&self) -> ConnectionStats {
        self.inner.core.lock().stats.clone()
    }

    pub fn backpressure(&self) -> BackpressureState {
        self.inner.core.lock().queue.state()
    }

    /// Copy of the queued messages in send order
    pub fn queue_snapshot(&self) -> Vec<QueuedMessage> {
        self.inner.core.lock().queue.snapshot()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.core.lock().queue.len()
    }

    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.inner.state.is_connected()
    }

    /// True while a scheduled reconnect has not fired yet
    pub fn is_reconnect_pending(&self) -> bool {
        self.inner
            .core
            .lock()
            .timers
            .reconnect
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn reconnect_attempts(&self) -> usize {
        self.inner.core.lock().reconnect_attempts
    }

    pub fn latency_samples(&self) -> Vec<i64> {
        self.inner.core.lock().latency.samples()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Session id to stamp on outbound envelopes
    pub fn session_id(&self) -> Option<String> {
        self.inner.sessions.current_session_id()
    }

    pub fn now_ms(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.inner.event_rx.try_recv().ok()
    }

    /// Event stream shared by every clone of this client
    ///
    /// The channel is bounded; events are dropped while it is full.
    pub fn events(&self) -> Receiver<ClientEvent> {
        self.inner.event_rx.clone()
    }
}

impl Inner {
    fn emit(&self, event: ClientEvent) {
        if let Err(TrySendError::Full(event)) = self.event_tx.try_send(event) {
            debug!("Event channel full, dropping {:?}", event);
        }
    }

    fn connect(self: &Arc<Self>) {
        let mut core = self.core.lock();
        if self.state.is_active() {
            debug!("connect() ignored, already {:?}", self.state.get());
            return;
        }

        abort(&mut core.timers.reconnect);
        core.epoch += 1;
        let epoch = core.epoch;
        self.state.set(ConnectionState::Connecting);
        info!("Connecting to {}", self.config.url);

        let weak = Arc::downgrade(self);
        let connector = Arc::clone(&self.connector);
        let url = self.config.url.clone();
        abort(&mut core.timers.connection);
        core.timers.connection = Some(tokio::spawn(run_connection(weak, connector, url, epoch)));
    }

    /// Returns false if the open lost a race against close or disconnect
    fn handle_open(self: &Arc<Self>, epoch: u64, transport: Arc<dyn Transport>) -> bool {
        let connected_at = self.clock.now_ms();
        {
            let mut core = self.core.lock();
            if core.epoch != epoch || self.state.get() != ConnectionState::Connecting {
                drop(core);
                debug!("Discarding stale transport from epoch {}", epoch);
                transport.close(NORMAL_CLOSURE, "superseded");
                return false;
            }

            core.transport = Some(transport);
            core.stats.connected_at = Some(connected_at);
            core.reconnect_attempts = 0;
            core.strategy.reset();
            core.latency.reset_outstanding();
            self.state.set(ConnectionState::Connected);
            self.start_timers(&mut core, epoch);
        }

        info!("Connected to {}", self.config.url);
        let report = self.flush();
        if report.sent > 0 {
            info!("Flushed {} queued messages on connect", report.sent);
        }

        self.emit(ClientEvent::Connected);
        self.on_connect.emit(&ConnectEvent { connected_at });
        true
    }

    fn start_timers(self: &Arc<Self>, core: &mut Core, epoch: u64) {
        abort(&mut core.timers.heartbeat);
        abort(&mut core.timers.flush);

        if self.config.heartbeat_interval_ms > 0 {
            let weak = Arc::downgrade(self);
            core.timers.heartbeat = Some(spawn_ticker(
                "Heartbeat",
                Duration::from_millis(self.config.heartbeat_interval_ms),
                move || weak.upgrade().is_some_and(|inner| inner.heartbeat_tick(epoch)),
            ));
        }

        if self.config.flush_interval_ms > 0 {
            let weak = Arc::downgrade(self);
            core.timers.flush = Some(spawn_ticker(
                "Flush",
                Duration::from_millis(self.config.flush_interval_ms),
                move || weak.upgrade().is_some_and(|inner| inner.flush_tick(epoch)),
            ));
        }
    }

    /// Returns false once the connection this event belongs to is gone
    async fn handle_event(self: &Arc<Self>, epoch: u64, event: TransportEvent) -> bool {
        if self.core.lock().epoch != epoch {
            return false;
        }

        match event {
            TransportEvent::Frame(frame) => {
                self.handle_frame(frame).await;
                true
            }
            TransportEvent::Error(message) => {
                self.handle_error(epoch, message);
                true
            }
            TransportEvent::Closed {
                code,
                reason,
                was_clean,
            } => {
                self.handle_close(epoch, code, reason, was_clean);
                false
            }
        }
    }

    async fn handle_frame(&self, frame: WsMessage) {
        let now = self.clock.now_ms();
        {
            let mut core = self.core.lock();
            core.stats.messages_received += 1;
            core.stats.bytes_transferred += frame.len() as u64;
        }

        let envelope = match Envelope::from_frame(&frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping unroutable frame: {}", e);
                return;
            }
        };

        if let Some(ping_id) = self.pong_detector.pong_id(&envelope) {
            let mut core = self.core.lock();
            if let Some(sample) = core.latency.record_pong(ping_id, now) {
                core.stats.latency_ms = core.latency.average();
                debug!("Pong received, rtt {}ms (avg {:.1}ms)", sample, core.stats.latency_ms);
            }
            return;
        }

        self.routes.dispatch(&envelope).await;
    }

    fn handle_error(&self, epoch: u64, message: String) {
        {
            let mut core = self.core.lock();
            if core.epoch != epoch {
                return;
            }
            core.stats.error_count += 1;
        }

        error!("Transport error: {}", message);
        self.emit(ClientEvent::Error(message.clone()));
        self.on_error.emit(&ErrorEvent { message });
    }

    fn handle_close(self: &Arc<Self>, epoch: u64, code: u16, reason: String, was_clean: bool) {
        let follow_up = {
            let mut core = self.core.lock();
            if core.epoch != epoch {
                return;
            }

            core.epoch += 1;
            core.transport = None;
            core.timers.stop_connection();
            core.stats.connected_at = None;
            core.latency.reset_outstanding();
            self.state.set(ConnectionState::Disconnected);

            if was_clean {
                None
            } else {
                Some(self.schedule_reconnect(&mut core))
            }
        };

        if was_clean {
            info!("Connection closed cleanly ({}: {})", code, reason);
        } else {
            warn!("Connection lost ({}: {})", code, reason);
        }

        self.emit(ClientEvent::Disconnected { code, was_clean });
        self.on_disconnect.emit(&DisconnectEvent {
            code,
            reason,
            was_clean,
        });
        if let Some(event) = follow_up {
            self.emit(event);
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, core: &mut Core) -> ClientEvent {
        let attempts = core.reconnect_attempts;
        let Some(delay) = core.strategy.next_delay(attempts) else {
            warn!("Reconnection strategy exhausted after {} attempts, stopping", attempts);
            return ClientEvent::ReconnectExhausted { attempts };
        };

        core.reconnect_attempts += 1;
        core.stats.reconnect_count += 1;
        let attempt = core.reconnect_attempts;
        info!("Reconnecting in {:?} (attempt {})", delay, attempt);

        let token = core.epoch;
        let weak = Arc::downgrade(self);
        abort(&mut core.timers.reconnect);
        core.timers.reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire_reconnect(token);
            }
        }));

        ClientEvent::Reconnecting { attempt, delay }
    }

    fn fire_reconnect(self: &Arc<Self>, token: u64) {
        {
            let mut core = self.core.lock();
            if core.epoch != token || self.state.get() != ConnectionState::Disconnected {
                return;
            }
            // Running inside this handle; drop it without aborting
            core.timers.reconnect = None;
        }
        self.connect();
    }

    fn heartbeat_tick(self: &Arc<Self>, epoch: u64) -> bool {
        let now = self.clock.now_ms();
        let session_id = self.sessions.current_session_id();

        let ping_id = {
            let mut core = self.core.lock();
            if core.epoch != epoch || !self.state.is_connected() {
                return false;
            }

            let timeout = self.config.pong_timeout_window_ms();
            if !core.latency.is_healthy(now, timeout) {
                let transport = core.transport.clone();
                drop(core);

                warn!("No pong within {}ms, closing half-open connection", timeout);
                if let Some(transport) = transport {
                    transport.close(HEARTBEAT_TIMEOUT, "heartbeat timeout");
                }
                self.handle_close(epoch, ABNORMAL_CLOSURE, "heartbeat timeout".into(), false);
                return false;
            }

            core.latency.record_ping(now)
        };

        let envelope = match session_id {
            Some(id) => Envelope::new(id, now, Payload::Session(SessionData::Ping { ping_id })),
            None => Envelope::heartbeat(
                now,
                HeartbeatData {
                    kind: HeartbeatKind::Ping,
                    ping_id: Some(ping_id),
                    server_time: None,
                },
            ),
        };

        debug!("Heartbeat tick - sending ping {}", ping_id);
        self.send_message(envelope, priority::HEARTBEAT);
        true
    }

    fn flush_tick(&self, epoch: u64) -> bool {
        if self.core.lock().epoch != epoch {
            return false;
        }
        self.flush();
        true
    }

    fn send_message(&self, envelope: Envelope, priority: Priority) -> SendOutcome {
        let now = self.clock.now_ms();
        let mut core = self.core.lock();

        if self.state.is_connected() {
            if let Some(transport) = core.transport.clone() {
                match transmit(transport.as_ref(), &envelope) {
                    Ok(bytes) => {
                        core.stats.messages_sent += 1;
                        core.stats.bytes_transferred += bytes;
                        return SendOutcome::Sent;
                    }
                    Err(e) => warn!("Immediate send of '{}' failed, queueing: {}", envelope.kind(), e),
                }
            }
        }

        let outcome = match core.queue.enqueue(envelope, priority, now) {
            EnqueueOutcome::Queued { .. } => SendOutcome::Queued,
            EnqueueOutcome::Rejected => SendOutcome::Dropped,
        };
        let changed = core.backpressure_changed();
        drop(core);

        if let Some(event) = changed {
            self.emit(event);
        }
        outcome
    }

    fn flush(&self) -> FlushReport {
        let now = self.clock.now_ms();
        let mut core = self.core.lock();

        let transport = match (&core.transport, self.state.is_connected()) {
            (Some(transport), true) => Arc::clone(transport),
            _ => return FlushReport::default(),
        };
        if core.queue.is_empty() {
            return FlushReport::default();
        }

        let mut bytes = 0u64;
        let report = core.queue.flush(
            now,
            self.config.message_ttl_ms(),
            self.config.max_send_retries,
            |queued| {
                bytes += transmit(transport.as_ref(), &queued.envelope)?;
                Ok(())
            },
        );

        core.stats.messages_sent += report.sent as u64;
        core.stats.bytes_transferred += bytes;
        debug!(
            "Flush: sent={} expired={} requeued={} dropped={}",
            report.sent, report.expired, report.requeued, report.dropped
        );

        let changed = core.backpressure_changed();
        drop(core);

        if let Some(event) = changed {
            self.emit(event);
        }
        report
    }

    fn disconnect(&self) {
        let (transport, changed) = {
            let mut core = self.core.lock();
            core.epoch += 1;
            core.timers.stop_all();

            let discarded = core.queue.clear();
            if discarded > 0 {
                debug!("Discarded {} queued messages on disconnect", discarded);
            }
            core.reconnect_attempts = 0;
            core.strategy.reset();
            core.stats.connected_at = None;
            core.latency.reset_outstanding();

            let transport = core.transport.take();
            self.state.set(if transport.is_some() {
                ConnectionState::Closing
            } else {
                ConnectionState::Disconnected
            });
            (transport, core.backpressure_changed())
        };

        if let Some(event) = changed {
            self.emit(event);
        }

        let Some(transport) = transport else {
            return;
        };

        info!("Disconnecting from {}", self.config.url);
        transport.close(NORMAL_CLOSURE, "client disconnect");
        self.state.set(ConnectionState::Disconnected);

        let reason = "client disconnect".to_string();
        self.emit(ClientEvent::Disconnected {
            code: NORMAL_CLOSURE,
            was_clean: true,
        });
        self.on_disconnect.emit(&DisconnectEvent {
            code: NORMAL_CLOSURE,
            reason,
            was_clean: true,
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        core.timers.stop_all();
        if let Some(transport) = core.transport.take() {
            debug!("Client dropped, closing transport");
            transport.close(NORMAL_CLOSURE, "client dropped");
        }
    }
}

/// Open one transport and pump its events until it closes
async fn run_connection(
    weak: Weak<Inner>,
    connector: Arc<dyn Connector>,
    url: String,
    epoch: u64,
) {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    match connector.open(&url, events_tx).await {
        Ok(transport) => {
            let Some(inner) = weak.upgrade() else {
                transport.close(NORMAL_CLOSURE, "client dropped");
                return;
            };
            if !inner.handle_open(epoch, transport) {
                return;
            }
        }
        Err(e) => {
            if let Some(inner) = weak.upgrade() {
                let message = format!("Failed to connect: {}", e);
                inner.handle_error(epoch, message.clone());
                inner.handle_close(epoch, ABNORMAL_CLOSURE, message, false);
            }
            return;
        }
    }

    while let Some(event) = events_rx.recv().await {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if !inner.handle_event(epoch, event).await {
            return;
        }
    }

    // Transport dropped its sender without reporting a close
    if let Some(inner) = weak.upgrade() {
        inner.handle_close(epoch, ABNORMAL_CLOSURE, "event stream ended".into(), false);
    }
}
