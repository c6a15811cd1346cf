//! Connection lifecycle: one transport, many logical streams.
//!
//! Features:
//! - Requests submitted before the transport is open are queued and flushed
//!   in submission order on the next ready transition
//! - Fixed-delay reconnect, retried indefinitely
//! - Active stream subscriptions are replayed once on every reconnect
//! - Callback registrations outlive any single transport

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use strum::Display;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::codec::{self, Method, Request};
use super::registry::{Callback, SubscriptionRegistry};
use super::subscription::StreamSubscription;
use super::transport::{Connector, TransportEvent, TransportLink};
use crate::config::Config;
use crate::error::{MirrorError, TransportError};
use crate::metrics;

/// Connection timing configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Delay between a transport closing and the next connect attempt.
    pub reconnect_delay: Duration,
    /// Period of the safety-net SUBSCRIBE re-send per subscription.
    pub resubscribe_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(100),
            resubscribe_interval: Duration::from_secs(5),
        }
    }
}

impl ConnectionConfig {
    /// Create from application config values.
    pub fn from_config(config: &Config) -> Self {
        Self {
            reconnect_delay: config.reconnect_delay(),
            resubscribe_interval: config.resubscribe_interval(),
        }
    }
}

/// Transport lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    /// A transport is being established.
    Connecting,
    /// The transport accepts writes.
    Open,
    /// The transport is gone; a new one will be built after the delay.
    Closed,
}

/// Outbound side of the manager. Guarded by one lock so that id assignment,
/// buffering and flushing are totally ordered.
#[derive(Debug)]
struct Outbox {
    state: ConnectionState,
    next_id: u64,
    pending: VecDeque<Request>,
    sink: Option<mpsc::UnboundedSender<String>>,
    /// Streams with an outstanding SUBSCRIBE, ordered for deterministic replay.
    active: BTreeSet<String>,
}

impl Outbox {
    fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            next_id: 1,
            pending: VecDeque::new(),
            sink: None,
            active: BTreeSet::new(),
        }
    }

    fn stamp(&mut self, request: Request) -> Request {
        let id = self.next_id;
        self.next_id += 1;
        request.with_id(id)
    }

    fn track(&mut self, request: &Request) {
        for stream in &request.params {
            match request.method {
                Method::Subscribe => {
                    self.active.insert(stream.clone());
                }
                Method::Unsubscribe => {
                    self.active.remove(stream);
                }
            }
        }
    }
}

fn transmit(sink: &mpsc::UnboundedSender<String>, request: &Request) -> Result<(), TransportError> {
    let text = codec::encode(request).map_err(|e| TransportError::SendFailed(e.to_string()))?;
    sink.send(text)
        .map_err(|_| TransportError::SendFailed("transport closed".to_string()))?;
    metrics::inc_ws_requests_sent();
    Ok(())
}

/// Owns the streaming transport and the subscription registry.
///
/// Construct one per process (or per test) and share it as
/// `Arc<ConnectionManager>`; call [`start`](Self::start) to begin connecting
/// and [`shutdown`](Self::shutdown) to stop.
pub struct ConnectionManager {
    config: ConnectionConfig,
    outbox: Mutex<Outbox>,
    registry: SubscriptionRegistry,
    connections: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("registry", &self.registry)
            .finish()
    }
}

impl ConnectionManager {
    /// Create a manager with default timing.
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig::default())
    }

    /// Create a manager with custom timing.
    pub fn with_config(config: ConnectionConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            outbox: Mutex::new(Outbox::new()),
            registry: SubscriptionRegistry::new(),
            connections: AtomicU64::new(0),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.outbox.lock().state
    }

    /// Whether the transport is open.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Requests waiting for the transport.
    pub fn pending_len(&self) -> usize {
        self.outbox.lock().pending.len()
    }

    /// Streams with an outstanding SUBSCRIBE.
    pub fn active_streams(&self) -> Vec<String> {
        self.outbox.lock().active.iter().cloned().collect()
    }

    /// Number of transports that reached the ready state.
    pub fn connection_count(&self) -> u64 {
        self.connections.load(Ordering::SeqCst)
    }

    /// Timing configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Listener registry (read-only access for observers).
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Submit a request. Returns the id stamped on it.
    ///
    /// Written immediately when the transport is open, otherwise queued for
    /// the next ready transition. Never blocks and never drops the request.
    pub fn send_message(&self, request: Request) -> u64 {
        let mut outbox = self.outbox.lock();
        let request = outbox.stamp(request);
        let id = request.id.unwrap_or_default();
        outbox.track(&request);

        if outbox.state == ConnectionState::Open {
            if let Some(sink) = &outbox.sink {
                match transmit(sink, &request) {
                    Ok(()) => {
                        debug!(id, method = %request.method, params = ?request.params, "Request sent");
                        return id;
                    }
                    Err(e) => warn!(error = %e, id, "Send failed, buffering request"),
                }
            }
        }

        debug!(id, method = %request.method, params = ?request.params, "Request buffered");
        outbox.pending.push_back(request);
        metrics::inc_ws_requests_buffered();
        id
    }

    /// Add `callback` for `stream` under `identity`. Does not send SUBSCRIBE.
    pub fn register_callback(&self, stream: &str, identity: &str, callback: Callback) {
        self.registry.register(stream, identity, callback);
    }

    /// Remove the callback registered under `identity`; no-op if absent.
    pub fn deregister_callback(&self, stream: &str, identity: &str) {
        self.registry.deregister(stream, identity);
    }

    /// Register a callback, SUBSCRIBE, and keep the subscription alive until
    /// the returned guard is released.
    pub fn subscribe(
        self: &Arc<Self>,
        stream: impl Into<String>,
        identity: impl Into<String>,
        callback: Callback,
    ) -> StreamSubscription {
        StreamSubscription::open(self, stream.into(), identity.into(), callback)
    }

    /// Transport-ready transition: flush the queue in order, then replay
    /// SUBSCRIBE for active streams the flushed batch did not already cover.
    fn on_ready(&self, sink: mpsc::UnboundedSender<String>) {
        let mut outbox = self.outbox.lock();
        let mut covered: HashSet<String> = HashSet::new();
        let mut flushed = 0usize;

        while let Some(request) = outbox.pending.pop_front() {
            if let Err(e) = transmit(&sink, &request) {
                warn!(error = %e, "Transport failed during flush");
                outbox.pending.push_front(request);
                return;
            }
            if request.method == Method::Subscribe {
                covered.extend(request.params.iter().cloned());
            }
            flushed += 1;
        }

        let replay: Vec<String> = outbox
            .active
            .iter()
            .filter(|stream| !covered.contains(*stream))
            .cloned()
            .collect();

        for stream in &replay {
            let request = outbox.stamp(Request::subscribe(stream.clone()));
            if let Err(e) = transmit(&sink, &request) {
                warn!(error = %e, stream = %stream, "Transport failed during replay");
                return;
            }
        }

        outbox.state = ConnectionState::Open;
        outbox.sink = Some(sink);
        info!(flushed, replayed = replay.len(), "Transport open");
    }

    /// Transport-closed transition.
    fn on_closed(&self) {
        let mut outbox = self.outbox.lock();
        outbox.state = ConnectionState::Closed;
        outbox.sink = None;
    }

    fn on_connecting(&self) {
        self.outbox.lock().state = ConnectionState::Connecting;
    }

    /// Decode one inbound frame and hand it to the registered callbacks.
    ///
    /// Returns how many callbacks ran.
    pub fn process_frame(&self, text: &str) -> Result<usize, MirrorError> {
        let inbound = match codec::decode(text)? {
            Some(inbound) => inbound,
            None => return Ok(0),
        };
        Ok(self.registry.dispatch(&inbound.stream, &inbound.event)?)
    }

    /// Per-frame error boundary: nothing here escapes to the read loop.
    fn handle_frame(&self, text: &str) {
        metrics::inc_ws_frames_received();
        let _timer = metrics::timer_ws_dispatch();

        match self.process_frame(text) {
            Ok(0) => {
                debug!("Ignoring frame with unrecognised event");
                metrics::inc_ws_messages_dropped("unknown_event");
            }
            Ok(delivered) => debug!(delivered, "Frame dispatched"),
            Err(MirrorError::UnknownStream(e)) => {
                debug!(stream = %e.stream, "Dropping message for unregistered stream");
                metrics::inc_ws_messages_dropped("unknown_stream");
            }
            Err(e) => {
                warn!(error = %e, "Failed to decode frame");
                metrics::inc_ws_decode_errors();
            }
        }
    }

    /// Spawn the lifecycle task. Calling it again while running is a no-op.
    pub fn start<C: Connector>(self: &Arc<Self>, connector: C) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            warn!("Connection manager already running");
            return;
        }

        self.shutdown_tx.send_replace(false);
        let manager = Arc::clone(self);
        *task = Some(tokio::spawn(async move { manager.run(connector).await }));
    }

    /// Stop the lifecycle task and drop the transport.
    ///
    /// Registrations and queued requests survive; a later
    /// [`start`](Self::start) picks them up again.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Connection task ended abnormally");
            }
        }
        self.on_closed();
        info!("Connection manager stopped");
    }

    async fn run<C: Connector>(self: Arc<Self>, connector: C) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut attempt = 0u64;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            self.on_connecting();
            info!(attempt, "Attempting transport connection");

            let connected = tokio::select! {
                result = connector.connect() => result,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok(TransportLink {
                    outbound,
                    mut inbound,
                }) => {
                    attempt = 0;
                    self.connections.fetch_add(1, Ordering::SeqCst);
                    self.on_ready(outbound);

                    let closed = loop {
                        tokio::select! {
                            event = inbound.recv() => match event {
                                Some(TransportEvent::Frame(text)) => self.handle_frame(&text),
                                Some(TransportEvent::Closed { code, reason }) => {
                                    break TransportError::ConnectionClosed { code, reason };
                                }
                                None => {
                                    break TransportError::ConnectionClosed {
                                        code: None,
                                        reason: "transport dropped".to_string(),
                                    };
                                }
                            },
                            _ = shutdown.changed() => {
                                self.on_closed();
                                return;
                            }
                        }
                    };

                    warn!(error = %closed, "Transport closed, will reconnect");
                }
                Err(e) => {
                    error!(error = %e, attempt, "Transport connection failed");
                }
            }

            self.on_closed();
            attempt = attempt.saturating_add(1);
            metrics::inc_ws_reconnects();

            info!(
                delay_ms = self.config.reconnect_delay.as_millis() as u64,
                "Reconnecting after delay"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.on_closed();
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
