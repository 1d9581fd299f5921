//! Engine WebSocket client
//!
//! One `EngineClient` owns at most one live connection to the trading engine.
//! A supervisor task, spawned by [`EngineClient::connect`], owns the socket
//! and every timer tied to it:
//!
//! - the heartbeat interval that sends `{"type":"ping"}`
//! - the liveness deadline, pushed back on every `{"type":"pong"}`
//! - the reconnect backoff sleep between attempts
//!
//! Stopping the supervisor drops all of them at once. A generation counter
//! guards state publication so a supervisor that outlives
//! [`EngineClient::disconnect`] can never overwrite the state of a newer one.
//!
//! Outbound commands go through a single lock. While connected they are
//! handed to the supervisor; otherwise they wait in a bounded drop-oldest
//! queue that the next successful connection flushes, oldest first, before
//! any new command is accepted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::application::actors::reconnect_policy::ReconnectPolicy;
use crate::config::EngineConfig;
use crate::domain::commands::EngineCommand;
use crate::domain::errors::TransportError;
use crate::domain::events::{decode_frame, ControlFrame, InboundFrame};
use crate::domain::repositories::{CommandSink, EventSink};
use crate::domain::services::BoundedBuffer;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle of the engine link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Reconnection progress
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectionEvent {
    Scheduled { attempt: u32, delay: Duration },
    Connected { attempt: u32 },
    MaxRetriesExceeded { total_attempts: u32 },
}

/// Connection state changes
#[derive(Clone)]
pub struct StateStream {
    sender: broadcast::Sender<ConnectionState>,
}

impl StateStream {
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionState> {
        self.sender.subscribe()
    }
}

/// Transport failures: open errors, drops, undecodable frames
#[derive(Clone)]
pub struct ErrorStream {
    sender: broadcast::Sender<TransportError>,
}

impl ErrorStream {
    pub fn subscribe(&self) -> broadcast::Receiver<TransportError> {
        self.sender.subscribe()
    }
}

#[derive(Clone)]
pub struct ReconnectionStream {
    sender: broadcast::Sender<ReconnectionEvent>,
}

impl ReconnectionStream {
    pub fn subscribe(&self) -> broadcast::Receiver<ReconnectionEvent> {
        self.sender.subscribe()
    }
}

/// A serialized command and the ticket its sender waits on
struct Queued {
    ticket: u64,
    payload: String,
}

struct Outbound {
    /// Present only while a connection is open and the queue is flushed
    writer: Option<mpsc::UnboundedSender<Queued>>,
    queue: BoundedBuffer<Queued>,
    next_ticket: u64,
    /// Tickets whose senders are still inside `send`
    waiting: HashSet<u64>,
    /// Waiting tickets dropped from a full queue
    evicted: HashSet<u64>,
}

impl Outbound {
    fn ticket(&mut self, payload: String) -> Queued {
        self.next_ticket += 1;
        Queued {
            ticket: self.next_ticket,
            payload,
        }
    }

    fn enqueue(&mut self, item: Queued) {
        if let Some(dropped) = self.queue.push(item) {
            warn!(
                "Outbound queue full ({} commands), dropped oldest",
                self.queue.capacity()
            );
            self.dropped(dropped);
        }
    }

    /// Put back a command that was taken for sending but never written
    fn requeue_front(&mut self, item: Queued) {
        if let Some(dropped) = self.queue.push_front(item) {
            warn!("Outbound queue full, dropped unsent command");
            self.dropped(dropped);
        }
    }

    fn dropped(&mut self, item: Queued) {
        if self.waiting.contains(&item.ticket) {
            self.evicted.insert(item.ticket);
        }
    }
}

struct Supervisor {
    handle: JoinHandle<()>,
    shutdown: broadcast::Sender<()>,
}

enum SessionEnd {
    Shutdown,
    ClosedByServer,
    Dropped(String),
    LivenessTimeout,
}

struct Inner {
    config: EngineConfig,
    url: Url,
    policy: ReconnectPolicy,
    sink: Arc<dyn EventSink>,
    outbound: Mutex<Outbound>,
    state: watch::Sender<ConnectionState>,
    state_events: broadcast::Sender<ConnectionState>,
    errors: broadcast::Sender<TransportError>,
    reconnections: broadcast::Sender<ReconnectionEvent>,
    generation: AtomicU64,
    supervisor: Mutex<Option<Supervisor>>,
    retries_exhausted: AtomicBool,
    last_pong: RwLock<Option<DateTime<Utc>>>,
    connection_id: RwLock<Option<String>>,
}

#[derive(Clone)]
pub struct EngineClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineClient")
            .field("url", &self.inner.url.as_str())
            .field("state", &self.state())
            .finish()
    }
}

impl EngineClient {
    pub fn new(config: EngineConfig, sink: Arc<dyn EventSink>) -> Result<Self, TransportError> {
        let url = Url::parse(&config.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", config.url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidUrl(format!(
                "{}: scheme must be ws or wss",
                config.url
            )));
        }

        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (state_events, _) = broadcast::channel(64);
        let (errors, _) = broadcast::channel(256);
        let (reconnections, _) = broadcast::channel(64);

        Ok(Self {
            inner: Arc::new(Inner {
                policy: ReconnectPolicy::from_config(&config),
                outbound: Mutex::new(Outbound {
                    writer: None,
                    next_ticket: 0,
                    waiting: HashSet::new(),
                    evicted: HashSet::new(),
                    queue: BoundedBuffer::new(config.queue_capacity.max(1)),
                }),
                config,
                url,
                sink,
                state,
                state_events,
                errors,
                reconnections,
                generation: AtomicU64::new(0),
                supervisor: Mutex::new(None),
                retries_exhausted: AtomicBool::new(false),
                last_pong: RwLock::new(None),
                connection_id: RwLock::new(None),
            }),
        })
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Start the supervisor. No-op while one is already connecting,
    /// connected or retrying; resumes from the terminal `error` state.
    pub async fn connect(&self) {
        let mut slot = self.inner.supervisor.lock().await;
        if let Some(existing) = slot.as_ref() {
            let exhausted = self.inner.retries_exhausted.load(Ordering::SeqCst);
            if !existing.handle.is_finished() && !exhausted {
                debug!("Already connecting or connected");
                return;
            }
        }

        self.inner.retries_exhausted.store(false, Ordering::SeqCst);
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .publish_state(generation, ConnectionState::Connecting);

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.supervise(generation, shutdown_rx).await });
        *slot = Some(Supervisor { handle, shutdown });
    }

    /// Close with code 1000 and stop every timer. Idempotent.
    pub async fn disconnect(&self) {
        let supervisor = self.inner.supervisor.lock().await.take();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(Supervisor {
            mut handle,
            shutdown,
        }) = supervisor
        {
            let _ = shutdown.send(());
            if timeout(self.inner.config.disconnect_timeout, &mut handle)
                .await
                .is_err()
            {
                warn!("Engine supervisor did not stop in time, aborting");
                handle.abort();
            }
        }

        self.inner.outbound.lock().await.writer = None;
        *self.inner.connection_id.write().await = None;
        self.inner.force_state(ConnectionState::Disconnected);
    }

    /// Serialize and deliver a command.
    ///
    /// While disconnected the command is queued and the call waits up to the
    /// send timeout for a connection; on timeout it fails with
    /// [`TransportError::NotConnected`] but the command stays queued. If the
    /// queue overflows while the caller waits and drops this command, the
    /// call fails with [`TransportError::CommandEvicted`].
    pub async fn send(&self, command: &EngineCommand) -> Result<(), TransportError> {
        let payload = command.to_json()?;
        debug!("Sending {} command", command.action());
        self.deliver(payload).await
    }

    async fn deliver(&self, payload: String) -> Result<(), TransportError> {
        let mut connected = self.inner.state.subscribe();

        let ticket = {
            let mut outbound = self.inner.outbound.lock().await;
            let item = outbound.ticket(payload);
            let rejected = match outbound.writer.as_ref() {
                Some(writer) => writer.send(item).map_err(|e| e.0),
                None => Err(item),
            };
            match rejected {
                Ok(()) => return Ok(()),
                Err(item) => {
                    outbound.writer = None;
                    info!(
                        "WebSocket not connected, queuing command ({} queued)",
                        outbound.queue.len() + 1
                    );
                    let ticket = item.ticket;
                    outbound.waiting.insert(ticket);
                    outbound.enqueue(item);
                    ticket
                }
            }
        };

        let outcome = timeout(
            self.inner.config.send_timeout,
            connected.wait_for(|s| *s == ConnectionState::Connected),
        )
        .await
        .map(|r| r.is_ok());

        let evicted = {
            let mut outbound = self.inner.outbound.lock().await;
            outbound.waiting.remove(&ticket);
            outbound.evicted.remove(&ticket)
        };
        if evicted {
            warn!("Queued command was dropped before a connection opened");
            return Err(TransportError::CommandEvicted);
        }

        match outcome {
            Ok(true) => Ok(()),
            _ => {
                warn!(
                    "No connection after {:?}, command left in queue",
                    self.inner.config.send_timeout
                );
                Err(TransportError::NotConnected { queued: true })
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Wait until the link reaches `target`; false on timeout
    pub async fn wait_for_state(&self, target: ConnectionState, within: Duration) -> bool {
        let mut rx = self.inner.state.subscribe();
        let reached = timeout(within, rx.wait_for(|s| *s == target))
            .await
            .map(|r| r.is_ok());
        reached.unwrap_or(false)
    }

    pub fn state_stream(&self) -> StateStream {
        StateStream {
            sender: self.inner.state_events.clone(),
        }
    }

    pub fn error_stream(&self) -> ErrorStream {
        ErrorStream {
            sender: self.inner.errors.clone(),
        }
    }

    pub fn reconnection_stream(&self) -> ReconnectionStream {
        ReconnectionStream {
            sender: self.inner.reconnections.clone(),
        }
    }

    pub async fn queued_commands(&self) -> usize {
        self.inner.outbound.lock().await.queue.len()
    }

    /// Commands dropped from the queue on overflow since start
    pub async fn evicted_commands(&self) -> u64 {
        self.inner.outbound.lock().await.queue.evicted()
    }

    pub async fn last_pong(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_pong.read().await
    }

    pub async fn connection_id(&self) -> Option<String> {
        self.inner.connection_id.read().await.clone()
    }
}

#[async_trait]
impl CommandSink for EngineClient {
    async fn send_text(&self, payload: String) -> Result<(), TransportError> {
        self.deliver(payload).await
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn publish_state(&self, generation: u64, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if !self.is_current(generation) || *current == next {
                return false;
            }
            info!("Engine connection {} -> {}", current, next);
            *current = next;
            let _ = self.state_events.send(next);
            true
        });
    }

    fn force_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!("Engine connection {} -> {}", current, next);
            *current = next;
            let _ = self.state_events.send(next);
            true
        });
    }

    fn report(&self, error: TransportError) {
        let _ = self.errors.send(error);
    }

    async fn open(&self) -> Result<WsStream, TransportError> {
        debug!("Opening engine connection to {}", self.url);
        match timeout(self.config.connect_timeout, connect_async(self.url.as_str())).await {
            Ok(Ok((stream, _))) => Ok(stream),
            Ok(Err(e)) => Err(TransportError::ConnectFailed(e.to_string())),
            Err(_) => Err(TransportError::ConnectTimeout(self.config.connect_timeout)),
        }
    }

    async fn supervise(self: Arc<Self>, generation: u64, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut attempt: u32 = 0;

        loop {
            self.publish_state(generation, ConnectionState::Connecting);

            let opened = tokio::select! {
                result = self.open() => result,
                _ = shutdown_rx.recv() => return,
            };

            match opened {
                Ok(stream) => {
                    if attempt > 0 {
                        info!("Reconnected to engine after {} attempt(s)", attempt);
                        let _ = self
                            .reconnections
                            .send(ReconnectionEvent::Connected { attempt });
                    }
                    attempt = 0;

                    match self.run_connection(generation, stream, &mut shutdown_rx).await {
                        SessionEnd::Shutdown | SessionEnd::ClosedByServer => return,
                        SessionEnd::Dropped(reason) => {
                            warn!("Engine connection lost: {}", reason);
                            self.report(TransportError::ConnectionClosed(reason));
                        }
                        SessionEnd::LivenessTimeout => {}
                    }
                }
                Err(e) => {
                    error!("Engine connection failed: {}", e);
                    self.report(e);
                    self.publish_state(generation, ConnectionState::Error);
                }
            }

            attempt += 1;
            let Some(delay) = self.policy.delay_for(attempt) else {
                let total_attempts = attempt - 1;
                self.retries_exhausted.store(true, Ordering::SeqCst);
                error!("Max reconnect attempts reached ({})", total_attempts);
                self.report(TransportError::ReconnectionLimitExceeded(total_attempts));
                let _ = self
                    .reconnections
                    .send(ReconnectionEvent::MaxRetriesExceeded { total_attempts });
                self.publish_state(generation, ConnectionState::Error);
                return;
            };

            info!(
                "Reconnecting in {:?} (attempt {}/{})",
                delay, attempt, self.policy.max_attempts
            );
            let _ = self
                .reconnections
                .send(ReconnectionEvent::Scheduled { attempt, delay });
            self.publish_state(generation, ConnectionState::Reconnecting);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.recv() => return,
            }
        }
    }

    async fn run_connection(
        &self,
        generation: u64,
        stream: WsStream,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> SessionEnd {
        let (mut write, mut read) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Queued>();

        {
            let mut outbound = self.outbound.lock().await;
            let pending = outbound.queue.len();
            while let Some(item) = outbound.queue.pop_front() {
                if let Err(e) = write.send(Message::Text(item.payload.clone())).await {
                    outbound.requeue_front(item);
                    self.publish_state(generation, ConnectionState::Reconnecting);
                    return SessionEnd::Dropped(format!("failed to flush queue: {}", e));
                }
            }
            if pending > 0 {
                info!("Flushed {} queued command(s)", pending);
            }
            outbound.writer = Some(tx);
            self.publish_state(generation, ConnectionState::Connected);
        }

        let connection_id = format!(
            "conn_{}_{}",
            Utc::now().timestamp_millis(),
            rand::random::<u32>()
        );
        info!("Connected to engine at {} ({})", self.url, connection_id);
        *self.connection_id.write().await = Some(connection_id);
        *self.last_pong.write().await = Some(Utc::now());

        let window = self.config.liveness_window();
        let period = self.config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let liveness = tokio::time::sleep(window);
        tokio::pin!(liveness);

        let mut unsent = Vec::new();

        let end = loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => match decode_frame(&text) {
                        Ok(InboundFrame::Ping) => {
                            debug!("Received ping, sending pong");
                            let pong = Message::Text(ControlFrame::Pong.to_json());
                            if let Err(e) = write.send(pong).await {
                                break SessionEnd::Dropped(format!("failed to send pong: {}", e));
                            }
                        }
                        Ok(InboundFrame::Pong) => {
                            debug!("Received pong");
                            *self.last_pong.write().await = Some(Utc::now());
                            liveness.as_mut().reset(Instant::now() + window);
                        }
                        Ok(InboundFrame::Event(event)) => self.sink.on_event(event).await,
                        Err(e) => {
                            if e.is_protocol_error() {
                                warn!("Discarding frame: {}", e);
                            } else {
                                error!("{}", e);
                            }
                            self.report(e);
                        }
                    },
                    Some(Ok(Message::Binary(data))) => {
                        warn!("Unexpected binary frame ({} bytes)", data.len());
                        self.report(TransportError::MalformedFrame(format!(
                            "unexpected binary frame of {} bytes",
                            data.len()
                        )));
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if let Err(e) = write.send(Message::Pong(payload)).await {
                            break SessionEnd::Dropped(format!("failed to send pong: {}", e));
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("Connection closed by engine: {:?}", frame);
                        match frame {
                            Some(f) if f.code == CloseCode::Normal => break SessionEnd::ClosedByServer,
                            Some(f) => {
                                break SessionEnd::Dropped(format!(
                                    "close code {}: {}",
                                    u16::from(f.code),
                                    f.reason
                                ))
                            }
                            None => break SessionEnd::Dropped("closed without status".to_string()),
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break SessionEnd::Dropped(format!("read error: {}", e)),
                    None => break SessionEnd::Dropped("stream ended".to_string()),
                },
                Some(item) = rx.recv() => {
                    let len = item.payload.len();
                    if let Err(e) = write.send(Message::Text(item.payload.clone())).await {
                        unsent.push(item);
                        self.report(TransportError::SendFailed(e.to_string()));
                        break SessionEnd::Dropped(format!("failed to send command: {}", e));
                    }
                    debug!("Command sent ({} bytes)", len);
                }
                _ = heartbeat.tick() => {
                    if let Err(e) = write.send(Message::Text(ControlFrame::Ping.to_json())).await {
                        error!("Failed to send ping: {}", e);
                        break SessionEnd::Dropped(format!("failed to send ping: {}", e));
                    }
                    debug!("Sent ping");
                }
                _ = &mut liveness => {
                    warn!("No pong received for {:?}, connection may be dead", window);
                    let close = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "No pong received".into(),
                    };
                    let _ = write.send(Message::Close(Some(close))).await;
                    break SessionEnd::LivenessTimeout;
                }
                _ = shutdown_rx.recv() => {
                    let close = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "Client disconnect".into(),
                    };
                    let _ = write.send(Message::Close(Some(close))).await;
                    break SessionEnd::Shutdown;
                }
            }
        };

        let next = match &end {
            SessionEnd::Shutdown => None,
            SessionEnd::ClosedByServer => Some(ConnectionState::Disconnected),
            SessionEnd::Dropped(_) | SessionEnd::LivenessTimeout => {
                Some(ConnectionState::Reconnecting)
            }
        };

        {
            let mut outbound = self.outbound.lock().await;
            outbound.writer = None;
            rx.close();
            while let Ok(item) = rx.try_recv() {
                unsent.push(item);
            }
            if !unsent.is_empty() {
                warn!("Re-queuing {} unsent command(s)", unsent.len());
            }
            for item in unsent {
                outbound.enqueue(item);
            }
            if let Some(state) = next {
                self.publish_state(generation, state);
            }
        }
        *self.connection_id.write().await = None;

        end
    }
}
