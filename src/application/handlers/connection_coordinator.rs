//! Connection lifecycle
//!
//! Wires engine link state changes to the UI-facing connection indicator and
//! user notifications, and owns start-up and teardown of the session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::actors::{ConnectionState, EngineClient};
use crate::domain::errors::TransportError;
use crate::domain::services::SharedStore;

/// Flags a status bar renders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionIndicator {
    pub connected: bool,
    pub connecting: bool,
}

impl ConnectionIndicator {
    pub fn for_state(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Connected => Self {
                connected: true,
                connecting: false,
            },
            ConnectionState::Connecting | ConnectionState::Reconnecting => Self {
                connected: false,
                connecting: true,
            },
            ConnectionState::Disconnected | ConnectionState::Error => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Transient user-facing message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Notification for a state change. `connecting` is silent; `error` is
    /// reported from the error stream, which knows whether retries remain.
    pub fn for_state(state: ConnectionState) -> Option<Self> {
        match state {
            ConnectionState::Connecting | ConnectionState::Error => None,
            ConnectionState::Connected => Some(Self::new(
                NotificationLevel::Success,
                "Connected to trading engine",
            )),
            ConnectionState::Reconnecting => Some(Self::new(
                NotificationLevel::Info,
                "Reconnecting to trading engine...",
            )),
            ConnectionState::Disconnected => Some(Self::new(
                NotificationLevel::Error,
                "Disconnected from trading engine",
            )),
        }
    }
}

struct Listeners {
    states: JoinHandle<()>,
    errors: JoinHandle<()>,
}

pub struct ConnectionCoordinator {
    client: EngineClient,
    store: SharedStore,
    indicator: watch::Sender<ConnectionIndicator>,
    notifications: broadcast::Sender<Notification>,
    listeners: Mutex<Option<Listeners>>,
}

impl ConnectionCoordinator {
    pub fn new(client: EngineClient, store: SharedStore) -> Self {
        let (indicator, _) = watch::channel(ConnectionIndicator::default());
        let (notifications, _) = broadcast::channel(128);
        Self {
            client,
            store,
            indicator,
            notifications,
            listeners: Mutex::new(None),
        }
    }

    /// Subscribe to the link and connect. Returns false when already running.
    pub async fn init(&self) -> bool {
        let mut listeners = self.listeners.lock().await;
        if listeners.is_some() {
            debug!("Connection coordinator already initialized");
            return false;
        }

        info!("Initializing engine connection to {}", self.client.url());

        let states = {
            let mut rx = self.client.state_stream().subscribe();
            let indicator = self.indicator.clone();
            let notifications = self.notifications.clone();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(state) => {
                            indicator.send_replace(ConnectionIndicator::for_state(state));
                            if let Some(notification) = Notification::for_state(state) {
                                let _ = notifications.send(notification);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Missed {} connection state change(s)", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        let errors = {
            let mut rx = self.client.error_stream().subscribe();
            let notifications = self.notifications.clone();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(err) => {
                            if let Some(notification) = error_notification(&err) {
                                error!("WebSocket error: {}", err);
                                let _ = notifications.send(notification);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        *listeners = Some(Listeners { states, errors });
        self.indicator
            .send_replace(ConnectionIndicator::for_state(self.client.state()));
        self.client.connect().await;
        true
    }

    /// Unsubscribe, disconnect and clear the store. Returns false when there
    /// was no running session; the disconnect and reset still happen.
    pub async fn shutdown(&self) -> bool {
        let listeners = self.listeners.lock().await.take();
        let was_running = listeners.is_some();
        if let Some(Listeners { states, errors }) = listeners {
            states.abort();
            errors.abort();
        }

        info!("Tearing down engine connection");
        self.client.disconnect().await;
        self.store.reset().await;
        self.indicator.send_replace(ConnectionIndicator::default());
        was_running
    }

    pub async fn is_initialized(&self) -> bool {
        self.listeners.lock().await.is_some()
    }

    pub fn indicator(&self) -> ConnectionIndicator {
        *self.indicator.borrow()
    }

    pub fn watch_indicator(&self) -> watch::Receiver<ConnectionIndicator> {
        self.indicator.subscribe()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Surface a rejected command; the command may still go out later from
    /// the outbound queue.
    pub fn report_command_failure(&self, action: &str, err: &TransportError) -> Notification {
        warn!("Command {} failed: {}", action, err);
        let notification = Notification::new(
            NotificationLevel::Error,
            format!("Failed to {}: {}", action.replace('_', " "), err),
        );
        let _ = self.notifications.send(notification.clone());
        notification
    }

    pub fn client(&self) -> &EngineClient {
        &self.client
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }
}

fn error_notification(err: &TransportError) -> Option<Notification> {
    match err {
        TransportError::ConnectFailed(_)
        | TransportError::ConnectTimeout(_)
        | TransportError::ConnectionClosed(_) => Some(Notification::new(
            NotificationLevel::Error,
            "WebSocket connection error",
        )),
        TransportError::ReconnectionLimitExceeded(attempts) => Some(Notification::new(
            NotificationLevel::Error,
            format!("Gave up reconnecting after {} attempts", attempts),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::actors::tests::{client_with_store, fast_config, MockEngineServer, WAIT};
    use crate::application::actors::ReconnectionEvent;
    use crate::domain::events::{EngineEvent, PriceEvent};
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_indicator_mapping() {
        assert_eq!(
            ConnectionIndicator::for_state(ConnectionState::Connected),
            ConnectionIndicator {
                connected: true,
                connecting: false
            }
        );
        assert!(ConnectionIndicator::for_state(ConnectionState::Reconnecting).connecting);
        assert_eq!(
            ConnectionIndicator::for_state(ConnectionState::Error),
            ConnectionIndicator::default()
        );
        assert!(Notification::for_state(ConnectionState::Connecting).is_none());
        assert!(Notification::for_state(ConnectionState::Error).is_none());
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let server = MockEngineServer::start().await;
        let (client, store) = client_with_store(fast_config(&server.url()));
        let coordinator = ConnectionCoordinator::new(client.clone(), store);

        assert!(coordinator.init().await);
        assert!(!coordinator.init().await);
        assert!(client.wait_for_state(ConnectionState::Connected, WAIT).await);
        assert!(!coordinator.init().await);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(server.connections_accepted(), 1);
        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_connected_notification_and_indicator() {
        let server = MockEngineServer::start().await;
        let (client, store) = client_with_store(fast_config(&server.url()));
        let coordinator = ConnectionCoordinator::new(client, store);
        let mut notifications = coordinator.subscribe_notifications();
        let mut indicator = coordinator.watch_indicator();

        coordinator.init().await;

        let note = timeout(WAIT, notifications.recv()).await.unwrap().unwrap();
        assert_eq!(note.level, NotificationLevel::Success);
        timeout(WAIT, indicator.wait_for(|i| i.connected))
            .await
            .unwrap()
            .unwrap();
        assert!(!coordinator.indicator().connecting);

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_and_resets() {
        let server = MockEngineServer::start().await;
        let (client, store) = client_with_store(fast_config(&server.url()));
        let coordinator = ConnectionCoordinator::new(client.clone(), store.clone());
        coordinator.init().await;
        assert!(client.wait_for_state(ConnectionState::Connected, WAIT).await);

        store
            .apply(EngineEvent::Price(PriceEvent {
                symbol: "BTC/USDT".to_string(),
                price: 1.0,
                timestamp: None,
            }))
            .await;
        assert!(!store.is_empty().await);

        assert!(coordinator.shutdown().await);
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(store.is_empty().await);
        assert_eq!(coordinator.indicator(), ConnectionIndicator::default());
        assert!(!coordinator.is_initialized().await);

        assert!(!coordinator.shutdown().await);
    }

    #[tokio::test]
    async fn test_reconnect_does_not_reset_store() {
        let server = MockEngineServer::start().await;
        let (client, store) = client_with_store(fast_config(&server.url()));
        let coordinator = ConnectionCoordinator::new(client.clone(), store.clone());
        coordinator.init().await;
        assert!(client.wait_for_state(ConnectionState::Connected, WAIT).await);

        server.push(r#"{"type":"price","symbol":"BTC/USDT","price":50000}"#);
        timeout(WAIT, async {
            while store.price("BTC/USDT").await.is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let mut reconnections = client.reconnection_stream().subscribe();
        server.close_with(1011);
        loop {
            let event = timeout(WAIT, reconnections.recv()).await.unwrap().unwrap();
            if matches!(event, ReconnectionEvent::Connected { .. }) {
                break;
            }
        }
        assert!(client.wait_for_state(ConnectionState::Connected, WAIT).await);
        assert_eq!(store.price("BTC/USDT").await, Some(50000.0));

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_attempts_keep_connecting_until_budget_is_spent() {
        let addr = MockEngineServer::unused_addr().await;
        let config = crate::config::EngineConfig {
            max_reconnect_attempts: 3,
            reconnect_interval: Duration::from_millis(10),
            ..fast_config(&format!("ws://{}", addr))
        };
        let (client, store) = client_with_store(config);
        let coordinator = ConnectionCoordinator::new(client.clone(), store);
        let mut notifications = coordinator.subscribe_notifications();
        let mut indicator = coordinator.watch_indicator();
        coordinator.init().await;

        timeout(WAIT, indicator.wait_for(|i| i.connecting))
            .await
            .unwrap()
            .unwrap();

        let mut messages = Vec::new();
        loop {
            let note = timeout(WAIT, notifications.recv()).await.unwrap().unwrap();
            let gave_up = note.message.starts_with("Gave up reconnecting");
            messages.push(note.message);
            if gave_up {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        while let Ok(note) = notifications.try_recv() {
            messages.push(note.message);
        }

        assert!(!messages.iter().any(|m| m == "Disconnected from trading engine"));
        assert_eq!(
            messages
                .iter()
                .filter(|m| m.as_str() == "Reconnecting to trading engine...")
                .count(),
            3
        );
        assert_eq!(client.state(), ConnectionState::Error);
        assert_eq!(coordinator.indicator(), ConnectionIndicator::default());

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_command_failure_notification() {
        let (client, store) = client_with_store(fast_config("ws://127.0.0.1:9"));
        let coordinator = ConnectionCoordinator::new(client, store);
        let mut notifications = coordinator.subscribe_notifications();

        let note = coordinator.report_command_failure(
            "start_strategy",
            &TransportError::NotConnected { queued: true },
        );
        assert_eq!(note.level, NotificationLevel::Error);
        assert_eq!(
            note.message,
            "Failed to start strategy: WebSocket not connected, command queued"
        );
        assert_eq!(notifications.recv().await.unwrap(), note);
    }
}
