// WebSocket integration tests against an in-process engine



pub use mock_engine_server::MockEngineServer;

use std::sync::Arc;
use std::time::Duration;

use crate::application::actors::EngineClient;
use crate::config::EngineConfig;
use crate::domain::services::SharedStore;

/// Millisecond-scale timings so tests stay fast
pub fn fast_config(url: &str) -> EngineConfig {
    EngineConfig {
        url: url.to_string(),
        reconnect_interval: Duration::from_millis(20),
        max_reconnect_attempts: 5,
        heartbeat_interval: Duration::from_secs(30),
        pong_timeout: Duration::from_secs(30),
        send_timeout: Duration::from_millis(100),
        connect_timeout: Duration::from_secs(2),
        disconnect_timeout: Duration::from_secs(1),
        ..EngineConfig::default()
    }
}

pub fn client_with_store(config: EngineConfig) -> (EngineClient, SharedStore) {
    let store = SharedStore::default();
    let client = EngineClient::new(config, Arc::new(store.clone())).unwrap();
    (client, store)
}

pub const WAIT: Duration = Duration::from_secs(3);
