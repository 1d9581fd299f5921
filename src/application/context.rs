use std::sync::Arc;

use crate::application::actors::EngineClient;
use crate::application::handlers::ConnectionCoordinator;
use crate::application::services::CommandDispatcher;
use crate::config::EngineConfig;
use crate::domain::errors::StartupError;
use crate::domain::services::SharedStore;

/// Everything a session needs, built once at start-up and shared by
/// reference.
#[derive(Clone)]
pub struct AppContext {
    pub config: EngineConfig,
    pub store: SharedStore,
    pub client: EngineClient,
    pub dispatcher: CommandDispatcher,
    pub coordinator: Arc<ConnectionCoordinator>,
}

impl AppContext {
    pub fn build(config: EngineConfig) -> Result<Self, StartupError> {
        config.validate()?;

        let store = SharedStore::new(config.strategy_merge_policy);
        let client = EngineClient::new(config.clone(), Arc::new(store.clone()))?;
        let dispatcher = CommandDispatcher::new(Arc::new(client.clone()));
        let coordinator = Arc::new(ConnectionCoordinator::new(client.clone(), store.clone()));

        Ok(Self {
            config,
            store,
            client,
            dispatcher,
            coordinator,
        })
    }
}
