//! Typed engine commands
//!
//! Each method maps an application intent onto one [`EngineCommand`] and hands
//! it to the transport. Failures are whatever the transport reports; nothing
//! is retried here.

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::commands::{ApiSecret, EngineCommand};
use crate::domain::errors::TransportError;
use crate::domain::events::{OrderStatus, Side};
use crate::domain::repositories::CommandSink;

pub type DispatchResult = Result<(), TransportError>;

#[derive(Clone)]
pub struct CommandDispatcher {
    sink: Arc<dyn CommandSink>,
}

impl CommandDispatcher {
    pub fn new(sink: Arc<dyn CommandSink>) -> Self {
        Self { sink }
    }

    pub async fn dispatch(&self, command: EngineCommand) -> DispatchResult {
        let action = command.action();
        let payload = command.to_json()?;
        info!("Dispatching {}", action);
        self.sink.send_text(payload).await.map_err(|e| {
            warn!("{} failed: {}", action, e);
            e
        })
    }

    // --- strategies ---

    pub async fn start_strategy(&self, id: impl Into<String>) -> DispatchResult {
        self.dispatch(EngineCommand::StartStrategy { id: id.into() }).await
    }

    pub async fn stop_strategy(&self, id: impl Into<String>) -> DispatchResult {
        self.dispatch(EngineCommand::StopStrategy { id: id.into() }).await
    }

    pub async fn pause_strategy(&self, id: impl Into<String>) -> DispatchResult {
        self.dispatch(EngineCommand::PauseStrategy { id: id.into() }).await
    }

    pub async fn resume_strategy(&self, id: impl Into<String>) -> DispatchResult {
        self.dispatch(EngineCommand::ResumeStrategy { id: id.into() }).await
    }

    pub async fn delete_strategy(&self, id: impl Into<String>) -> DispatchResult {
        self.dispatch(EngineCommand::DeleteStrategy { id: id.into() }).await
    }

    /// Extra `params` are sent alongside the fixed fields
    pub async fn create_strategy(
        &self,
        name: impl Into<String>,
        strategy_type: impl Into<String>,
        exchange: impl Into<String>,
        pair: impl Into<String>,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> DispatchResult {
        self.dispatch(EngineCommand::create_strategy(
            name,
            strategy_type,
            exchange,
            pair,
            params,
        ))
        .await
    }

    pub async fn update_strategy_config(
        &self,
        id: impl Into<String>,
        config: serde_json::Map<String, serde_json::Value>,
    ) -> DispatchResult {
        self.dispatch(EngineCommand::UpdateStrategyConfig {
            id: id.into(),
            config,
        })
        .await
    }

    // --- orders ---

    pub async fn place_market_order(
        &self,
        symbol: impl Into<String>,
        side: Side,
        size: f64,
    ) -> DispatchResult {
        self.dispatch(EngineCommand::market_order(symbol, side, size))
            .await
    }

    pub async fn place_limit_order(
        &self,
        symbol: impl Into<String>,
        side: Side,
        price: f64,
        size: f64,
    ) -> DispatchResult {
        self.dispatch(EngineCommand::limit_order(symbol, side, price, size))
            .await
    }

    pub async fn cancel_order(&self, order_id: impl Into<String>) -> DispatchResult {
        self.dispatch(EngineCommand::CancelOrder {
            order_id: order_id.into(),
        })
        .await
    }

    /// Cancel every open order, or only those on `symbol`
    pub async fn cancel_all_orders(&self, symbol: Option<String>) -> DispatchResult {
        self.dispatch(EngineCommand::CancelAllOrders { symbol }).await
    }

    // --- exchange connections ---

    pub async fn create_connection(
        &self,
        exchange: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: ApiSecret,
        testnet: bool,
    ) -> DispatchResult {
        self.dispatch(EngineCommand::CreateConnection {
            exchange: exchange.into(),
            api_key: api_key.into(),
            api_secret,
            testnet,
        })
        .await
    }

    pub async fn delete_connection(&self, id: impl Into<String>) -> DispatchResult {
        self.dispatch(EngineCommand::DeleteConnection { id: id.into() })
            .await
    }

    pub async fn test_connection(&self, id: impl Into<String>) -> DispatchResult {
        self.dispatch(EngineCommand::TestConnection { id: id.into() })
            .await
    }

    // --- engine ---

    pub async fn start_engine(&self) -> DispatchResult {
        self.dispatch(EngineCommand::StartEngine).await
    }

    pub async fn stop_engine(&self) -> DispatchResult {
        self.dispatch(EngineCommand::StopEngine).await
    }

    pub async fn get_system_status(&self) -> DispatchResult {
        self.dispatch(EngineCommand::GetSystemStatus).await
    }

    pub async fn get_strategies(&self) -> DispatchResult {
        self.dispatch(EngineCommand::GetStrategies).await
    }

    pub async fn get_orders(
        &self,
        symbol: Option<String>,
        status: Option<OrderStatus>,
        strategy: Option<String>,
    ) -> DispatchResult {
        self.dispatch(EngineCommand::GetOrders {
            symbol,
            status,
            strategy,
        })
        .await
    }

    pub async fn get_positions(&self) -> DispatchResult {
        self.dispatch(EngineCommand::GetPositions).await
    }

    pub async fn get_balances(&self) -> DispatchResult {
        self.dispatch(EngineCommand::GetBalances).await
    }
}
