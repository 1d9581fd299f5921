//! Outbound command payloads.
//!
//! Every command is a flat JSON object with a `cmd` discriminator, e.g.
//! `{"cmd":"start_strategy","id":"s1"}`. Construction is pure; delivery is
//! the transport's job.

use serde::{Deserialize, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::domain::errors::TransportError;
use crate::domain::events::{OrderStatus, Side};

/// Exchange API secret. Wiped on drop, never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiSecret(Zeroizing<String>);

impl ApiSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for ApiSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiSecret(***)")
    }
}

impl Serialize for ApiSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// Keys a `create_strategy` payload owns; extra params may not shadow them.
const CREATE_STRATEGY_RESERVED: [&str; 5] = ["cmd", "name", "type", "exchange", "pair"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum EngineCommand {
    StartStrategy {
        id: String,
    },
    StopStrategy {
        id: String,
    },
    PauseStrategy {
        id: String,
    },
    ResumeStrategy {
        id: String,
    },
    DeleteStrategy {
        id: String,
    },
    PlaceOrder {
        symbol: String,
        side: Side,
        #[serde(rename = "type")]
        order_type: OrderType,
        #[serde(skip_serializing_if = "Option::is_none")]
        price: Option<f64>,
        size: f64,
    },
    CancelOrder {
        order_id: String,
    },
    CancelAllOrders {
        #[serde(skip_serializing_if = "Option::is_none")]
        symbol: Option<String>,
    },
    CreateConnection {
        exchange: String,
        api_key: String,
        api_secret: ApiSecret,
        testnet: bool,
    },
    DeleteConnection {
        id: String,
    },
    TestConnection {
        id: String,
    },
    CreateStrategy {
        name: String,
        #[serde(rename = "type")]
        strategy_type: String,
        exchange: String,
        pair: String,
        #[serde(flatten)]
        params: serde_json::Map<String, serde_json::Value>,
    },
    UpdateStrategyConfig {
        id: String,
        config: serde_json::Map<String, serde_json::Value>,
    },
    StartEngine,
    StopEngine,
    GetSystemStatus,
    GetStrategies,
    GetOrders {
        #[serde(skip_serializing_if = "Option::is_none")]
        symbol: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<OrderStatus>,
        #[serde(skip_serializing_if = "Option::is_none")]
        strategy: Option<String>,
    },
    GetPositions,
    GetBalances,
}

impl EngineCommand {
    pub fn market_order(symbol: impl Into<String>, side: Side, size: f64) -> Self {
        EngineCommand::PlaceOrder {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            price: None,
            size,
        }
    }

    pub fn limit_order(symbol: impl Into<String>, side: Side, price: f64, size: f64) -> Self {
        EngineCommand::PlaceOrder {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            price: Some(price),
            size,
        }
    }

    /// Builds `create_strategy`; params colliding with a fixed key are dropped.
    pub fn create_strategy(
        name: impl Into<String>,
        strategy_type: impl Into<String>,
        exchange: impl Into<String>,
        pair: impl Into<String>,
        mut params: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        params.retain(|k, _| !CREATE_STRATEGY_RESERVED.contains(&k.as_str()));
        EngineCommand::CreateStrategy {
            name: name.into(),
            strategy_type: strategy_type.into(),
            exchange: exchange.into(),
            pair: pair.into(),
            params,
        }
    }

    /// The wire `cmd` value
    pub fn action(&self) -> &'static str {
        match self {
            EngineCommand::StartStrategy { .. } => "start_strategy",
            EngineCommand::StopStrategy { .. } => "stop_strategy",
            EngineCommand::PauseStrategy { .. } => "pause_strategy",
            EngineCommand::ResumeStrategy { .. } => "resume_strategy",
            EngineCommand::DeleteStrategy { .. } => "delete_strategy",
            EngineCommand::PlaceOrder { .. } => "place_order",
            EngineCommand::CancelOrder { .. } => "cancel_order",
            EngineCommand::CancelAllOrders { .. } => "cancel_all_orders",
            EngineCommand::CreateConnection { .. } => "create_connection",
            EngineCommand::DeleteConnection { .. } => "delete_connection",
            EngineCommand::TestConnection { .. } => "test_connection",
            EngineCommand::CreateStrategy { .. } => "create_strategy",
            EngineCommand::UpdateStrategyConfig { .. } => "update_strategy_config",
            EngineCommand::StartEngine => "start_engine",
            EngineCommand::StopEngine => "stop_engine",
            EngineCommand::GetSystemStatus => "get_system_status",
            EngineCommand::GetStrategies => "get_strategies",
            EngineCommand::GetOrders { .. } => "get_orders",
            EngineCommand::GetPositions => "get_positions",
            EngineCommand::GetBalances => "get_balances",
        }
    }

    pub fn to_json(&self) -> Result<String, TransportError> {
        Ok(serde_json::to_string(self)?)
    }
}
