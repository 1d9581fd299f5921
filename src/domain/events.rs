//! Engine event schema
//!
//! Every frame the trading engine pushes is a flat JSON object carrying a
//! `type` discriminator. Domain events decode into [`EngineEvent`]; the two
//! heartbeat control frames (`ping`/`pong`) are split out by
//! [`decode_frame`] so they never reach the state store.

use serde::{Deserialize, Serialize};

use crate::domain::errors::TransportError;

/// Order lifecycle as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Filled,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    Running,
    #[default]
    Stopped,
    Paused,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

/// Link state between the engine and one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeLinkStatus {
    Connected,
    Disconnected,
    Connecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEvent {
    pub symbol: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// Partial order update; absent fields keep the previously stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdateEvent {
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEvent {
    pub symbol: String,
    /// Positive for long, negative for short
    pub size: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEvent {
    pub asset: String,
    pub free: f64,
    pub used: f64,
    pub total: f64,
    pub exchange: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// Strategy snapshot. Only `id` and `status` are mandatory so that
/// status-only updates decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyEvent {
    pub id: String,
    pub status: StrategyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trades: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub msg: String,
    pub source: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub exchange: String,
    pub status: ExchangeLinkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatusEvent {
    /// Seconds since the engine started
    pub uptime: u64,
    pub bot_status: BotStatus,
    pub active_strategies: u32,
    pub total_profit: f64,
    pub total_trades: u64,
    pub success_rate: f64,
    pub timestamp: f64,
}

/// A single execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub trade_id: String,
    pub order_id: String,
    pub symbol: String,
    pub price: f64,
    pub amount: f64,
    pub side: Side,
    pub fee: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Epoch milliseconds
    pub timestamp: f64,
}

/// Closed set of domain events the engine may emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Price(PriceEvent),
    OrderUpdate(OrderUpdateEvent),
    Position(PositionEvent),
    Balance(BalanceEvent),
    Strategy(StrategyEvent),
    Log(LogEvent),
    Connection(ConnectionEvent),
    SystemStatus(SystemStatusEvent),
    Trade(TradeEvent),
}

/// Wire discriminators accepted as domain events.
pub const EVENT_KINDS: [&str; 9] = [
    "price",
    "order_update",
    "position",
    "balance",
    "strategy",
    "log",
    "connection",
    "system_status",
    "trade",
];

impl EngineEvent {
    /// The `type` discriminator this event carries on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::Price(_) => "price",
            EngineEvent::OrderUpdate(_) => "order_update",
            EngineEvent::Position(_) => "position",
            EngineEvent::Balance(_) => "balance",
            EngineEvent::Strategy(_) => "strategy",
            EngineEvent::Log(_) => "log",
            EngineEvent::Connection(_) => "connection",
            EngineEvent::SystemStatus(_) => "system_status",
            EngineEvent::Trade(_) => "trade",
        }
    }

    pub fn is_price(&self) -> bool {
        matches!(self, EngineEvent::Price(_))
    }

    pub fn is_order_update(&self) -> bool {
        matches!(self, EngineEvent::OrderUpdate(_))
    }

    pub fn is_position(&self) -> bool {
        matches!(self, EngineEvent::Position(_))
    }

    pub fn is_balance(&self) -> bool {
        matches!(self, EngineEvent::Balance(_))
    }

    pub fn is_strategy(&self) -> bool {
        matches!(self, EngineEvent::Strategy(_))
    }

    pub fn is_log(&self) -> bool {
        matches!(self, EngineEvent::Log(_))
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, EngineEvent::Connection(_))
    }

    pub fn is_system_status(&self) -> bool {
        matches!(self, EngineEvent::SystemStatus(_))
    }

    pub fn is_trade(&self) -> bool {
        matches!(self, EngineEvent::Trade(_))
    }

    pub fn as_price(&self) -> Option<&PriceEvent> {
        match self {
            EngineEvent::Price(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_order_update(&self) -> Option<&OrderUpdateEvent> {
        match self {
            EngineEvent::OrderUpdate(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_position(&self) -> Option<&PositionEvent> {
        match self {
            EngineEvent::Position(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_balance(&self) -> Option<&BalanceEvent> {
        match self {
            EngineEvent::Balance(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_strategy(&self) -> Option<&StrategyEvent> {
        match self {
            EngineEvent::Strategy(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_log(&self) -> Option<&LogEvent> {
        match self {
            EngineEvent::Log(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_connection(&self) -> Option<&ConnectionEvent> {
        match self {
            EngineEvent::Connection(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_system_status(&self) -> Option<&SystemStatusEvent> {
        match self {
            EngineEvent::SystemStatus(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_trade(&self) -> Option<&TradeEvent> {
        match self {
            EngineEvent::Trade(e) => Some(e),
            _ => None,
        }
    }
}

/// Heartbeat frames exchanged in both directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    Ping,
    Pong,
}

impl ControlFrame {
    pub fn to_json(self) -> String {
        match self {
            ControlFrame::Ping => r#"{"type":"ping"}"#.to_string(),
            ControlFrame::Pong => r#"{"type":"pong"}"#.to_string(),
        }
    }
}

/// One decoded inbound text frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Ping,
    Pong,
    Event(EngineEvent),
}

/// Decode one inbound text frame.
///
/// Invalid JSON yields [`TransportError::MalformedFrame`]. Valid JSON whose
/// `type` is not a heartbeat or a known event kind yields
/// [`TransportError::UnknownEvent`]. A known kind with missing or mistyped
/// fields is reported as malformed.
pub fn decode_frame(text: &str) -> Result<InboundFrame, TransportError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .map(str::to_owned)
        .ok_or_else(|| TransportError::UnknownEvent("<missing type>".to_string()))?;

    match kind.as_str() {
        "ping" => Ok(InboundFrame::Ping),
        "pong" => Ok(InboundFrame::Pong),
        k if EVENT_KINDS.contains(&k) => serde_json::from_value::<EngineEvent>(value)
            .map(InboundFrame::Event)
            .map_err(|e| TransportError::MalformedFrame(format!("{} event: {}", kind, e))),
        other => Err(TransportError::UnknownEvent(other.to_string())),
    }
}
