use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::events::{Side, TradeEvent};

/// Immutable fill record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub order_id: String,
    pub symbol: String,
    pub price: f64,
    pub amount: f64,
    pub side: Side,
    pub fee: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    pub timestamp: f64,
}

impl Trade {
    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp as i64)
    }
}

impl From<TradeEvent> for Trade {
    fn from(event: TradeEvent) -> Self {
        Self {
            trade_id: event.trade_id,
            order_id: event.order_id,
            symbol: event.symbol,
            price: event.price,
            amount: event.amount,
            side: event.side,
            fee: event.fee,
            strategy: event.strategy,
            timestamp: event.timestamp,
        }
    }
}
