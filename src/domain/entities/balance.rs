//! Balance entity - one row per (exchange, asset)

use serde::{Deserialize, Serialize};

use crate::domain::events::BalanceEvent;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BalanceKey {
    pub exchange: String,
    pub asset: String,
}

impl BalanceKey {
    pub fn new(exchange: impl Into<String>, asset: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            asset: asset.into(),
        }
    }
}

impl std::fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.exchange, self.asset)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    /// Available for trading
    pub free: f64,
    /// Locked in open orders
    pub used: f64,
    pub total: f64,
    pub exchange: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl Balance {
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.exchange.clone(), self.asset.clone())
    }
}

impl From<BalanceEvent> for Balance {
    fn from(event: BalanceEvent) -> Self {
        Self {
            asset: event.asset,
            free: event.free,
            used: event.used,
            total: event.total,
            exchange: event.exchange,
            timestamp: event.timestamp,
        }
    }
}
