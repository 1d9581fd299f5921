//! Strategy entity and its upsert policy

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::events::{StrategyEvent, StrategyStatus};

/// How a `strategy` event is folded onto an already-known strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyMergePolicy {
    /// Every mutable field is taken from the event; omitted fields fall back
    /// to their empty value. Only `created` survives.
    #[default]
    Replace,
    /// Fields present in the event overwrite, omitted fields keep the prior value.
    Merge,
}

impl FromStr for StrategyMergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(StrategyMergePolicy::Replace),
            "merge" => Ok(StrategyMergePolicy::Merge),
            other => Err(format!("unknown strategy merge policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub strategy_type: String,
    pub exchange: String,
    pub pair: String,
    pub status: StrategyStatus,
    pub profit: f64,
    pub trades: u64,
    /// Creation date (`YYYY-MM-DD`), fixed at first sight
    pub created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Strategy {
    pub const DEFAULT_TYPE: &'static str = "strategy";

    /// Build a fresh record from an event seen for the first time
    pub fn from_event(event: StrategyEvent, created: String) -> Self {
        Self {
            id: event.id,
            name: event.name.unwrap_or_default(),
            strategy_type: Self::DEFAULT_TYPE.to_string(),
            exchange: event.exchange.unwrap_or_default(),
            pair: event.pair.unwrap_or_default(),
            status: event.status,
            profit: event.profit.unwrap_or(0.0),
            trades: event.trades.unwrap_or(0),
            created,
            error_msg: event.error_msg,
            config: event.config,
        }
    }

    /// Fold a later event for the same id onto this record
    pub fn apply(&mut self, event: StrategyEvent, policy: StrategyMergePolicy) {
        match policy {
            StrategyMergePolicy::Replace => {
                let created = std::mem::take(&mut self.created);
                *self = Self::from_event(event, created);
            }
            StrategyMergePolicy::Merge => {
                self.status = event.status;
                if let Some(name) = event.name {
                    self.name = name;
                }
                if let Some(exchange) = event.exchange {
                    self.exchange = exchange;
                }
                if let Some(pair) = event.pair {
                    self.pair = pair;
                }
                if let Some(profit) = event.profit {
                    self.profit = profit;
                }
                if let Some(trades) = event.trades {
                    self.trades = trades;
                }
                if let Some(config) = event.config {
                    self.config = Some(config);
                }
                // an explicit status without an error clears a stale message
                self.error_msg = event.error_msg;
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == StrategyStatus::Running
    }
}
