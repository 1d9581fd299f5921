use serde::{Deserialize, Serialize};

use crate::domain::events::{ConnectionEvent, ExchangeLinkStatus};

/// Engine-to-exchange link as last reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConnection {
    pub exchange: String,
    pub status: ExchangeLinkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl ExchangeConnection {
    pub fn is_connected(&self) -> bool {
        self.status == ExchangeLinkStatus::Connected
    }
}

impl From<ConnectionEvent> for ExchangeConnection {
    fn from(event: ConnectionEvent) -> Self {
        Self {
            exchange: event.exchange,
            status: event.status,
            message: event.message,
            timestamp: event.timestamp,
        }
    }
}
