use serde::{Deserialize, Serialize};

use crate::domain::events::{BotStatus, SystemStatusEvent};

/// Engine-wide status, replaced wholesale on every `system_status` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub uptime: u64,
    pub bot_status: BotStatus,
    pub active_strategies: u32,
    pub total_profit: f64,
    pub total_trades: u64,
    pub success_rate: f64,
    pub timestamp: f64,
}

impl From<SystemStatusEvent> for SystemStatus {
    fn from(event: SystemStatusEvent) -> Self {
        Self {
            uptime: event.uptime,
            bot_status: event.bot_status,
            active_strategies: event.active_strategies,
            total_profit: event.total_profit,
            total_trades: event.total_trades,
            success_rate: event.success_rate,
            timestamp: event.timestamp,
        }
    }
}

/// Top-line dashboard figures, derived on read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_profit: f64,
    pub total_trades: u64,
    pub trades_today: usize,
    pub success_rate: f64,
    pub uptime: u64,
    pub engine_running: bool,
}
