//! In-memory snapshot of engine-derived state and its event reducer.
//!
//! [`EngineState::apply`] is the only mutation path besides [`EngineState::reset`].
//! Each event kind maps to exactly one rule:
//!
//! | event           | identity            | rule                                   |
//! |-----------------|---------------------|----------------------------------------|
//! | `price`         | symbol              | last write wins                        |
//! | `order_update`  | orderId             | field merge                            |
//! | `position`      | symbol              | replace, exchange label derived        |
//! | `balance`       | (exchange, asset)   | replace                                |
//! | `strategy`      | id                  | [`StrategyMergePolicy`], `created` kept |
//! | `log`           | -                   | append, newest 500 kept, oldest first  |
//! | `connection`    | exchange            | replace                                |
//! | `system_status` | singleton           | replace                                |
//! | `trade`         | trade_id            | append, newest 100 kept, newest first  |

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::domain::entities::{
    Balance, BalanceKey, ExchangeConnection, LogEntry, Order, Position, Stats, Strategy,
    StrategyMergePolicy, SystemStatus, Trade,
};
use crate::domain::events::{EngineEvent, LogLevel, OrderStatus, StrategyStatus};
use crate::domain::services::bounded_buffer::BoundedBuffer;

pub const LOG_CAPACITY: usize = 500;
pub const TRADE_CAPACITY: usize = 100;
pub const DEFAULT_RECENT_LOGS: usize = 100;
pub const DEFAULT_RECENT_TRADES: usize = 20;

/// Order list filter; every populated field must match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub symbol: Option<String>,
    pub strategy: Option<String>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status == s)
            && self.symbol.as_ref().map_or(true, |s| &order.symbol == s)
            && self
                .strategy
                .as_ref()
                .map_or(true, |s| order.strategy.as_ref() == Some(s))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogFilter {
    pub level: Option<LogLevel>,
    pub source: Option<String>,
}

impl LogFilter {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        self.level.map_or(true, |l| entry.level == l)
            && self.source.as_ref().map_or(true, |s| &entry.source == s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyCounts {
    pub running: usize,
    pub stopped: usize,
    pub paused: usize,
    pub error: usize,
}

impl StrategyCounts {
    pub fn total(&self) -> usize {
        self.running + self.stopped + self.paused + self.error
    }
}

#[derive(Debug, Clone)]
pub struct EngineState {
    strategy_policy: StrategyMergePolicy,
    prices: BTreeMap<String, f64>,
    strategies: Vec<Strategy>,
    orders: HashMap<String, Order>,
    positions: BTreeMap<String, Position>,
    balances: BTreeMap<BalanceKey, Balance>,
    trades: BoundedBuffer<Trade>,
    logs: BoundedBuffer<LogEntry>,
    connections: BTreeMap<String, ExchangeConnection>,
    system_status: Option<SystemStatus>,
    events_applied: u64,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new(StrategyMergePolicy::default())
    }
}

impl EngineState {
    pub fn new(strategy_policy: StrategyMergePolicy) -> Self {
        Self {
            strategy_policy,
            prices: BTreeMap::new(),
            strategies: Vec::new(),
            orders: HashMap::new(),
            positions: BTreeMap::new(),
            balances: BTreeMap::new(),
            trades: BoundedBuffer::new(TRADE_CAPACITY),
            logs: BoundedBuffer::new(LOG_CAPACITY),
            connections: BTreeMap::new(),
            system_status: None,
            events_applied: 0,
        }
    }

    pub fn strategy_policy(&self) -> StrategyMergePolicy {
        self.strategy_policy
    }

    /// Reduce one event into the snapshot
    pub fn apply(&mut self, event: EngineEvent) {
        self.apply_at(event, Utc::now());
    }

    /// Reduce one event using `now` for local timestamps
    pub fn apply_at(&mut self, event: EngineEvent, now: DateTime<Utc>) {
        self.events_applied += 1;

        match event {
            EngineEvent::Price(e) => {
                self.prices.insert(e.symbol, e.price);
            }
            EngineEvent::OrderUpdate(e) => match self.orders.get_mut(&e.order_id) {
                Some(order) => order.merge(e, now),
                None => {
                    self.orders.insert(e.order_id.clone(), Order::from_update(e, now));
                }
            },
            EngineEvent::Position(e) => {
                self.positions.insert(e.symbol.clone(), Position::from(e));
            }
            EngineEvent::Balance(e) => {
                let balance = Balance::from(e);
                self.balances.insert(balance.key(), balance);
            }
            EngineEvent::Strategy(e) => {
                match self.strategies.iter_mut().find(|s| s.id == e.id) {
                    Some(existing) => existing.apply(e, self.strategy_policy),
                    None => {
                        let created = now.format("%Y-%m-%d").to_string();
                        self.strategies.push(Strategy::from_event(e, created));
                    }
                }
            }
            EngineEvent::Log(e) => {
                self.logs.push(LogEntry::from(e));
            }
            EngineEvent::Connection(e) => {
                self.connections
                    .insert(e.exchange.clone(), ExchangeConnection::from(e));
            }
            EngineEvent::SystemStatus(e) => {
                self.system_status = Some(SystemStatus::from(e));
            }
            EngineEvent::Trade(e) => {
                if self.trades.iter().any(|t| t.trade_id == e.trade_id) {
                    debug!("Ignoring duplicate trade {}", e.trade_id);
                    return;
                }
                self.trades.push(Trade::from(e));
            }
        }
    }

    /// Clear every collection back to its empty default
    pub fn reset(&mut self) {
        *self = Self::new(self.strategy_policy);
    }

    /// Number of events reduced since the last reset
    pub fn events_applied(&self) -> u64 {
        self.events_applied
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
            && self.strategies.is_empty()
            && self.orders.is_empty()
            && self.positions.is_empty()
            && self.balances.is_empty()
            && self.trades.is_empty()
            && self.logs.is_empty()
            && self.connections.is_empty()
            && self.system_status.is_none()
    }

    // --- prices ---

    pub fn prices(&self) -> &BTreeMap<String, f64> {
        &self.prices
    }

    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }

    // --- strategies ---

    /// In first-seen order
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn strategy(&self, id: &str) -> Option<&Strategy> {
        self.strategies.iter().find(|s| s.id == id)
    }

    pub fn running_strategies(&self) -> Vec<&Strategy> {
        self.strategies.iter().filter(|s| s.is_running()).collect()
    }

    pub fn strategy_counts(&self) -> StrategyCounts {
        self.strategies
            .iter()
            .fold(StrategyCounts::default(), |mut counts, s| {
                match s.status {
                    StrategyStatus::Running => counts.running += 1,
                    StrategyStatus::Stopped => counts.stopped += 1,
                    StrategyStatus::Paused => counts.paused += 1,
                    StrategyStatus::Error => counts.error += 1,
                }
                counts
            })
    }

    // --- orders ---

    /// Most recent first: engine timestamp descending, then local update time
    pub fn orders(&self) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self.orders.values().collect();
        orders.sort_by(|a, b| {
            let ta = a.timestamp.unwrap_or(0.0);
            let tb = b.timestamp.unwrap_or(0.0);
            tb.total_cmp(&ta)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
                .then_with(|| a.order_id.cmp(&b.order_id))
        });
        orders
    }

    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn filter_orders(&self, filter: &OrderFilter) -> Vec<&Order> {
        self.orders()
            .into_iter()
            .filter(|o| filter.matches(o))
            .collect()
    }

    pub fn open_orders(&self) -> Vec<&Order> {
        self.orders().into_iter().filter(|o| o.is_open()).collect()
    }

    // --- positions ---

    pub fn positions(&self) -> Vec<&Position> {
        self.positions.values().collect()
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn total_unrealized_pnl(&self) -> f64 {
        self.positions.values().map(|p| p.pnl).sum()
    }

    // --- balances ---

    pub fn balances(&self) -> Vec<&Balance> {
        self.balances.values().collect()
    }

    pub fn balance(&self, exchange: &str, asset: &str) -> Option<&Balance> {
        self.balances.get(&BalanceKey::new(exchange, asset))
    }

    // --- trades ---

    /// Newest first
    pub fn trades(&self) -> Vec<&Trade> {
        self.trades.iter_newest_first().collect()
    }

    pub fn recent_trades(&self, limit: usize) -> Vec<&Trade> {
        self.trades.iter_newest_first().take(limit).collect()
    }

    // --- logs ---

    /// Oldest first
    pub fn logs(&self) -> Vec<&LogEntry> {
        self.logs.iter().collect()
    }

    /// The newest `limit` entries, still oldest first
    pub fn recent_logs(&self, limit: usize) -> Vec<&LogEntry> {
        let skip = self.logs.len().saturating_sub(limit);
        self.logs.iter().skip(skip).collect()
    }

    pub fn filter_logs(&self, filter: &LogFilter) -> Vec<&LogEntry> {
        self.logs.iter().filter(|l| filter.matches(l)).collect()
    }

    // --- exchange connections ---

    pub fn connections(&self) -> Vec<&ExchangeConnection> {
        self.connections.values().collect()
    }

    pub fn connection(&self, exchange: &str) -> Option<&ExchangeConnection> {
        self.connections.get(exchange)
    }

    pub fn connected_exchanges(&self) -> usize {
        self.connections.values().filter(|c| c.is_connected()).count()
    }

    // --- system ---

    pub fn system_status(&self) -> Option<&SystemStatus> {
        self.system_status.as_ref()
    }

    pub fn stats(&self) -> Stats {
        self.stats_on(Utc::now().date_naive())
    }

    /// Top-line figures; `trades_today` counts fills executed on `today` (UTC)
    pub fn stats_on(&self, today: NaiveDate) -> Stats {
        let trades_today = self
            .trades
            .iter()
            .filter_map(|t| t.executed_at())
            .filter(|at| at.date_naive() == today)
            .count();

        match &self.system_status {
            Some(status) => Stats {
                total_profit: status.total_profit,
                total_trades: status.total_trades,
                trades_today,
                success_rate: status.success_rate,
                uptime: status.uptime,
                engine_running: status.bot_status == crate::domain::events::BotStatus::Running,
            },
            None => Stats {
                trades_today,
                ..Stats::default()
            },
        }
    }
}
