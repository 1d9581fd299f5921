//! Shared handle over [`EngineState`].
//!
//! Every event is applied under one write lock, so readers never observe a
//! half-reduced event. Read accessors clone out of the snapshot.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::entities::{
    Balance, ExchangeConnection, LogEntry, Order, Position, Strategy,
    StrategyMergePolicy, SystemStatus, Trade,
};
use crate::domain::events::EngineEvent;
use crate::domain::repositories::EventSink;
use crate::domain::services::engine_state::{EngineState, LogFilter, OrderFilter};

#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<RwLock<EngineState>>,
}

impl SharedStore {
    pub fn new(strategy_policy: StrategyMergePolicy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(EngineState::new(strategy_policy))),
        }
    }

    pub async fn apply(&self, event: EngineEvent) {
        let kind = event.kind();
        let mut state = self.inner.write().await;
        state.apply(event);
        debug!("Applied {} event ({} total)", kind, state.events_applied());
    }

    pub async fn reset(&self) {
        let mut state = self.inner.write().await;
        let dropped = state.events_applied();
        state.reset();
        info!("Engine state reset ({} events discarded)", dropped);
    }

    /// Run `f` against a consistent snapshot
    pub async fn read<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        let state = self.inner.read().await;
        f(&state)
    }

    pub async fn is_empty(&self) -> bool {
        self.read(|s| s.is_empty()).await
    }

    pub async fn price(&self, symbol: &str) -> Option<f64> {
        self.read(|s| s.price(symbol)).await
    }

    pub async fn strategies(&self) -> Vec<Strategy> {
        self.read(|s| s.strategies().to_vec()).await
    }

    pub async fn strategy(&self, id: &str) -> Option<Strategy> {
        self.read(|s| s.strategy(id).cloned()).await
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.read(|s| s.orders().into_iter().cloned().collect()).await
    }

    pub async fn order(&self, order_id: &str) -> Option<Order> {
        self.read(|s| s.order(order_id).cloned()).await
    }

    pub async fn filter_orders(&self, filter: &OrderFilter) -> Vec<Order> {
        self.read(|s| s.filter_orders(filter).into_iter().cloned().collect())
            .await
    }

    pub async fn positions(&self) -> Vec<Position> {
        self.read(|s| s.positions().into_iter().cloned().collect()).await
    }

    pub async fn balances(&self) -> Vec<Balance> {
        self.read(|s| s.balances().into_iter().cloned().collect()).await
    }

    pub async fn recent_trades(&self, limit: usize) -> Vec<Trade> {
        self.read(|s| s.recent_trades(limit).into_iter().cloned().collect())
            .await
    }

    pub async fn recent_logs(&self, limit: usize) -> Vec<LogEntry> {
        self.read(|s| s.recent_logs(limit).into_iter().cloned().collect())
            .await
    }

    /// Filtered logs, newest `limit` kept, oldest first
    pub async fn filter_logs(&self, filter: &LogFilter, limit: usize) -> Vec<LogEntry> {
        self.read(|s| {
            let matching = s.filter_logs(filter);
            let skip = matching.len().saturating_sub(limit);
            matching.into_iter().skip(skip).cloned().collect()
        })
        .await
    }

    pub async fn connections(&self) -> Vec<ExchangeConnection> {
        self.read(|s| s.connections().into_iter().cloned().collect())
            .await
    }

    pub async fn system_status(&self) -> Option<SystemStatus> {
        self.read(|s| s.system_status().cloned()).await
    }
}

#[async_trait]
impl EventSink for SharedStore {
    async fn on_event(&self, event: EngineEvent) {
        self.apply(event).await;
    }
}
