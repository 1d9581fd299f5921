//! HTTP read-model and command endpoints.
//!
//! Reads are served from the local store; nothing here queries the engine
//! synchronously. Command routes wait for the transport like any other caller.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::application::actors::ConnectionState;
use crate::application::context::AppContext;
use crate::application::handlers::ConnectionIndicator;
use crate::domain::commands::OrderType;
use crate::domain::entities::{
    Balance, ExchangeConnection, LogEntry, Order, Position, Stats, Strategy, SystemStatus, Trade,
};
use crate::domain::errors::TransportError;
use crate::domain::events::{LogLevel, Side};
use crate::domain::services::engine_state::{DEFAULT_RECENT_LOGS, DEFAULT_RECENT_TRADES};
use crate::domain::services::{LogFilter, OrderFilter, StrategyCounts};

type Ctx = State<Arc<AppContext>>;
type HandlerError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn not_found(what: String) -> HandlerError {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { error: what }))
}

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(get_stats))
        .route("/status", get(get_system_status))
        .route("/strategies", get(get_strategies))
        .route("/strategies/:id", get(get_strategy))
        .route("/strategies/:id/:action", post(strategy_action))
        .route("/orders", get(get_orders).post(place_order))
        .route("/orders/:order_id", get(get_order).delete(cancel_order))
        .route("/positions", get(get_positions))
        .route("/balances", get(get_balances))
        .route("/trades", get(get_trades))
        .route("/logs", get(get_logs))
        .route("/connections", get(get_connections))
        .route("/prices/:symbol", get(get_price))
        .route("/engine/:action", post(engine_action))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub state: ConnectionState,
    pub indicator: ConnectionIndicator,
    pub queued_commands: usize,
    pub evicted_commands: u64,
    pub events_applied: u64,
}

pub async fn health(State(ctx): Ctx) -> Json<HealthResponse> {
    Json(HealthResponse {
        state: ctx.client.state(),
        indicator: ctx.coordinator.indicator(),
        queued_commands: ctx.client.queued_commands().await,
        evicted_commands: ctx.client.evicted_commands().await,
        events_applied: ctx.store.read(|s| s.events_applied()).await,
    })
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: Stats,
    pub strategies: StrategyCounts,
    pub open_orders: usize,
    pub unrealized_pnl: f64,
    pub connected_exchanges: usize,
}

pub async fn get_stats(State(ctx): Ctx) -> Json<StatsResponse> {
    let response = ctx
        .store
        .read(|s| StatsResponse {
            stats: s.stats(),
            strategies: s.strategy_counts(),
            open_orders: s.open_orders().len(),
            unrealized_pnl: s.total_unrealized_pnl(),
            connected_exchanges: s.connected_exchanges(),
        })
        .await;
    Json(response)
}

#[derive(Debug, Default, Deserialize)]
pub struct StrategyQuery {
    /// Only strategies currently running
    #[serde(default)]
    pub running: bool,
}

pub async fn get_strategies(
    State(ctx): Ctx,
    Query(q): Query<StrategyQuery>,
) -> Json<Vec<Strategy>> {
    if q.running {
        let running = ctx
            .store
            .read(|s| s.running_strategies().into_iter().cloned().collect())
            .await;
        return Json(running);
    }
    Json(ctx.store.strategies().await)
}

pub async fn get_strategy(
    State(ctx): Ctx,
    Path(id): Path<String>,
) -> Result<Json<Strategy>, HandlerError> {
    ctx.store
        .strategy(&id)
        .await
        .map(Json)
        .ok_or_else(|| not_found(format!("Unknown strategy: {}", id)))
}

pub async fn get_order(
    State(ctx): Ctx,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, HandlerError> {
    ctx.store
        .order(&order_id)
        .await
        .map(Json)
        .ok_or_else(|| not_found(format!("Unknown order: {}", order_id)))
}

/// Last engine-reported status; 404 until the first `system_status` event
pub async fn get_system_status(State(ctx): Ctx) -> Result<Json<SystemStatus>, HandlerError> {
    ctx.store
        .system_status()
        .await
        .map(Json)
        .ok_or_else(|| not_found("No system status received yet".to_string()))
}

pub async fn get_orders(State(ctx): Ctx, Query(filter): Query<OrderFilter>) -> Json<Vec<Order>> {
    Json(ctx.store.filter_orders(&filter).await)
}

pub async fn get_positions(State(ctx): Ctx) -> Json<Vec<Position>> {
    Json(ctx.store.positions().await)
}

pub async fn get_balances(State(ctx): Ctx) -> Json<Vec<Balance>> {
    Json(ctx.store.balances().await)
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// Newest first
pub async fn get_trades(State(ctx): Ctx, Query(q): Query<LimitQuery>) -> Json<Vec<Trade>> {
    let limit = q.limit.unwrap_or(DEFAULT_RECENT_TRADES);
    Json(ctx.store.recent_trades(limit).await)
}

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
    pub level: Option<LogLevel>,
    pub source: Option<String>,
}

/// Last `limit` matching entries, oldest first
pub async fn get_logs(State(ctx): Ctx, Query(q): Query<LogQuery>) -> Json<Vec<LogEntry>> {
    let limit = q.limit.unwrap_or(DEFAULT_RECENT_LOGS);
    let filter = LogFilter {
        level: q.level,
        source: q.source,
    };
    if filter == LogFilter::default() {
        return Json(ctx.store.recent_logs(limit).await);
    }
    Json(ctx.store.filter_logs(&filter, limit).await)
}

pub async fn get_connections(State(ctx): Ctx) -> Json<Vec<ExchangeConnection>> {
    Json(ctx.store.connections().await)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PriceResponse {
    pub symbol: String,
    pub price: f64,
}

pub async fn get_price(
    State(ctx): Ctx,
    Path(symbol): Path<String>,
) -> Result<Json<PriceResponse>, HandlerError> {
    match ctx.store.price(&symbol).await {
        Some(price) => Ok(Json(PriceResponse { symbol, price })),
        None => Err(not_found(format!("No price for {}", symbol))),
    }
}

// --- commands ---

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandAccepted {
    pub command: String,
}

fn command_result(
    ctx: &AppContext,
    action: &str,
    result: Result<(), TransportError>,
) -> Result<Json<CommandAccepted>, HandlerError> {
    match result {
        Ok(()) => Ok(Json(CommandAccepted {
            command: action.to_string(),
        })),
        Err(e) => {
            let notification = ctx.coordinator.report_command_failure(action, &e);
            let status = match e {
                TransportError::NotConnected { .. } | TransportError::CommandEvicted => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                TransportError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_GATEWAY,
            };
            Err((
                status,
                Json(ErrorResponse {
                    error: notification.message,
                }),
            ))
        }
    }
}

pub async fn strategy_action(
    State(ctx): Ctx,
    Path((id, action)): Path<(String, String)>,
) -> Result<Json<CommandAccepted>, HandlerError> {
    let dispatcher = &ctx.dispatcher;
    let result = match action.as_str() {
        "start" => dispatcher.start_strategy(id).await,
        "stop" => dispatcher.stop_strategy(id).await,
        "pause" => dispatcher.pause_strategy(id).await,
        "resume" => dispatcher.resume_strategy(id).await,
        _ => return Err(not_found(format!("Unknown strategy action: {}", action))),
    };
    command_result(&ctx, &format!("{}_strategy", action), result)
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub price: Option<f64>,
    pub size: f64,
}

pub async fn place_order(
    State(ctx): Ctx,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<Json<CommandAccepted>, HandlerError> {
    if !(req.size.is_finite() && req.size > 0.0) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "size must be a positive number".to_string(),
            }),
        ));
    }
    let result = match (req.order_type, req.price) {
        (OrderType::Market, _) => {
            ctx.dispatcher
                .place_market_order(req.symbol, req.side, req.size)
                .await
        }
        (OrderType::Limit, Some(price)) => {
            ctx.dispatcher
                .place_limit_order(req.symbol, req.side, price, req.size)
                .await
        }
        (OrderType::Limit, None) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "limit orders need a price".to_string(),
                }),
            ))
        }
    };
    command_result(&ctx, "place_order", result)
}

pub async fn cancel_order(
    State(ctx): Ctx,
    Path(order_id): Path<String>,
) -> Result<Json<CommandAccepted>, HandlerError> {
    let result = ctx.dispatcher.cancel_order(order_id).await;
    command_result(&ctx, "cancel_order", result)
}

pub async fn engine_action(
    State(ctx): Ctx,
    Path(action): Path<String>,
) -> Result<Json<CommandAccepted>, HandlerError> {
    let result = match action.as_str() {
        "start" => ctx.dispatcher.start_engine().await,
        "stop" => ctx.dispatcher.stop_engine().await,
        _ => return Err(not_found(format!("Unknown engine action: {}", action))),
    };
    command_result(&ctx, &format!("{}_engine", action), result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::events::EngineEvent;
    use std::time::Duration;

    fn offline_context() -> Arc<AppContext> {
        let config = EngineConfig {
            send_timeout: Duration::from_millis(50),
            ..EngineConfig::default()
        };
        Arc::new(AppContext::build(config).unwrap())
    }

    fn event(json: &str) -> EngineEvent {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_disconnected_client() {
        let ctx = offline_context();
        let Json(body) = health(State(ctx)).await;
        assert_eq!(body.state, ConnectionState::Disconnected);
        assert!(!body.indicator.connected);
        assert_eq!(body.queued_commands, 0);
    }

    #[tokio::test]
    async fn test_stats_and_running_strategies() {
        let ctx = offline_context();
        for frame in [
            r#"{"type":"strategy","id":"a","status":"running"}"#,
            r#"{"type":"strategy","id":"b","status":"stopped"}"#,
            r#"{"type":"order_update","orderId":"o1","status":"pending","symbol":"BTC/USDT"}"#,
            r#"{"type":"position","symbol":"BTC/USDT","size":1.0,"entry_price":100.0,"current_price":110.0,"pnl":10.0,"pnl_percent":10.0}"#,
            r#"{"type":"connection","exchange":"binance","status":"connected"}"#,
        ] {
            ctx.store.apply(event(frame)).await;
        }

        let (status, _) = get_system_status(State(ctx.clone())).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        let Json(order) = get_order(State(ctx.clone()), Path("o1".to_string()))
            .await
            .unwrap();
        assert_eq!(order.symbol, "BTC/USDT");
        let Json(strategy) = get_strategy(State(ctx.clone()), Path("b".to_string()))
            .await
            .unwrap();
        assert_eq!(strategy.id, "b");

        let Json(stats) = get_stats(State(ctx.clone())).await;
        assert_eq!(stats.strategies.total(), 2);
        assert_eq!(stats.open_orders, 1);
        assert_eq!(stats.unrealized_pnl, 10.0);
        assert_eq!(stats.connected_exchanges, 1);

        let Json(running) =
            get_strategies(State(ctx), Query(StrategyQuery { running: true })).await;
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, "a");
    }

    #[tokio::test]
    async fn test_price_lookup() {
        let ctx = offline_context();
        ctx.store
            .apply(event(r#"{"type":"price","symbol":"BTC-USD","price":50000.0}"#))
            .await;

        let Json(found) = get_price(State(ctx.clone()), Path("BTC-USD".to_string()))
            .await
            .unwrap();
        assert_eq!(found.price, 50000.0);

        let (status, _) = get_price(State(ctx), Path("ETH-USD".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logs_default_limit_and_filter() {
        let ctx = offline_context();
        for (i, level) in ["info", "error", "info"].iter().enumerate() {
            ctx.store
                .apply(event(&format!(
                    r#"{{"type":"log","level":"{}","msg":"m{}","source":"engine","timestamp":"2024-01-20 14:32:1{}"}}"#,
                    level, i, i
                )))
                .await;
        }

        let Json(all) = get_logs(State(ctx.clone()), Query(LogQuery::default())).await;
        assert_eq!(all.len(), 3);

        let Json(errors) = get_logs(
            State(ctx),
            Query(LogQuery {
                level: Some(LogLevel::Error),
                ..LogQuery::default()
            }),
        )
        .await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "m1");
    }

    #[tokio::test]
    async fn test_command_while_offline_is_unavailable_and_queued() {
        let ctx = offline_context();
        let mut notifications = ctx.coordinator.subscribe_notifications();

        let (status, Json(body)) =
            strategy_action(State(ctx.clone()), Path(("s1".into(), "start".into())))
                .await
                .unwrap_err();

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.error.starts_with("Failed to start strategy"));
        assert_eq!(ctx.client.queued_commands().await, 1);
        let note = notifications.recv().await.unwrap();
        assert_eq!(note.message, body.error);
    }

    #[tokio::test]
    async fn test_unknown_strategy_action_is_not_sent() {
        let ctx = offline_context();
        let (status, _) = strategy_action(State(ctx.clone()), Path(("s1".into(), "explode".into())))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(ctx.client.queued_commands().await, 0);
    }

    #[tokio::test]
    async fn test_limit_order_without_price_rejected() {
        let ctx = offline_context();
        let req = PlaceOrderRequest {
            symbol: "BTC-USD".into(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            price: None,
            size: 1.0,
        };
        let (status, _) = place_order(State(ctx.clone()), Json(req)).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(ctx.client.queued_commands().await, 0);
    }
}
