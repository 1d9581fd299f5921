use engine_sync::domain::entities::StrategyMergePolicy;
use engine_sync::domain::events::{decode_frame, InboundFrame, OrderStatus, StrategyStatus};
use engine_sync::domain::repositories::EventSink;
use engine_sync::domain::services::engine_state::{LOG_CAPACITY, TRADE_CAPACITY};
use engine_sync::domain::services::SharedStore;

/// Feed raw wire frames through the decoder into the store, the same path
/// the transport takes.
async fn feed(store: &SharedStore, frames: &[String]) {
    for frame in frames {
        match decode_frame(frame).unwrap() {
            InboundFrame::Event(event) => store.on_event(event).await,
            other => panic!("expected an event frame, got {:?}", other),
        }
    }
}

fn frames(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_strategy_status_only_update_replaces_record() {
    let store = SharedStore::new(StrategyMergePolicy::Replace);
    feed(
        &store,
        &frames(&[
            r#"{"type":"strategy","id":"s1","name":"PMM","status":"running","exchange":"binance","pair":"BTC/USDT","profit":10.5,"trades":3}"#,
            r#"{"type":"strategy","id":"s1","status":"paused"}"#,
        ]),
    )
    .await;

    let strategies = store.strategies().await;
    assert_eq!(strategies.len(), 1);
    let s1 = &strategies[0];
    assert_eq!(s1.status, StrategyStatus::Paused);
    assert_eq!(s1.profit, 0.0);
    assert_eq!(s1.trades, 0);
    assert!(!s1.created.is_empty());
}

#[tokio::test]
async fn test_strategy_status_only_update_merges_when_configured() {
    let store = SharedStore::new(StrategyMergePolicy::Merge);
    feed(
        &store,
        &frames(&[
            r#"{"type":"strategy","id":"s1","name":"PMM","status":"running","exchange":"binance","pair":"BTC/USDT","profit":10.5,"trades":3}"#,
            r#"{"type":"strategy","id":"s1","status":"paused"}"#,
        ]),
    )
    .await;

    let s1 = store.strategy("s1").await.unwrap();
    assert_eq!(s1.status, StrategyStatus::Paused);
    assert_eq!(s1.profit, 10.5);
    assert_eq!(s1.trades, 3);
    assert_eq!(s1.name, "PMM");
}

#[tokio::test]
async fn test_order_updates_merge_partially() {
    let store = SharedStore::default();
    feed(
        &store,
        &frames(&[
            r#"{"type":"order_update","orderId":"o1","status":"pending","filled":0,"remaining":1.0,"price":100.0,"symbol":"BTC/USDT","side":"buy"}"#,
            r#"{"type":"order_update","orderId":"o1","filled":0.4,"remaining":0.6}"#,
            r#"{"type":"order_update","orderId":"o1","status":"filled","filled":1.0,"remaining":0}"#,
        ]),
    )
    .await;

    let order = store.order("o1").await.unwrap();
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.filled, 1.0);
    assert_eq!(order.remaining, 0.0);
    assert_eq!(order.price, 100.0);
    assert_eq!(order.symbol, "BTC/USDT");
    assert!(order.updated_at >= order.created_at);
}

#[tokio::test]
async fn test_log_window_keeps_newest_oldest_first() {
    let store = SharedStore::default();
    let logs: Vec<String> = (0..LOG_CAPACITY + 100)
        .map(|i| {
            format!(
                r#"{{"type":"log","level":"info","msg":"line {}","source":"engine","timestamp":"t{}"}}"#,
                i, i
            )
        })
        .collect();
    feed(&store, &logs).await;

    let kept = store.recent_logs(usize::MAX).await;
    assert_eq!(kept.len(), LOG_CAPACITY);
    assert_eq!(kept.first().unwrap().message, "line 100");
    assert_eq!(
        kept.last().unwrap().message,
        format!("line {}", LOG_CAPACITY + 99)
    );
}

#[tokio::test]
async fn test_trade_window_keeps_newest_newest_first() {
    let store = SharedStore::default();
    let trades: Vec<String> = (0..TRADE_CAPACITY + 50)
        .map(|i| {
            format!(
                r#"{{"type":"trade","trade_id":"t{}","order_id":"o{}","symbol":"ETH/USDT","price":2000.0,"amount":0.1,"side":"sell","fee":0.01,"timestamp":{}}}"#,
                i, i, 1_700_000_000_000u64 + i as u64
            )
        })
        .collect();
    feed(&store, &trades).await;

    let kept = store.recent_trades(usize::MAX).await;
    assert_eq!(kept.len(), TRADE_CAPACITY);
    assert_eq!(kept[0].trade_id, format!("t{}", TRADE_CAPACITY + 49));
    assert_eq!(kept.last().unwrap().trade_id, "t50");
}

#[tokio::test]
async fn test_reset_clears_every_collection() {
    let store = SharedStore::default();
    feed(
        &store,
        &frames(&[
            r#"{"type":"price","symbol":"BTC/USDT","price":50000.0}"#,
            r#"{"type":"position","symbol":"BTC/USDT","size":0.5,"entry_price":49000.0,"current_price":50000.0,"pnl":500.0,"pnl_percent":2.04}"#,
            r#"{"type":"balance","asset":"USDT","free":900.0,"used":100.0,"total":1000.0,"exchange":"binance"}"#,
            r#"{"type":"connection","exchange":"binance","status":"connected"}"#,
            r#"{"type":"system_status","uptime":3600,"bot_status":"running","active_strategies":2,"total_profit":42.0,"total_trades":7,"success_rate":71.4,"timestamp":1700000000000}"#,
        ]),
    )
    .await;

    let positions = store.positions().await;
    assert_eq!(positions[0].exchange, "USDT");
    assert!(store.read(|s| s.stats().engine_running).await);

    store.reset().await;

    assert!(store.is_empty().await);
    assert_eq!(store.price("BTC/USDT").await, None);
    assert!(store.positions().await.is_empty());
    assert!(store.balances().await.is_empty());
    assert!(store.connections().await.is_empty());
    assert!(store.system_status().await.is_none());
    assert!(!store.read(|s| s.stats().engine_running).await);
}
