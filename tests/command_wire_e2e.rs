use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use engine_sync::application::services::CommandDispatcher;
use engine_sync::domain::commands::ApiSecret;
use engine_sync::domain::errors::TransportError;
use engine_sync::domain::events::Side;
use engine_sync::domain::repositories::CommandSink;

#[derive(Default)]
struct WireRecorder {
    frames: Mutex<Vec<String>>,
}

impl WireRecorder {
    fn decoded(&self) -> Vec<Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }
}

#[async_trait]
impl CommandSink for WireRecorder {
    async fn send_text(&self, payload: String) -> Result<(), TransportError> {
        self.frames.lock().unwrap().push(payload);
        Ok(())
    }
}

#[tokio::test]
async fn test_documented_wire_shapes() {
    let wire = Arc::new(WireRecorder::default());
    let dispatcher = CommandDispatcher::new(wire.clone());

    dispatcher.start_strategy("s1").await.unwrap();
    dispatcher
        .place_limit_order("BTC/USDT", Side::Buy, 100.0, 0.01)
        .await
        .unwrap();
    dispatcher.cancel_order("X").await.unwrap();
    dispatcher
        .create_connection("binance", "key", ApiSecret::new("secret"), false)
        .await
        .unwrap();

    assert_eq!(
        wire.decoded(),
        vec![
            json!({"cmd": "start_strategy", "id": "s1"}),
            json!({"cmd": "place_order", "symbol": "BTC/USDT", "side": "buy", "type": "limit", "price": 100.0, "size": 0.01}),
            json!({"cmd": "cancel_order", "order_id": "X"}),
            json!({"cmd": "create_connection", "exchange": "binance", "api_key": "key", "api_secret": "secret", "testnet": false}),
        ]
    );
}

#[tokio::test]
async fn test_optional_fields_are_omitted() {
    let wire = Arc::new(WireRecorder::default());
    let dispatcher = CommandDispatcher::new(wire.clone());

    dispatcher
        .place_market_order("ETH/USDT", Side::Sell, 2.0)
        .await
        .unwrap();
    dispatcher.cancel_all_orders(None).await.unwrap();
    dispatcher.get_orders(None, None, None).await.unwrap();
    dispatcher.start_engine().await.unwrap();

    assert_eq!(
        wire.decoded(),
        vec![
            json!({"cmd": "place_order", "symbol": "ETH/USDT", "side": "sell", "type": "market", "size": 2.0}),
            json!({"cmd": "cancel_all_orders"}),
            json!({"cmd": "get_orders"}),
            json!({"cmd": "start_engine"}),
        ]
    );
}
