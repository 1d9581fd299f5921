use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::events::{OrderStatus, OrderUpdateEvent, Side};

/// Locally tracked order, merged from successive `order_update` events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "orderId")]
    pub order_id: String,
    pub status: OrderStatus,
    pub filled: f64,
    pub remaining: f64,
    pub price: f64,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Engine-side event time (epoch milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn from_update(event: OrderUpdateEvent, now: DateTime<Utc>) -> Self {
        let mut order = Self {
            order_id: event.order_id.clone(),
            status: OrderStatus::default(),
            filled: 0.0,
            remaining: 0.0,
            price: 0.0,
            symbol: String::new(),
            side: None,
            strategy: None,
            timestamp: None,
            created_at: now,
            updated_at: now,
        };
        order.merge(event, now);
        order
    }

    /// Overwrite the fields the event carries; keep everything else.
    pub fn merge(&mut self, event: OrderUpdateEvent, now: DateTime<Utc>) {
        if let Some(status) = event.status {
            self.status = status;
        }
        if let Some(filled) = event.filled {
            self.filled = filled;
        }
        if let Some(remaining) = event.remaining {
            self.remaining = remaining;
        }
        if let Some(price) = event.price {
            self.price = price;
        }
        if let Some(symbol) = event.symbol {
            self.symbol = symbol;
        }
        if event.side.is_some() {
            self.side = event.side;
        }
        if event.strategy.is_some() {
            self.strategy = event.strategy;
        }
        if event.timestamp.is_some() {
            self.timestamp = event.timestamp;
        }
        self.updated_at = now;
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn update(order_id: &str) -> OrderUpdateEvent {
        OrderUpdateEvent {
            order_id: order_id.to_string(),
            status: None,
            filled: None,
            remaining: None,
            price: None,
            symbol: None,
            side: None,
            strategy: None,
            timestamp: None,
        }
    }

    #[test]
    fn test_from_update_uses_defaults_for_missing_fields() {
        let now = Utc::now();
        let order = Order::from_update(update("o-1"), now);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.filled, 0.0);
        assert!(order.side.is_none());
        assert_eq!(order.created_at, now);
    }

    #[test]
    fn test_merge_overwrites_only_present_fields() {
        let t0 = Utc::now();
        let mut first = update("o-1");
        first.status = Some(OrderStatus::Pending);
        first.price = Some(100.0);
        first.symbol = Some("BTC/USDT".to_string());
        first.side = Some(Side::Buy);
        first.strategy = Some("s1".to_string());
        first.remaining = Some(1.0);
        let mut order = Order::from_update(first, t0);

        let t1 = t0 + Duration::seconds(5);
        let mut second = update("o-1");
        second.status = Some(OrderStatus::Filled);
        second.filled = Some(1.0);
        second.remaining = Some(0.0);
        order.merge(second, t1);

        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled, 1.0);
        assert_eq!(order.remaining, 0.0);
        assert_eq!(order.price, 100.0);
        assert_eq!(order.symbol, "BTC/USDT");
        assert_eq!(order.side, Some(Side::Buy));
        assert_eq!(order.strategy.as_deref(), Some("s1"));
        assert_eq!(order.created_at, t0);
        assert_eq!(order.updated_at, t1);
        assert!(!order.is_open());
    }

    #[test]
    fn test_serialized_order_uses_wire_id_name() {
        let order = Order::from_update(update("o-9"), Utc::now());
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["orderId"], "o-9");
        assert_eq!(json["status"], "pending");
    }
}
