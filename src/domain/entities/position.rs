use serde::{Deserialize, Serialize};

use crate::domain::events::PositionEvent;

/// Open position, one per symbol (last write wins)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Signed size: positive long, negative short
    pub size: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Label derived from the symbol's quote segment
    pub exchange: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// `BTC/USDT` -> `USDT`; anything without a quote segment -> `unknown`
pub fn derive_exchange_label(symbol: &str) -> String {
    match symbol.split('/').nth(1) {
        Some(quote) if !quote.is_empty() => quote.to_string(),
        _ => "unknown".to_string(),
    }
}

impl From<PositionEvent> for Position {
    fn from(event: PositionEvent) -> Self {
        let exchange = derive_exchange_label(&event.symbol);
        Self {
            symbol: event.symbol,
            size: event.size,
            entry_price: event.entry_price,
            current_price: event.current_price,
            pnl: event.pnl,
            pnl_percent: event.pnl_percent,
            strategy: event.strategy,
            exchange,
            timestamp: event.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_label_from_symbol() {
        assert_eq!(derive_exchange_label("BTC/USDT"), "USDT");
        assert_eq!(derive_exchange_label("BTCUSDT"), "unknown");
        assert_eq!(derive_exchange_label("BTC/"), "unknown");
    }

    #[test]
    fn test_short_position() {
        let position = Position::from(PositionEvent {
            symbol: "ETH/USDT".to_string(),
            size: -2.0,
            entry_price: 2000.0,
            current_price: 1950.0,
            pnl: 100.0,
            pnl_percent: 2.5,
            strategy: None,
            timestamp: None,
        });
        assert_eq!(position.size, -2.0);
        assert_eq!(position.exchange, "USDT");
    }
}
