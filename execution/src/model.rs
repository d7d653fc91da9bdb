//! Wire-level request/response shapes for the exchange REST and user-data WS
//! surfaces. Kept close to the exchange's own field names; callers convert to/from
//! the workspace's domain types at the client boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum OrderSide {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum PositionSide {
    #[serde(rename = "LONG")]
    Long,
    #[serde(rename = "SHORT")]
    Short,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum WorkingType {
    #[serde(rename = "CONTRACT_PRICE")]
    ContractPrice,
    #[serde(rename = "MARK_PRICE")]
    MarkPrice,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "MARKET")]
    Market,
    #[serde(rename = "STOP_MARKET")]
    StopMarket,
    #[serde(rename = "TAKE_PROFIT_MARKET")]
    TakeProfitMarket,
    #[serde(rename = "TRAILING_STOP_MARKET")]
    TrailingStopMarket,
}

/// A single `(step_size, tick_size)` filter pair for one symbol, used to round
/// order quantity and price to the exchange's accepted increments.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SymbolFilter {
    pub step_size: f64,
    pub tick_size: f64,
}

impl SymbolFilter {
    pub fn round_quantity(&self, quantity: f64) -> f64 {
        round_to_step(quantity, self.step_size)
    }

    pub fn round_price(&self, price: f64) -> f64 {
        round_to_step(price, self.tick_size)
    }
}

fn round_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    (value / step).round() * step
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(rename = "filters")]
    pub filters: Vec<RawFilter>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "filterType")]
pub enum RawFilter {
    #[serde(rename = "LOT_SIZE")]
    LotSize {
        #[serde(rename = "stepSize")]
        step_size: String,
    },
    #[serde(rename = "PRICE_FILTER")]
    PriceFilter {
        #[serde(rename = "tickSize")]
        tick_size: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AccountBalance {
    pub available_balance: f64,
    pub used_margin: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExchangePosition {
    pub symbol: String,
    pub position_side: PositionSide,
    pub quantity: f64,
    pub entry_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub position_side: PositionSide,
    pub order_type: OrderType,
    pub quantity: Option<f64>,
    pub stop_price: Option<f64>,
    pub working_type: Option<WorkingType>,
    pub close_position: bool,
    pub reduce_only: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: String,
}

/// Result of an order-manager operation; mirrors the "no exceptions across
/// component boundaries" rule - callers always get a discriminated outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResult {
    pub success: bool,
    pub order_id: Option<String>,
    pub error: Option<String>,
}

impl OrderResult {
    pub fn ok(order_id: impl Into<String>) -> Self {
        Self { success: true, order_id: Some(order_id.into()), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, order_id: None, error: Some(error.into()) }
    }
}

/// One closed historical bar as returned by the klines REST endpoint, used to
/// seed the feature engine at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoricalKline {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListenKeyResponse {
    #[serde(rename = "listenKey")]
    pub listen_key: String,
}

/// Parsed user-data stream event; the envelope carries an `"e"` discriminator the
/// exchange uses to tag the payload shape.
#[derive(Debug, Clone, PartialEq)]
pub enum UserDataEvent {
    OrderTradeUpdate { symbol: String, order_id: String, status: String, event_time: DateTime<Utc> },
    AccountUpdate { event_time: DateTime<Utc> },
    ListenKeyExpired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_quantity_and_price_to_exchange_step() {
        let filter = SymbolFilter { step_size: 0.001, tick_size: 0.1 };
        assert!((filter.round_quantity(0.12345) - 0.123).abs() < 1e-9);
        assert!((filter.round_price(50123.37) - 50123.4).abs() < 1e-9);
    }

    #[test]
    fn zero_step_leaves_value_unrounded() {
        let filter = SymbolFilter { step_size: 0.0, tick_size: 0.0 };
        assert_eq!(filter.round_quantity(1.23456), 1.23456);
    }
}
