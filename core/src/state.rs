//! # SystemState (C13)
//!
//! The persisted aggregate: positions, per-symbol regimes, running counters.
//! Owned exclusively by the orchestrator; every other component receives
//! read-only views or returns values for the orchestrator to fold in.

use chrono::{DateTime, Utc};
use perpbot_integration::collection::FnvIndexMap;
use perpbot_markets::{Regime, Side, Symbol};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum SystemStatus {
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "DEGRADED")]
    Degraded,
    #[serde(rename = "SAFE_MODE")]
    SafeMode,
    #[serde(rename = "HALTED")]
    Halted,
}

/// Per-bar idempotence and context carried alongside a [`Position`] for the
/// exit manager.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitMetadata {
    pub adx_at_entry: f64,
    pub adx_prev: f64,
    pub regime_at_entry: Regime,
    pub last_exit_check_ts: Option<DateTime<Utc>>,
}

impl ExitMetadata {
    pub fn new(adx_at_entry: f64, regime_at_entry: Regime) -> Self {
        Self { adx_at_entry, adx_prev: adx_at_entry, regime_at_entry, last_exit_check_ts: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    pub stop_loss_price: f64,
    pub initial_stop_loss: f64,
    pub take_profit_price: Option<f64>,
    pub stop_order_id: Option<String>,
    pub highest_profit_pct: f64,
    pub break_even_triggered: bool,
    pub trailing_stop_activation_pct: f64,
    pub entry_time: DateTime<Utc>,
    pub regime_at_entry: Regime,
    pub exit_metadata: ExitMetadata,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        symbol: Symbol,
        side: Side,
        quantity: f64,
        entry_price: f64,
        stop_loss_price: f64,
        trailing_stop_activation_pct: f64,
        entry_time: DateTime<Utc>,
        regime_at_entry: Regime,
        adx_at_entry: f64,
    ) -> Self {
        Self {
            symbol,
            side,
            quantity,
            entry_price,
            current_price: entry_price,
            unrealized_pnl: 0.0,
            stop_loss_price,
            initial_stop_loss: stop_loss_price,
            take_profit_price: None,
            stop_order_id: None,
            highest_profit_pct: 0.0,
            break_even_triggered: false,
            trailing_stop_activation_pct,
            entry_time,
            regime_at_entry,
            exit_metadata: ExitMetadata::new(adx_at_entry, regime_at_entry),
        }
    }

    /// Signed return on the position at `price`, as a fraction (not percent).
    pub fn profit_pct(&self, price: f64) -> f64 {
        let raw = (price - self.entry_price) / self.entry_price;
        match self.side {
            Side::Long => raw,
            Side::Short => -raw,
        }
    }

    pub fn mark_to_market(&mut self, price: f64) {
        self.current_price = price;
        let signed_quantity = match self.side {
            Side::Long => self.quantity,
            Side::Short => -self.quantity,
        };
        self.unrealized_pnl = signed_quantity * (price - self.entry_price);
        self.highest_profit_pct = self.highest_profit_pct.max(self.profit_pct(price));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    pub status: SystemStatus,
    pub equity: f64,
    pub peak_equity: f64,
    pub current_drawdown_pct: f64,
    pub daily_pnl: f64,
    pub daily_pnl_pct: f64,
    pub open_positions: FnvIndexMap<Symbol, Position>,
    pub symbol_regimes: FnvIndexMap<Symbol, Regime>,
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub strategy_weights: FnvIndexMap<String, f64>,
    pub last_update: DateTime<Utc>,
}

impl SystemState {
    pub fn starting(equity: f64, now: DateTime<Utc>) -> Self {
        Self {
            status: SystemStatus::Running,
            equity,
            peak_equity: equity,
            current_drawdown_pct: 0.0,
            daily_pnl: 0.0,
            daily_pnl_pct: 0.0,
            open_positions: FnvIndexMap::default(),
            symbol_regimes: FnvIndexMap::default(),
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            strategy_weights: FnvIndexMap::default(),
            last_update: now,
        }
    }

    /// Re-derives `current_drawdown_pct` from `equity`/`peak_equity` and bumps
    /// `peak_equity` if a new high was reached. `peak_equity` only ever
    /// decreases via [`Self::reset_peak_equity`].
    pub fn recompute_equity(&mut self, equity: f64, now: DateTime<Utc>) {
        self.equity = equity;
        self.peak_equity = self.peak_equity.max(equity);
        self.current_drawdown_pct =
            if self.peak_equity > 0.0 { (0.0f64).max((self.peak_equity - equity) / self.peak_equity * 100.0) } else { 0.0 };
        self.last_update = now;
    }

    pub fn reset_peak_equity(&mut self, peak_equity: f64) {
        self.peak_equity = peak_equity;
    }

    pub fn record_closed_trade(&mut self, pnl: f64) {
        self.total_trades += 1;
        if pnl > 0.0 {
            self.winning_trades += 1;
        } else {
            self.losing_trades += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_state_has_zero_drawdown() {
        let now = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let state = SystemState::starting(10_000.0, now);
        assert_eq!(state.current_drawdown_pct, 0.0);
        assert_eq!(state.peak_equity, 10_000.0);
    }

    #[test]
    fn drawdown_tracks_distance_from_peak() {
        let now = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let mut state = SystemState::starting(10_000.0, now);
        state.recompute_equity(9_000.0, now);
        assert!((state.current_drawdown_pct - 10.0).abs() < 1e-9);
        assert_eq!(state.peak_equity, 10_000.0);
    }

    #[test]
    fn peak_equity_never_decreases_from_new_highs() {
        let now = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let mut state = SystemState::starting(10_000.0, now);
        state.recompute_equity(11_000.0, now);
        assert_eq!(state.peak_equity, 11_000.0);
        state.recompute_equity(10_500.0, now);
        assert_eq!(state.peak_equity, 11_000.0);
    }

    #[test]
    fn mark_to_market_tracks_unrealized_pnl_and_high_water_profit() {
        let now = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let mut position =
            Position::open(Symbol::from("BTCUSDT"), Side::Long, 1.0, 100.0, 95.0, 2.0, now, Regime::BullTrend, 30.0);
        position.mark_to_market(110.0);
        assert_eq!(position.unrealized_pnl, 10.0);
        assert!((position.highest_profit_pct - 0.10).abs() < 1e-9);
        position.mark_to_market(105.0);
        assert!((position.highest_profit_pct - 0.10).abs() < 1e-9);
    }
}
