//! Accumulates closed trades into the running counters [`crate::SystemState`]
//! persists (`total_trades`, `winning_trades`, `losing_trades`) and produces a
//! [`TradingSummary`] with the derived performance metrics on demand.

use crate::metric::{ProfitFactor, SharpeRatio, WinRate};
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use perpbot_markets::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One completed round-trip: entry through exit of a single [`crate`] position.
#[derive(Debug, Clone, PartialEq, Constructor, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: Symbol,
    pub pnl_realised: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.pnl_realised.is_sign_positive() && !self.pnl_realised.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradingSummary {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub win_rate: Option<WinRate>,
    pub profit_factor: Option<ProfitFactor>,
    pub sharpe_ratio: Option<SharpeRatio>,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub net_pnl: Decimal,
}

/// Accumulates [`ClosedTrade`]s as they arrive and generates a [`TradingSummary`]
/// on request; the orchestrator feeds this every time a position closes.
#[derive(Debug, Clone, Default)]
pub struct TradingSummaryGenerator {
    risk_free_return: Decimal,
    trades: Vec<ClosedTrade>,
}

impl TradingSummaryGenerator {
    pub fn new(risk_free_return: Decimal) -> Self {
        Self { risk_free_return, trades: Vec::new() }
    }

    pub fn record(&mut self, trade: ClosedTrade) {
        self.trades.push(trade);
    }

    pub fn generate(&self) -> TradingSummary {
        let total_trades = self.trades.len() as u64;
        let winning_trades = self.trades.iter().filter(|t| t.is_win()).count() as u64;
        let losing_trades = total_trades - winning_trades;

        let gross_profit: Decimal =
            self.trades.iter().map(|t| t.pnl_realised).filter(|p| p.is_sign_positive()).sum();
        let gross_loss: Decimal =
            self.trades.iter().map(|t| t.pnl_realised).filter(|p| p.is_sign_negative()).sum::<Decimal>().abs();
        let net_pnl: Decimal = self.trades.iter().map(|t| t.pnl_realised).sum();

        let returns: Vec<Decimal> = self.trades.iter().map(|t| t.pnl_realised).collect();
        let (mean_return, std_dev_return) = SharpeRatio::mean_and_std_dev(&returns);
        let sharpe_ratio =
            (!self.trades.is_empty()).then(|| SharpeRatio::calculate(self.risk_free_return, mean_return, std_dev_return));

        TradingSummary {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate: WinRate::calculate(Decimal::from(winning_trades), Decimal::from(total_trades)),
            profit_factor: ProfitFactor::calculate(gross_profit, gross_loss),
            sharpe_ratio,
            gross_profit,
            gross_loss,
            net_pnl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trade(symbol: &str, pnl: Decimal) -> ClosedTrade {
        ClosedTrade::new(Symbol::from(symbol), pnl, Utc::now(), Utc::now())
    }

    #[test]
    fn empty_generator_has_no_metrics() {
        let summary = TradingSummaryGenerator::new(dec!(0)).generate();
        assert_eq!(summary.total_trades, 0);
        assert!(summary.win_rate.is_none());
        assert!(summary.profit_factor.is_none());
        assert!(summary.sharpe_ratio.is_none());
    }

    #[test]
    fn tracks_wins_losses_and_net_pnl() {
        let mut generator = TradingSummaryGenerator::new(dec!(0));
        generator.record(trade("BTCUSDT", dec!(100)));
        generator.record(trade("BTCUSDT", dec!(-40)));
        generator.record(trade("ETHUSDT", dec!(20)));

        let summary = generator.generate();
        assert_eq!(summary.total_trades, 3);
        assert_eq!(summary.winning_trades, 2);
        assert_eq!(summary.losing_trades, 1);
        assert_eq!(summary.net_pnl, dec!(80));
        assert_eq!(summary.gross_profit, dec!(120));
        assert_eq!(summary.gross_loss, dec!(40));
        assert_eq!(summary.profit_factor.unwrap().value, dec!(3));
    }
}
