//! Ordered, first-rejection-wins veto chain. Runs after the ADX gate and the
//! position sizer have produced a candidate quantity, and is strictly read-only
//! over the context it is handed: it never adjusts quantity or price itself.

use derive_more::Constructor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum VetoStage {
    PositionSize,
    MaxPositions,
    Correlation,
    Drawdown,
    DailyLoss,
}

/// Read-only snapshot of the account/portfolio state the veto chain checks
/// against. Never mutated by the chain.
#[derive(Debug, Clone, Copy, Constructor)]
pub struct RiskContext {
    pub open_position_count: usize,
    pub is_new_symbol: bool,
    pub correlated_exposure_pct: f64,
    pub current_drawdown_pct: f64,
    pub daily_pnl_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VetoConfig {
    pub max_position_size_usdt: f64,
    pub max_positions: usize,
    pub max_correlation_exposure_pct: f64,
    pub max_drawdown_pct: f64,
    pub daily_loss_limit_pct: f64,
}

impl Default for VetoConfig {
    fn default() -> Self {
        Self {
            max_position_size_usdt: 10_000.0,
            max_positions: 5,
            max_correlation_exposure_pct: 50.0,
            max_drawdown_pct: 15.0,
            daily_loss_limit_pct: 5.0,
        }
    }
}

/// Wraps a value that cleared every veto stage.
#[derive(Debug, Clone, Copy, PartialEq, Constructor)]
pub struct RiskApproved<T>(pub T);

/// A rejection at a specific stage, carrying a human-readable reason for logging
/// and notification.
#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct RiskRefused {
    pub stage: VetoStage,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PreTradeVetoChain {
    config: VetoConfig,
}

impl PreTradeVetoChain {
    pub fn new(config: VetoConfig) -> Self {
        Self { config }
    }

    /// Evaluate `quantity * price` against the chain. The first failing stage is
    /// terminal; an upstream signal cannot override the rejection.
    pub fn evaluate(
        &self,
        context: &RiskContext,
        quantity: f64,
        price: f64,
    ) -> Result<RiskApproved<(f64, f64)>, RiskRefused> {
        let position_value = quantity * price;

        if position_value > self.config.max_position_size_usdt {
            return Err(RiskRefused::new(
                VetoStage::PositionSize,
                format!(
                    "position size ${position_value:.2} exceeds limit ${:.2}",
                    self.config.max_position_size_usdt
                ),
            ));
        }

        if context.is_new_symbol && context.open_position_count >= self.config.max_positions {
            return Err(RiskRefused::new(
                VetoStage::MaxPositions,
                format!("maximum positions ({}) already open", self.config.max_positions),
            ));
        }

        if context.correlated_exposure_pct > self.config.max_correlation_exposure_pct {
            return Err(RiskRefused::new(
                VetoStage::Correlation,
                format!(
                    "correlated exposure {:.2}% exceeds limit {:.2}%",
                    context.correlated_exposure_pct, self.config.max_correlation_exposure_pct
                ),
            ));
        }

        if context.current_drawdown_pct >= self.config.max_drawdown_pct {
            return Err(RiskRefused::new(
                VetoStage::Drawdown,
                format!(
                    "current drawdown {:.2}% exceeds limit {:.2}%",
                    context.current_drawdown_pct, self.config.max_drawdown_pct
                ),
            ));
        }

        if context.daily_pnl_pct <= -self.config.daily_loss_limit_pct {
            return Err(RiskRefused::new(
                VetoStage::DailyLoss,
                format!(
                    "daily loss {:.2}% exceeds limit -{:.2}%",
                    context.daily_pnl_pct, self.config.daily_loss_limit_pct
                ),
            ));
        }

        Ok(RiskApproved::new((quantity, price)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RiskContext {
        RiskContext::new(1, true, 0.0, 2.0, 0.5)
    }

    #[test]
    fn approves_within_all_limits() {
        let chain = PreTradeVetoChain::new(VetoConfig::default());
        assert!(chain.evaluate(&context(), 0.1, 50_000.0).is_ok());
    }

    #[test]
    fn rejects_oversize_position() {
        let chain = PreTradeVetoChain::new(VetoConfig::default());
        let result = chain.evaluate(&context(), 10.0, 50_000.0);
        assert_eq!(result.unwrap_err().stage, VetoStage::PositionSize);
    }

    #[test]
    fn rejects_when_max_positions_reached_for_new_symbol() {
        let chain = PreTradeVetoChain::new(VetoConfig::default());
        let ctx = RiskContext::new(5, true, 0.0, 2.0, 0.5);
        let result = chain.evaluate(&ctx, 0.1, 50_000.0);
        assert_eq!(result.unwrap_err().stage, VetoStage::MaxPositions);
    }

    #[test]
    fn max_positions_does_not_block_adding_to_existing_symbol() {
        let chain = PreTradeVetoChain::new(VetoConfig::default());
        let ctx = RiskContext::new(5, false, 0.0, 2.0, 0.5);
        assert!(chain.evaluate(&ctx, 0.1, 50_000.0).is_ok());
    }

    #[test]
    fn rejects_at_drawdown_limit() {
        let chain = PreTradeVetoChain::new(VetoConfig::default());
        let ctx = RiskContext::new(1, true, 0.0, 20.0, 0.5);
        assert_eq!(chain.evaluate(&ctx, 0.1, 50_000.0).unwrap_err().stage, VetoStage::Drawdown);
    }

    #[test]
    fn rejects_at_daily_loss_limit() {
        let chain = PreTradeVetoChain::new(VetoConfig::default());
        let ctx = RiskContext::new(1, true, 0.0, 2.0, -6.0);
        assert_eq!(chain.evaluate(&ctx, 0.1, 50_000.0).unwrap_err().stage, VetoStage::DailyLoss);
    }
}
