//! Turtle N-unit position sizing: deterministic given `(equity, price, atr)`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizerConfig {
    pub risk_per_trade_pct: f64,
    pub atr_multiplier: f64,
    pub max_position_usdt: f64,
    pub min_quantity_usdt: f64,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_pct: 0.01,
            atr_multiplier: 2.0,
            max_position_usdt: 10_000.0,
            min_quantity_usdt: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum SizingRejection {
    InvalidInput,
    BelowMinimum,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sizing {
    pub quantity: f64,
    pub position_value_usdt: f64,
    pub risk_amount_usdt: f64,
    pub stop_distance: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PositionSizer {
    config: SizerConfig,
}

impl PositionSizer {
    pub fn new(config: SizerConfig) -> Self {
        Self { config }
    }

    pub fn size(&self, equity: f64, price: f64, atr: f64) -> Result<Sizing, SizingRejection> {
        if !(equity.is_finite() && price.is_finite() && atr.is_finite()) || equity <= 0.0 || price <= 0.0 {
            return Err(SizingRejection::InvalidInput);
        }

        let risk_amount = equity * self.config.risk_per_trade_pct;
        let atr_effective = atr.max(price * 0.005);
        let stop_distance = atr_effective * self.config.atr_multiplier;
        if stop_distance <= 0.0 {
            return Err(SizingRejection::InvalidInput);
        }

        let mut position_value = risk_amount / stop_distance;
        position_value = position_value.min(self.config.max_position_usdt);
        let quantity = position_value / price;

        if position_value < self.config.min_quantity_usdt {
            return Err(SizingRejection::BelowMinimum);
        }

        Ok(Sizing {
            quantity,
            position_value_usdt: position_value,
            risk_amount_usdt: risk_amount,
            stop_distance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_within_risk_budget() {
        let sizer = PositionSizer::new(SizerConfig::default());
        let sizing = sizer.size(100_000.0, 50_000.0, 500.0).expect("valid inputs size");
        assert!(sizing.quantity > 0.0);
        assert!(sizing.position_value_usdt <= SizerConfig::default().max_position_usdt);
    }

    #[test]
    fn falls_back_to_price_based_atr_floor() {
        let sizer = PositionSizer::new(SizerConfig::default());
        let sizing = sizer.size(100_000.0, 50_000.0, 0.0001).expect("tiny atr still sizes via floor");
        assert!(sizing.stop_distance > 0.0);
    }

    #[test]
    fn rejects_non_finite_equity() {
        let sizer = PositionSizer::new(SizerConfig::default());
        assert_eq!(sizer.size(f64::NAN, 100.0, 1.0), Err(SizingRejection::InvalidInput));
    }

    #[test]
    fn rejects_below_minimum_quantity() {
        let config = SizerConfig {
            min_quantity_usdt: 1_000_000.0,
            ..SizerConfig::default()
        };
        let sizer = PositionSizer::new(config);
        assert_eq!(sizer.size(1_000.0, 50_000.0, 500.0), Err(SizingRejection::BelowMinimum));
    }
}
