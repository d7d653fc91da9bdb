//! The fixed rule catalog registered once at startup: breakout, RSI reversal, EMA
//! cross, Bollinger, stochastic, and combo rules.

use crate::rule::{Rule, RuleType};
use perpbot_markets::Regime;
use std::collections::BTreeSet;

const ADX_TREND_THRESHOLD: f64 = 25.0;

fn all_regimes() -> BTreeSet<Regime> {
    [Regime::BullTrend, Regime::BearTrend, Regime::Range, Regime::Unknown]
        .into_iter()
        .collect()
}

/// Builds the default rule catalog. Registered once at startup; rules are
/// immutable thereafter.
pub fn default_catalog() -> Vec<Rule> {
    vec![
        Rule {
            name: "donchian_breakout_long",
            rule_type: RuleType::Breakout,
            bias_score: 0.3,
            allowed_regimes: all_regimes(),
            required_features: &["breakout_20_long"],
            condition: Box::new(|f| f.breakout_20_long),
        },
        Rule {
            name: "donchian_breakout_short",
            rule_type: RuleType::Breakout,
            bias_score: -0.3,
            allowed_regimes: all_regimes(),
            required_features: &["breakout_20_short"],
            condition: Box::new(|f| f.breakout_20_short),
        },
        Rule {
            name: "rsi_oversold_reversal",
            rule_type: RuleType::MeanReversion,
            bias_score: 0.25,
            allowed_regimes: all_regimes(),
            required_features: &["rsi"],
            condition: Box::new(|f| f.rsi < 30.0),
        },
        Rule {
            name: "rsi_overbought_reversal",
            rule_type: RuleType::MeanReversion,
            bias_score: -0.25,
            allowed_regimes: all_regimes(),
            required_features: &["rsi"],
            condition: Box::new(|f| f.rsi > 70.0),
        },
        Rule {
            name: "ema_cross_bull",
            rule_type: RuleType::Trend,
            bias_score: 0.3,
            allowed_regimes: all_regimes(),
            required_features: &["ema_20_above_ema_50", "adx"],
            condition: Box::new(|f| f.ema_20_above_ema_50 && f.adx > ADX_TREND_THRESHOLD),
        },
        Rule {
            name: "ema_cross_bear",
            rule_type: RuleType::Trend,
            bias_score: -0.3,
            allowed_regimes: all_regimes(),
            required_features: &["ema_20_above_ema_50", "adx"],
            condition: Box::new(|f| !f.ema_20_above_ema_50 && f.adx > ADX_TREND_THRESHOLD),
        },
        Rule {
            name: "bollinger_lower_reversion",
            rule_type: RuleType::MeanReversion,
            bias_score: 0.2,
            allowed_regimes: all_regimes(),
            required_features: &["close", "bb_lower"],
            condition: Box::new(|f| f.close <= f.bb_lower),
        },
        Rule {
            name: "bollinger_upper_reversion",
            rule_type: RuleType::MeanReversion,
            bias_score: -0.2,
            allowed_regimes: all_regimes(),
            required_features: &["close", "bb_upper"],
            condition: Box::new(|f| f.close >= f.bb_upper),
        },
        Rule {
            name: "stochastic_oversold",
            rule_type: RuleType::MeanReversion,
            bias_score: 0.15,
            allowed_regimes: all_regimes(),
            required_features: &["stoch_k", "stoch_d"],
            condition: Box::new(|f| f.stoch_k < 20.0 && f.stoch_d < 20.0),
        },
        Rule {
            name: "stochastic_overbought",
            rule_type: RuleType::MeanReversion,
            bias_score: -0.15,
            allowed_regimes: all_regimes(),
            required_features: &["stoch_k", "stoch_d"],
            condition: Box::new(|f| f.stoch_k > 80.0 && f.stoch_d > 80.0),
        },
        Rule {
            name: "combo_trend_breakout_long",
            rule_type: RuleType::Combo,
            bias_score: 0.4,
            allowed_regimes: all_regimes(),
            required_features: &["breakout_20_long", "ema_20_above_ema_50", "adx"],
            condition: Box::new(|f| f.breakout_20_long && f.ema_20_above_ema_50 && f.adx > ADX_TREND_THRESHOLD),
        },
        Rule {
            name: "combo_trend_breakout_short",
            rule_type: RuleType::Combo,
            bias_score: -0.4,
            allowed_regimes: all_regimes(),
            required_features: &["breakout_20_short", "ema_20_above_ema_50", "adx"],
            condition: Box::new(|f| f.breakout_20_short && !f.ema_20_above_ema_50 && f.adx > ADX_TREND_THRESHOLD),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_one_rule_per_direction_family() {
        let catalog = default_catalog();
        assert!(catalog.iter().any(|r| r.name == "donchian_breakout_long"));
        assert!(catalog.iter().any(|r| r.name == "combo_trend_breakout_short"));
        assert_eq!(catalog.len(), 12);
    }
}
