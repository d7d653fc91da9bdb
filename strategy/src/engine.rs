//! Evaluates the registered rule catalog under the current regime and folds the
//! result into a single weighted [`TradeSignal`].

use crate::{
    rule::{Rule, RuleType, VetoReason},
    signal::{TradeAction, TradeSignal},
};
use perpbot_data::FeatureSnapshot;
use perpbot_integration::collection::FnvIndexMap;
use perpbot_markets::{Regime, Symbol};
use std::collections::{BTreeMap, BTreeSet};

const DEFAULT_ACTIVATION_THRESHOLD: f64 = 0.7;
const CONFIDENCE_DIVISOR: f64 = 5.0;

/// Per-rule contribution weight, keyed by `strategy_name` (the rule's name). A
/// weight of `1.0` means the rule's raw `bias_score` is used unmodified.
pub type StrategyWeights = FnvIndexMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VetoedRule {
    pub reason: VetoReason,
}

pub struct RuleEngine {
    rules: Vec<Rule>,
    activation_threshold: f64,
    required_features: BTreeSet<&'static str>,
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rules.len())
            .field("activation_threshold", &self.activation_threshold)
            .finish()
    }
}

impl RuleEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        let required_features = rules.iter().flat_map(|rule| rule.required_features.iter().copied()).collect();
        Self {
            rules,
            activation_threshold: DEFAULT_ACTIVATION_THRESHOLD,
            required_features,
        }
    }

    pub fn with_activation_threshold(mut self, threshold: f64) -> Self {
        self.activation_threshold = threshold;
        self
    }

    /// Every `FeatureSnapshot` field read by at least one registered rule;
    /// audited once at startup so a catalog change can't silently depend on a
    /// feature the engine never computes.
    pub fn required_features(&self) -> &BTreeSet<&'static str> {
        &self.required_features
    }

    /// Evaluate every registered rule for `symbol` under `regime`, returning the
    /// resulting signal plus the set of rules vetoed along with their reasons.
    pub fn evaluate(
        &self,
        symbol: &Symbol,
        regime: Regime,
        features: &FeatureSnapshot,
        weights: &StrategyWeights,
    ) -> (TradeSignal, BTreeMap<&'static str, VetoedRule>) {
        let mut total_bias = 0.0;
        let mut active_rules = 0usize;
        let mut vetoed = BTreeMap::new();

        for rule in &self.rules {
            if !rule.allows(regime) {
                vetoed.insert(
                    rule.name,
                    VetoedRule {
                        reason: VetoReason::RegimeNotAllowed,
                    },
                );
                continue;
            }

            if let Some(reason) = sideways_veto(rule, regime) {
                vetoed.insert(rule.name, VetoedRule { reason });
                continue;
            }

            if (rule.condition)(features) {
                let weight = weights.get(rule.name).copied().unwrap_or(1.0);
                total_bias += rule.bias_score * weight;
                active_rules += 1;
            }
        }

        let bias_score = total_bias.clamp(-1.0, 1.0);
        let confidence = (active_rules as f64 / CONFIDENCE_DIVISOR).min(1.0);
        let action = self.action_for(bias_score);

        let signal = TradeSignal {
            symbol: symbol.clone(),
            action,
            bias_score,
            confidence,
            strategy_name: "rule_engine".to_string(),
            regime,
            atr: features.atr,
            suggested_price: features.close,
            metadata: BTreeMap::new(),
        };

        (signal, vetoed)
    }

    fn action_for(&self, bias_score: f64) -> TradeAction {
        if bias_score >= self.activation_threshold {
            TradeAction::ProposeLong
        } else if bias_score <= -self.activation_threshold {
            TradeAction::ProposeShort
        } else {
            TradeAction::Neutral
        }
    }
}

/// In `RANGE`, trend/breakout/combo rules never fire; in `BEAR_TREND`, a long
/// breakout rule never fires.
fn sideways_veto(rule: &Rule, regime: Regime) -> Option<VetoReason> {
    match regime {
        Regime::Range if matches!(rule.rule_type, RuleType::Trend | RuleType::Breakout | RuleType::Combo) => {
            Some(VetoReason::TrendNotAllowedInRange)
        }
        Regime::BearTrend if rule.bias_score > 0.0 && matches!(rule.rule_type, RuleType::Breakout | RuleType::Combo) => {
            Some(VetoReason::LongBreakoutNotAllowedInBearTrend)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;
    use chrono::Utc;

    fn bullish_snapshot() -> FeatureSnapshot {
        FeatureSnapshot {
            close: 110.0,
            high_20: 110.0,
            low_20: 95.0,
            high_55: 120.0,
            low_55: 90.0,
            rsi: 60.0,
            adx: 30.0,
            atr: 2.0,
            atr_pct: 1.0,
            ema_20: 105.0,
            ema_50: 100.0,
            bb_upper: 108.0,
            bb_mid: 100.0,
            bb_lower: 92.0,
            stoch_k: 55.0,
            stoch_d: 55.0,
            volume_sma: 10.0,
            breakout_20_long: true,
            breakout_20_short: false,
            ema_20_above_ema_50: true,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn strong_bull_confluence_proposes_long() {
        let engine = RuleEngine::new(default_catalog());
        let symbol = Symbol::new("BTCUSDT");
        let (signal, _) = engine.evaluate(&symbol, Regime::BullTrend, &bullish_snapshot(), &StrategyWeights::default());
        assert_eq!(signal.action, TradeAction::ProposeLong);
        assert!(signal.bias_score > 0.0);
    }

    #[test]
    fn range_regime_vetoes_trend_and_breakout_rules() {
        let engine = RuleEngine::new(default_catalog());
        let symbol = Symbol::new("BTCUSDT");
        let (_, vetoed) = engine.evaluate(&symbol, Regime::Range, &bullish_snapshot(), &StrategyWeights::default());
        assert_eq!(
            vetoed.get("combo_trend_breakout_long").map(|v| v.reason),
            Some(VetoReason::TrendNotAllowedInRange)
        );
    }

    #[test]
    fn bear_trend_vetoes_long_breakout() {
        let engine = RuleEngine::new(default_catalog());
        let symbol = Symbol::new("BTCUSDT");
        let (_, vetoed) = engine.evaluate(&symbol, Regime::BearTrend, &bullish_snapshot(), &StrategyWeights::default());
        assert_eq!(
            vetoed.get("donchian_breakout_long").map(|v| v.reason),
            Some(VetoReason::LongBreakoutNotAllowedInBearTrend)
        );
    }

    #[test]
    fn neutral_when_no_confluence() {
        let engine = RuleEngine::new(default_catalog());
        let symbol = Symbol::new("BTCUSDT");
        let flat = FeatureSnapshot {
            rsi: 50.0,
            adx: 15.0,
            breakout_20_long: false,
            breakout_20_short: false,
            stoch_k: 50.0,
            stoch_d: 50.0,
            close: 100.0,
            bb_upper: 105.0,
            bb_lower: 95.0,
            ..bullish_snapshot()
        };
        let (signal, _) = engine.evaluate(&symbol, Regime::Unknown, &flat, &StrategyWeights::default());
        assert_eq!(signal.action, TradeAction::Neutral);
    }

    #[test]
    fn required_features_is_the_union_across_the_catalog() {
        let engine = RuleEngine::new(default_catalog());
        let features = engine.required_features();
        assert!(features.contains("rsi"));
        assert!(features.contains("adx"));
        assert!(features.contains("stoch_k"));
    }
}
