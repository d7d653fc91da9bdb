use perpbot_data::FeatureSnapshot;
use perpbot_markets::Regime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum RuleType {
    Trend,
    MeanReversion,
    Breakout,
    Combo,
}

/// A registered rule: an immutable condition over a [`FeatureSnapshot`] plus the
/// bias it contributes when triggered and the regimes it is allowed to fire in.
pub struct Rule {
    pub name: &'static str,
    pub rule_type: RuleType,
    pub bias_score: f64,
    pub allowed_regimes: BTreeSet<Regime>,
    /// `FeatureSnapshot` fields the condition reads; aggregated by the rule
    /// engine at registration so a missing feature can be caught before
    /// evaluation ever runs instead of silently returning a wrong bool.
    pub required_features: &'static [&'static str],
    pub condition: Box<dyn Fn(&FeatureSnapshot) -> bool + Send + Sync>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("rule_type", &self.rule_type)
            .field("bias_score", &self.bias_score)
            .field("allowed_regimes", &self.allowed_regimes)
            .field("required_features", &self.required_features)
            .finish_non_exhaustive()
    }
}

impl Rule {
    pub fn allows(&self, regime: Regime) -> bool {
        self.allowed_regimes.contains(&regime)
    }
}

/// Reason a rule did not contribute to the evaluation for this symbol.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum VetoReason {
    #[serde(rename = "REGIME_NOT_ALLOWED")]
    RegimeNotAllowed,
    #[serde(rename = "TREND_NOT_ALLOWED_IN_RANGE")]
    TrendNotAllowedInRange,
    #[serde(rename = "LONG_BREAKOUT_NOT_ALLOWED_IN_BEAR_TREND")]
    LongBreakoutNotAllowedInBearTrend,
}
