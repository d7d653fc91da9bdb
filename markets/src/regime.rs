use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Classification of recent per-symbol market behaviour, produced by the regime
/// detector and consumed by the rule engine, the pre-trade veto chain, and the
/// exit manager's regime-change guard.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize, Display,
)]
pub enum Regime {
    #[serde(rename = "BULL_TREND")]
    BullTrend,
    #[serde(rename = "BEAR_TREND")]
    BearTrend,
    #[serde(rename = "RANGE")]
    Range,
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl Regime {
    /// The trending regime a [`crate::Side`] expects to stay in for as long as it is held.
    pub fn expected_for(side: crate::Side) -> Self {
        match side {
            crate::Side::Long => Regime::BullTrend,
            crate::Side::Short => Regime::BearTrend,
        }
    }
}

/// Classification of recent realised volatility, derived from `atr_pct`.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize, Display,
)]
pub enum VolatilityRegime {
    Low,
    #[default]
    Normal,
    High,
}
