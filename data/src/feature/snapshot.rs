use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest indicator values for one symbol. Produced fresh by the feature engine on
/// every event; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub close: f64,
    pub high_20: f64,
    pub low_20: f64,
    pub high_55: f64,
    pub low_55: f64,
    pub rsi: f64,
    pub adx: f64,
    pub atr: f64,
    pub atr_pct: f64,
    pub ema_20: f64,
    pub ema_50: f64,
    pub bb_upper: f64,
    pub bb_mid: f64,
    pub bb_lower: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub volume_sma: f64,
    pub breakout_20_long: bool,
    pub breakout_20_short: bool,
    pub ema_20_above_ema_50: bool,
    pub timestamp: DateTime<Utc>,
}

impl FeatureSnapshot {
    /// All numerics finite-checked; any violation indicates a bug upstream since
    /// every producing indicator already guards its own fallback.
    pub fn is_finite(&self) -> bool {
        [
            self.close,
            self.high_20,
            self.low_20,
            self.high_55,
            self.low_55,
            self.rsi,
            self.adx,
            self.atr,
            self.atr_pct,
            self.ema_20,
            self.ema_50,
            self.bb_upper,
            self.bb_mid,
            self.bb_lower,
            self.stoch_k,
            self.stoch_d,
            self.volume_sma,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}
