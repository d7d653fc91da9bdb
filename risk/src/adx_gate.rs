//! Entry-time trend filter: rejects choppy or weakening markets before a signal
//! reaches the rest of the veto chain.

use perpbot_strategy::AdxTrend;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdxGateConfig {
    pub min_adx: f64,
}

impl Default for AdxGateConfig {
    fn default() -> Self {
        Self { min_adx: 25.0 }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum AdxGateRejection {
    InvalidAdx,
    BelowThreshold,
    Falling,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdxEntryGate {
    config: AdxGateConfig,
}

impl AdxEntryGate {
    pub fn new(config: AdxGateConfig) -> Self {
        Self { config }
    }

    /// `adx` must be a valid, finite value in `(0, 100]`, at least `min_adx`, and
    /// not on a strictly falling trend.
    pub fn check(&self, adx: f64, trend: AdxTrend) -> Result<(), AdxGateRejection> {
        if !adx.is_finite() || adx <= 0.0 || adx > 100.0 {
            return Err(AdxGateRejection::InvalidAdx);
        }
        if adx < self.config.min_adx {
            return Err(AdxGateRejection::BelowThreshold);
        }
        if trend == AdxTrend::Falling {
            return Err(AdxGateRejection::Falling);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_choppy_market() {
        let gate = AdxEntryGate::new(AdxGateConfig::default());
        assert_eq!(gate.check(15.0, AdxTrend::Stable), Err(AdxGateRejection::BelowThreshold));
    }

    #[test]
    fn rejects_falling_momentum_even_above_threshold() {
        let gate = AdxEntryGate::new(AdxGateConfig::default());
        assert_eq!(gate.check(30.0, AdxTrend::Falling), Err(AdxGateRejection::Falling));
    }

    #[test]
    fn passes_strong_rising_trend() {
        let gate = AdxEntryGate::new(AdxGateConfig::default());
        assert_eq!(gate.check(30.0, AdxTrend::Rising), Ok(()));
    }
}
