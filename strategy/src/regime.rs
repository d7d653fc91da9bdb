//! Maps a stream of [`FeatureSnapshot`]s to a sticky per-symbol [`Regime`], plus a
//! [`VolatilityRegime`] classified independently on every observation.

use perpbot_data::FeatureSnapshot;
use perpbot_integration::collection::FnvIndexMap;
use perpbot_markets::{Regime, Symbol, VolatilityRegime};
use std::collections::VecDeque;
use tracing::info;

const ADX_TREND_THRESHOLD: f64 = 25.0;
const ADX_RANGE_THRESHOLD: f64 = 20.0;
const VOLATILITY_HIGH_PCT: f64 = 1.5;
const VOLATILITY_LOW_PCT: f64 = 0.5;

/// History depth kept per symbol; must cover the longest confirmation window in use.
const HISTORY_CAPACITY: usize = 10;

/// Direction of the ADX trend over the last 3 observations.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AdxTrend {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, Copy)]
struct Observation {
    adx: f64,
    ema_20_above_ema_50: bool,
}

#[derive(Debug, Clone)]
struct SymbolRegimeState {
    regime: Regime,
    history: VecDeque<Observation>,
}

impl Default for SymbolRegimeState {
    fn default() -> Self {
        Self {
            regime: Regime::Unknown,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }
}

/// Confirmation lengths for each regime transition. Defaults per the rule set:
/// `k_bull`/`k_bear` require sustained trend strength; `k_range` is shorter since
/// chop is easier to confirm than a reversal.
#[derive(Debug, Clone, Copy)]
pub struct RegimeThresholds {
    pub k_bull: usize,
    pub k_bear: usize,
    pub k_range: usize,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            k_bull: 3,
            k_bear: 3,
            k_range: 5,
        }
    }
}

/// Per-symbol sticky regime classifier.
#[derive(Debug, Clone)]
pub struct RegimeDetector {
    thresholds: RegimeThresholds,
    symbols: FnvIndexMap<Symbol, SymbolRegimeState>,
}

impl RegimeDetector {
    pub fn new(thresholds: RegimeThresholds) -> Self {
        Self {
            thresholds,
            symbols: FnvIndexMap::default(),
        }
    }

    pub fn regime(&self, symbol: &Symbol) -> Regime {
        self.symbols.get(symbol).map(|s| s.regime).unwrap_or_default()
    }

    /// ADX trend over the last 3 observations: strictly decreasing is `Falling`,
    /// strictly increasing is `Rising`, anything else (including insufficient
    /// history) is `Stable`. Shared by the ADX entry gate and the exit manager's
    /// momentum-loss check so both read the same rolling history.
    pub fn adx_trend(&self, symbol: &Symbol) -> AdxTrend {
        let Some(state) = self.symbols.get(symbol) else {
            return AdxTrend::Stable;
        };
        let last3: Vec<f64> = state.history.iter().rev().take(3).map(|o| o.adx).collect();
        if last3.len() < 3 {
            return AdxTrend::Stable;
        }
        if last3[0] < last3[1] && last3[1] < last3[2] {
            AdxTrend::Falling
        } else if last3[0] > last3[1] && last3[1] > last3[2] {
            AdxTrend::Rising
        } else {
            AdxTrend::Stable
        }
    }

    /// Fold in a new observation, returning `(regime, volatility)` for this symbol.
    pub fn observe(&mut self, symbol: &Symbol, snapshot: &FeatureSnapshot) -> (Regime, VolatilityRegime) {
        let state = self.symbols.entry(symbol.clone()).or_default();

        if state.history.len() == HISTORY_CAPACITY {
            state.history.pop_front();
        }
        state.history.push_back(Observation {
            adx: snapshot.adx,
            ema_20_above_ema_50: snapshot.ema_20_above_ema_50,
        });

        let next = Self::classify(&state.history, self.thresholds);
        if next != state.regime {
            info!(%symbol, from = ?state.regime, to = ?next, "regime transition");
            state.regime = next;
        }

        let volatility = classify_volatility(snapshot.atr_pct);
        (state.regime, volatility)
    }

    fn classify(history: &VecDeque<Observation>, thresholds: RegimeThresholds) -> Regime {
        if Self::last_n_satisfy(history, thresholds.k_bull, |o| {
            o.adx > ADX_TREND_THRESHOLD && o.ema_20_above_ema_50
        }) {
            return Regime::BullTrend;
        }
        if Self::last_n_satisfy(history, thresholds.k_bear, |o| {
            o.adx > ADX_TREND_THRESHOLD && !o.ema_20_above_ema_50
        }) {
            return Regime::BearTrend;
        }
        if Self::last_n_satisfy(history, thresholds.k_range, |o| o.adx < ADX_RANGE_THRESHOLD) {
            return Regime::Range;
        }
        history.back().map_or(Regime::Unknown, |_| Regime::Unknown)
    }

    fn last_n_satisfy(history: &VecDeque<Observation>, n: usize, pred: impl Fn(&Observation) -> bool) -> bool {
        if history.len() < n || n == 0 {
            return false;
        }
        history.iter().rev().take(n).all(pred)
    }
}

fn classify_volatility(atr_pct: f64) -> VolatilityRegime {
    if atr_pct > VOLATILITY_HIGH_PCT {
        VolatilityRegime::High
    } else if atr_pct < VOLATILITY_LOW_PCT {
        VolatilityRegime::Low
    } else {
        VolatilityRegime::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(adx: f64, ema_fast_above: bool, atr_pct: f64) -> FeatureSnapshot {
        FeatureSnapshot {
            close: 100.0,
            high_20: 105.0,
            low_20: 95.0,
            high_55: 110.0,
            low_55: 90.0,
            rsi: 50.0,
            adx,
            atr: 1.0,
            atr_pct,
            ema_20: if ema_fast_above { 101.0 } else { 99.0 },
            ema_50: 100.0,
            bb_upper: 102.0,
            bb_mid: 100.0,
            bb_lower: 98.0,
            stoch_k: 50.0,
            stoch_d: 50.0,
            volume_sma: 10.0,
            breakout_20_long: false,
            breakout_20_short: false,
            ema_20_above_ema_50: ema_fast_above,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn starts_unknown() {
        let detector = RegimeDetector::new(RegimeThresholds::default());
        assert_eq!(detector.regime(&Symbol::new("BTCUSDT")), Regime::Unknown);
    }

    #[test]
    fn confirms_bull_trend_after_k_observations() {
        let mut detector = RegimeDetector::new(RegimeThresholds::default());
        let symbol = Symbol::new("BTCUSDT");
        let mut last = (Regime::Unknown, VolatilityRegime::Normal);
        for _ in 0..3 {
            last = detector.observe(&symbol, &snapshot(30.0, true, 1.0));
        }
        assert_eq!(last.0, Regime::BullTrend);
    }

    #[test]
    fn regime_is_sticky_without_confirmation() {
        let mut detector = RegimeDetector::new(RegimeThresholds::default());
        let symbol = Symbol::new("BTCUSDT");
        for _ in 0..3 {
            detector.observe(&symbol, &snapshot(30.0, true, 1.0));
        }
        let (regime, _) = detector.observe(&symbol, &snapshot(10.0, false, 1.0));
        assert_eq!(regime, Regime::BullTrend);
    }

    #[test]
    fn detects_falling_adx_trend() {
        let mut detector = RegimeDetector::new(RegimeThresholds::default());
        let symbol = Symbol::new("BTCUSDT");
        for adx in [30.0, 25.0, 18.0] {
            detector.observe(&symbol, &snapshot(adx, true, 1.0));
        }
        assert_eq!(detector.adx_trend(&symbol), AdxTrend::Falling);
    }

    #[test]
    fn classifies_high_volatility() {
        let mut detector = RegimeDetector::new(RegimeThresholds::default());
        let (_, volatility) = detector.observe(&Symbol::new("BTCUSDT"), &snapshot(30.0, true, 2.0));
        assert_eq!(volatility, VolatilityRegime::High);
    }
}
