//! Stateful Wilder ADX (Average Directional Index).
//!
//! Maintains Wilder-smoothed `+DM`/`-DM`/`TR`, recomputes `+DI`/`-DI`/`DX` on every
//! bar, then folds `DX` into the running ADX with the same `1/period` smoothing
//! constant Wilder used for the other three series.

use crate::event::OhlcvBar;

/// Fallback value returned before seeding completes or when an update produces a
/// non-finite intermediate result.
pub const ADX_FALLBACK: f64 = 20.0;

#[derive(Debug, Clone, Copy)]
struct PrevBar {
    high: f64,
    low: f64,
    close: f64,
}

#[derive(Debug, Clone)]
pub struct StatefulAdx {
    period: usize,
    prev: Option<PrevBar>,
    smoothed_tr: Option<f64>,
    smoothed_plus_dm: Option<f64>,
    smoothed_minus_dm: Option<f64>,
    adx: Option<f64>,
}

impl StatefulAdx {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev: None,
            smoothed_tr: None,
            smoothed_plus_dm: None,
            smoothed_minus_dm: None,
            adx: None,
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.adx.is_some()
    }

    pub fn value(&self) -> f64 {
        self.adx.unwrap_or(ADX_FALLBACK).clamp(0.0, 100.0)
    }

    /// Seed by walking the full historical window: Wilder's initial `ATR`/`+DM`/`-DM`
    /// are the simple average of the first `period` true ranges, then every
    /// subsequent bar is folded in with Wilder smoothing exactly as `update` does.
    pub fn seed(&mut self, bars: &[OhlcvBar]) {
        if bars.len() < self.period + 1 {
            return;
        }
        *self = Self::new(self.period);
        for bar in bars {
            self.update(bar.high, bar.low, bar.close);
        }
    }

    /// Fold in one new closed bar, returning the updated ADX (clamped to `[0, 100]`).
    pub fn update(&mut self, high: f64, low: f64, close: f64) -> f64 {
        if !(high.is_finite() && low.is_finite() && close.is_finite()) {
            return self.value();
        }

        let Some(prev) = self.prev else {
            self.prev = Some(PrevBar { high, low, close });
            return ADX_FALLBACK;
        };

        let tr = (high - low)
            .max((high - prev.close).abs())
            .max((low - prev.close).abs());

        let up_move = high - prev.high;
        let down_move = prev.low - low;
        let plus_dm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        let minus_dm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };

        let n = self.period as f64;
        self.smoothed_tr = Some(wilder_smooth(self.smoothed_tr, tr, n));
        self.smoothed_plus_dm = Some(wilder_smooth(self.smoothed_plus_dm, plus_dm, n));
        self.smoothed_minus_dm = Some(wilder_smooth(self.smoothed_minus_dm, minus_dm, n));

        let atr = self.smoothed_tr.unwrap_or(0.0);
        let plus_di = if atr > 0.0 {
            100.0 * self.smoothed_plus_dm.unwrap_or(0.0) / atr
        } else {
            0.0
        };
        let minus_di = if atr > 0.0 {
            100.0 * self.smoothed_minus_dm.unwrap_or(0.0) / atr
        } else {
            0.0
        };

        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            100.0 * (plus_di - minus_di).abs() / di_sum
        } else {
            0.0
        };

        self.adx = Some(match self.adx {
            Some(prev_adx) => ((n - 1.0) * prev_adx + dx) / n,
            None => dx,
        });

        self.prev = Some(PrevBar { high, low, close });
        self.value()
    }
}

/// Wilder's smoothing: `smoothed = smoothed - smoothed/n + new`, initialised to `new`.
fn wilder_smooth(prev: Option<f64>, new: f64, n: f64) -> f64 {
    match prev {
        Some(prev) => prev - prev / n + new,
        None => new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(h: f64, l: f64, c: f64) -> OhlcvBar {
        use chrono::Utc;
        OhlcvBar {
            open_time: Utc::now(),
            open: c,
            high: h,
            low: l,
            close: c,
            volume: 1.0,
            is_closed: true,
        }
    }

    #[test]
    fn falls_back_before_seeding() {
        let adx = StatefulAdx::new(14);
        assert_eq!(adx.value(), ADX_FALLBACK);
        assert!(!adx.is_seeded());
    }

    #[test]
    fn stays_within_bounds_and_seeds() {
        let mut bars = Vec::new();
        let mut price = 100.0;
        for i in 0..60 {
            price += if i % 2 == 0 { 1.0 } else { -0.5 };
            bars.push(bar(price + 1.0, price - 1.0, price));
        }
        let mut adx = StatefulAdx::new(14);
        adx.seed(&bars);
        assert!(adx.is_seeded());
        assert!(adx.value() >= 0.0 && adx.value() <= 100.0);
    }

    #[test]
    fn trending_series_drives_adx_up() {
        let mut bars = Vec::new();
        let mut price = 100.0;
        for _ in 0..60 {
            price += 2.0;
            bars.push(bar(price + 0.5, price - 0.5, price));
        }
        let mut adx = StatefulAdx::new(14);
        adx.seed(&bars);
        assert!(adx.value() > 25.0);
    }
}
