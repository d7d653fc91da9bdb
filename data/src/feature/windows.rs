//! Rolling-window indicators recomputed directly from the OHLCV ring on every
//! kline close: ATR, Bollinger Bands, and Stochastic Oscillator. Unlike EMA/ADX/RSI
//! these hold no state beyond the ring buffer itself.

use crate::event::OhlcvBar;

/// Rolling mean of True Range over the last `period` bars.
pub fn atr(bars: &[OhlcvBar], period: usize) -> f64 {
    if bars.len() < 2 {
        return 0.0;
    }
    let window = &bars[bars.len().saturating_sub(period)..];
    let mut sum = 0.0;
    let mut count = 0usize;
    for pair in window.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        let tr = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());
        if tr.is_finite() {
            sum += tr;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// `(sma, upper, lower)` for a `period`-bar, `k`-sigma Bollinger band on closes.
pub fn bollinger(closes: &[f64], period: usize, k: f64) -> (f64, f64, f64) {
    if closes.len() < period || period == 0 {
        return (0.0, 0.0, 0.0);
    }
    let window = &closes[closes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / period as f64;
    let stdev = variance.sqrt();
    (mean, mean + k * stdev, mean - k * stdev)
}

/// `(%K, %D)` stochastic oscillator: `%K` over `k_period`, `%D` the `d_period` SMA of `%K`.
pub fn stochastic(bars: &[OhlcvBar], k_period: usize, d_period: usize) -> (f64, f64) {
    if bars.len() < k_period + d_period {
        return (50.0, 50.0);
    }
    let mut ks = Vec::with_capacity(d_period);
    for i in 0..d_period {
        let end = bars.len() - i;
        let start = end.saturating_sub(k_period);
        let window = &bars[start..end];
        let Some(close) = window.last().map(|b| b.close) else {
            continue;
        };
        let high = window.iter().fold(f64::MIN, |acc, b| acc.max(b.high));
        let low = window.iter().fold(f64::MAX, |acc, b| acc.min(b.low));
        let range = high - low;
        let k = if range > 0.0 {
            100.0 * (close - low) / range
        } else {
            50.0
        };
        ks.push(k);
    }
    let k = ks.first().copied().unwrap_or(50.0);
    let d = if ks.is_empty() {
        50.0
    } else {
        ks.iter().sum::<f64>() / ks.len() as f64
    };
    (k, d)
}

/// Simple moving average of the last `period` volumes, for the `volume_sma` feature.
pub fn volume_sma(bars: &[OhlcvBar], period: usize) -> f64 {
    if bars.is_empty() {
        return 0.0;
    }
    let window = &bars[bars.len().saturating_sub(period)..];
    window.iter().map(|b| b.volume).sum::<f64>() / window.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(h: f64, l: f64, c: f64) -> OhlcvBar {
        OhlcvBar {
            open_time: Utc::now(),
            open: c,
            high: h,
            low: l,
            close: c,
            volume: 10.0,
            is_closed: true,
        }
    }

    #[test]
    fn bollinger_band_brackets_mean() {
        let closes = vec![10.0, 11.0, 9.0, 10.0, 12.0, 8.0, 10.0, 11.0, 9.0, 10.0];
        let (mid, upper, lower) = bollinger(&closes, 10, 2.0);
        assert!(upper > mid && mid > lower);
    }

    #[test]
    fn atr_is_nonnegative() {
        let bars: Vec<_> = (0..20).map(|i| bar(10.0 + i as f64 * 0.1, 9.0 + i as f64 * 0.1, 9.5 + i as f64 * 0.1)).collect();
        assert!(atr(&bars, 14) >= 0.0);
    }
}
