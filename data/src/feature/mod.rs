//! Per-symbol indicator state and the engine that keeps it current.
//!
//! EMA/ADX/RSI are fully incremental: each new observation folds into running
//! state in O(1). The Bollinger/Stochastic/ATR/Donchian/volume-SMA family is
//! recomputed straight from the ring buffer on every closed bar, since none of
//! them admit a cheap incremental update worth the bookkeeping.

pub mod adx;
pub mod ema;
pub mod rsi;
pub mod snapshot;
pub mod windows;

use crate::event::{Kline, MarketDataEvent, MarketDataKind, OhlcvBar, OhlcvRing};
use adx::StatefulAdx;
use chrono::{DateTime, Utc};
use ema::Ema;
use perpbot_integration::collection::FnvIndexMap;
use perpbot_markets::Symbol;
use rsi::WilderRsi;

pub use snapshot::FeatureSnapshot;

const DONCHIAN_SHORT: usize = 20;
const DONCHIAN_LONG: usize = 55;
const EMA_FAST: usize = 20;
const EMA_SLOW: usize = 50;
const RSI_PERIOD: usize = 14;
const ADX_PERIOD: usize = 14;
const ATR_PERIOD: usize = 14;
const BOLLINGER_PERIOD: usize = 20;
const BOLLINGER_K: f64 = 2.0;
const STOCH_K_PERIOD: usize = 14;
const STOCH_D_PERIOD: usize = 3;
const VOLUME_SMA_PERIOD: usize = 20;

/// Per-symbol indicator state: the ring plus every stateful indicator layered on
/// top of it.
#[derive(Debug, Clone)]
struct SymbolState {
    ring: OhlcvRing,
    ema_fast: Ema,
    ema_slow: Ema,
    rsi: WilderRsi,
    adx: StatefulAdx,
}

impl SymbolState {
    fn new() -> Self {
        Self {
            ring: OhlcvRing::new(),
            ema_fast: Ema::new(EMA_FAST),
            ema_slow: Ema::new(EMA_SLOW),
            rsi: WilderRsi::new(RSI_PERIOD),
            adx: StatefulAdx::new(ADX_PERIOD),
        }
    }

    fn is_ready(&self) -> bool {
        self.ring.is_seeded() && self.ema_slow.is_seeded() && self.rsi.is_seeded() && self.adx.is_seeded()
    }

    fn seed_indicators(&mut self) {
        let closes: Vec<f64> = self.ring.closed().map(|b| b.close).collect();
        let bars: Vec<OhlcvBar> = self.ring.closed().copied().collect();
        self.ema_fast.seed(&closes);
        self.ema_slow.seed(&closes);
        self.rsi.seed(&closes);
        self.adx.seed(&bars);
    }

    fn snapshot(&self, timestamp: DateTime<Utc>) -> Option<snapshot::FeatureSnapshot> {
        if !self.is_ready() {
            return None;
        }
        let close = self.ring.last()?.close;
        let (high_20, low_20) = self.ring.donchian(DONCHIAN_SHORT)?;
        let (high_55, low_55) = self.ring.donchian(DONCHIAN_LONG)?;
        let bars: Vec<OhlcvBar> = self.ring.closed().copied().collect();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let atr = windows::atr(&bars, ATR_PERIOD);
        let (bb_mid, bb_upper, bb_lower) = windows::bollinger(&closes, BOLLINGER_PERIOD, BOLLINGER_K);
        let (stoch_k, stoch_d) = windows::stochastic(&bars, STOCH_K_PERIOD, STOCH_D_PERIOD);
        let volume_sma = windows::volume_sma(&bars, VOLUME_SMA_PERIOD);
        let ema_20 = self.ema_fast.value().unwrap_or(close);
        let ema_50 = self.ema_slow.value().unwrap_or(close);

        Some(snapshot::FeatureSnapshot {
            close,
            high_20,
            low_20,
            high_55,
            low_55,
            rsi: self.rsi.value(),
            adx: self.adx.value(),
            atr,
            atr_pct: if close > 0.0 { atr / close } else { 0.0 },
            ema_20,
            ema_50,
            bb_upper,
            bb_mid,
            bb_lower,
            stoch_k,
            stoch_d,
            volume_sma,
            breakout_20_long: close >= high_20,
            breakout_20_short: close <= low_20,
            ema_20_above_ema_50: ema_20 > ema_50,
            timestamp,
        })
    }
}

/// Coordinates per-symbol indicator state across the whole tracked universe.
///
/// Not ready for a symbol until [`OhlcvRing::is_seeded`] and every stateful
/// indicator has consumed the seed window; [`FeatureEngine::snapshot`] returns
/// `None` until then.
#[derive(Debug, Clone, Default)]
pub struct FeatureEngine {
    symbols: FnvIndexMap<Symbol, SymbolState>,
}

impl FeatureEngine {
    pub fn new() -> Self {
        Self {
            symbols: FnvIndexMap::default(),
        }
    }

    /// Seed a symbol from historical closed bars fetched over REST at startup.
    pub fn seed(&mut self, symbol: Symbol, bars: impl IntoIterator<Item = OhlcvBar>) {
        let state = self.symbols.entry(symbol).or_insert_with(SymbolState::new);
        state.ring.seed(bars);
        state.seed_indicators();
    }

    pub fn is_ready(&self, symbol: &Symbol) -> bool {
        self.symbols.get(symbol).is_some_and(SymbolState::is_ready)
    }

    /// Fold one market data event into the symbol's state. Kline closes drive a
    /// full recompute of the ring-derived indicators and the incremental ones;
    /// book-ticker ticks overlay the open bar's price and advance the EMAs
    /// against the mid price, cheap enough to run on every tick.
    pub fn on_event(&mut self, event: &MarketDataEvent) -> Option<snapshot::FeatureSnapshot> {
        let state = self
            .symbols
            .entry(event.symbol.clone())
            .or_insert_with(SymbolState::new);

        match &event.kind {
            MarketDataKind::Kline(kline) => {
                state.ring.apply_kline(event.exchange_ts, kline);
                if kline.is_closed {
                    Self::fold_closed_bar(state, kline);
                }
            }
            MarketDataKind::BookTicker(ticker) => {
                let mid_price = ticker.mid_price();
                state.ring.overlay_tick_price(mid_price);
                state.ema_fast.update(mid_price);
                state.ema_slow.update(mid_price);
            }
            MarketDataKind::AggTrade(trade) => {
                state.ring.overlay_tick_price(trade.price);
            }
        }

        state.snapshot(event.received_ts)
    }

    fn fold_closed_bar(state: &mut SymbolState, kline: &Kline) {
        state.ema_fast.update(kline.close);
        state.ema_slow.update(kline.close);
        state.rsi.update(kline.close);
        state.adx.update(kline.high, kline.low, kline.close);
    }

    /// Latest snapshot for a symbol without feeding a new event, or `None` if not
    /// yet seeded.
    pub fn snapshot(&self, symbol: &Symbol, timestamp: DateTime<Utc>) -> Option<snapshot::FeatureSnapshot> {
        self.symbols.get(symbol)?.snapshot(timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{BookTicker, MarketDataEvent, MarketDataKind};
    use chrono::Duration;

    fn seed_bars(n: usize) -> Vec<OhlcvBar> {
        let mut price = 100.0;
        let base = Utc::now() - Duration::minutes(n as i64);
        (0..n)
            .map(|i| {
                price += 0.1;
                OhlcvBar {
                    open_time: base + Duration::minutes(i as i64),
                    open: price - 0.05,
                    high: price + 0.2,
                    low: price - 0.2,
                    close: price,
                    volume: 5.0,
                    is_closed: true,
                }
            })
            .collect()
    }

    #[test]
    fn not_ready_before_seeding() {
        let engine = FeatureEngine::new();
        assert!(!engine.is_ready(&Symbol::new("BTCUSDT")));
    }

    #[test]
    fn ready_and_finite_after_seeding() {
        let mut engine = FeatureEngine::new();
        let symbol = Symbol::new("BTCUSDT");
        engine.seed(symbol.clone(), seed_bars(600));
        assert!(engine.is_ready(&symbol));
        let snap = engine.snapshot(&symbol, Utc::now()).expect("seeded symbol snapshots");
        assert!(snap.is_finite());
    }

    #[test]
    fn book_ticker_overlay_does_not_advance_ring_length() {
        let mut engine = FeatureEngine::new();
        let symbol = Symbol::new("BTCUSDT");
        engine.seed(symbol.clone(), seed_bars(600));
        let before = engine.symbols.get(&symbol).unwrap().ring.len();

        let event = MarketDataEvent {
            symbol: symbol.clone(),
            exchange_ts: Utc::now(),
            received_ts: Utc::now(),
            kind: MarketDataKind::BookTicker(BookTicker {
                best_bid: 150.0,
                best_ask: 150.2,
                bid_qty: 1.0,
                ask_qty: 1.0,
            }),
        };
        engine.on_event(&event);
        let after = engine.symbols.get(&symbol).unwrap().ring.len();
        assert_eq!(before, after);
    }

    #[test]
    fn book_ticker_tick_advances_the_emas_against_mid_price() {
        let mut engine = FeatureEngine::new();
        let symbol = Symbol::new("BTCUSDT");
        engine.seed(symbol.clone(), seed_bars(600));
        let ema_fast_before = engine.symbols.get(&symbol).unwrap().ema_fast.value().unwrap();

        let event = MarketDataEvent {
            symbol: symbol.clone(),
            exchange_ts: Utc::now(),
            received_ts: Utc::now(),
            kind: MarketDataKind::BookTicker(BookTicker {
                best_bid: 10_000.0,
                best_ask: 10_000.2,
                bid_qty: 1.0,
                ask_qty: 1.0,
            }),
        };
        engine.on_event(&event);
        let ema_fast_after = engine.symbols.get(&symbol).unwrap().ema_fast.value().unwrap();
        assert_ne!(ema_fast_before, ema_fast_after);
    }
}
