//! Normalised market data events and the bounded OHLCV ring buffer they seed.

use chrono::{DateTime, Utc};
use perpbot_markets::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of bars retained per symbol.
pub const MAX_RING_LEN: usize = 1000;

/// Minimum number of historical bars required before a symbol is considered seeded.
pub const MIN_SEED_BARS: usize = 500;

/// A single normalized observation emitted by the stream ingest layer.
///
/// Ephemeral: consumed by the orchestrator on arrival and dropped, never retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataEvent {
    pub symbol: Symbol,
    pub exchange_ts: DateTime<Utc>,
    pub received_ts: DateTime<Utc>,
    pub kind: MarketDataKind,
}

impl MarketDataEvent {
    /// Latency between the exchange timestamping the event and us receiving it.
    pub fn latency_ms(&self) -> i64 {
        (self.received_ts - self.exchange_ts).num_milliseconds()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketDataKind {
    Kline(Kline),
    BookTicker(BookTicker),
    AggTrade(AggTrade),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_closed: bool,
}

impl Kline {
    /// Structural invariant every kline is expected to satisfy: `low <= {open, close} <= high`,
    /// and all prices/volume strictly positive.
    pub fn is_structurally_valid(&self) -> bool {
        self.open > 0.0
            && self.high > 0.0
            && self.low > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
            && self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookTicker {
    pub best_bid: f64,
    pub best_ask: f64,
    pub bid_qty: f64,
    pub ask_qty: f64,
}

impl BookTicker {
    pub fn mid_price(&self) -> f64 {
        (self.best_bid + self.best_ask) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggTrade {
    pub price: f64,
    pub qty: f64,
    pub trade_id: u64,
}

/// A closed or in-progress OHLCV bar retained in the per-symbol ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_closed: bool,
}

/// Bounded per-symbol ring buffer of [`OhlcvBar`]s.
///
/// The last bar may be open (mutated in place by subsequent ticks); once closed it
/// is never mutated again. Length never exceeds [`MAX_RING_LEN`].
#[derive(Debug, Clone, Default)]
pub struct OhlcvRing {
    bars: VecDeque<OhlcvBar>,
}

impl OhlcvRing {
    pub fn new() -> Self {
        Self {
            bars: VecDeque::with_capacity(MAX_RING_LEN),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn is_seeded(&self) -> bool {
        self.bars.len() >= MIN_SEED_BARS
    }

    pub fn last(&self) -> Option<&OhlcvBar> {
        self.bars.back()
    }

    /// All closed bars, oldest first.
    pub fn closed(&self) -> impl DoubleEndedIterator<Item = &OhlcvBar> {
        self.bars.iter().filter(|bar| bar.is_closed)
    }

    /// Seed the ring from historical bars fetched over REST at startup. Clears any
    /// existing content.
    pub fn seed(&mut self, bars: impl IntoIterator<Item = OhlcvBar>) {
        self.bars.clear();
        for bar in bars {
            self.push(bar);
        }
    }

    /// Apply a kline update. If the last bar shares `open_time` with an open bar,
    /// it is mutated in place (the `is_kline_closed=false` invariant: ring length
    /// unchanged). Otherwise a new bar is appended, evicting the oldest if full.
    pub fn apply_kline(&mut self, open_time: DateTime<Utc>, kline: &Kline) {
        if let Some(last) = self.bars.back_mut() {
            if last.open_time == open_time && !last.is_closed {
                last.high = kline.high;
                last.low = kline.low;
                last.close = kline.close;
                last.volume = kline.volume;
                last.is_closed = kline.is_closed;
                return;
            }
        }
        self.push(OhlcvBar {
            open_time,
            open: kline.open,
            high: kline.high,
            low: kline.low,
            close: kline.close,
            volume: kline.volume,
            is_closed: kline.is_closed,
        });
    }

    /// Overlay a book-ticker mid price onto the open bar's close, without closing it
    /// or appending a new bar.
    pub fn overlay_tick_price(&mut self, price: f64) {
        if let Some(last) = self.bars.back_mut() {
            if !last.is_closed {
                last.close = price;
                last.high = last.high.max(price);
                last.low = last.low.min(price);
            }
        }
    }

    fn push(&mut self, bar: OhlcvBar) {
        if self.bars.len() == MAX_RING_LEN {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
    }

    /// `(highest high, lowest low)` over the last `n` closed bars.
    pub fn donchian(&self, n: usize) -> Option<(f64, f64)> {
        let mut window = self.closed().rev().take(n);
        let first = window.next()?;
        let (mut hi, mut lo) = (first.high, first.low);
        for bar in window {
            hi = hi.max(bar.high);
            lo = lo.min(bar.low);
        }
        Some((hi, lo))
    }
}
