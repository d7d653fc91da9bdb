//! Validates normalized market data before it reaches the feature engine, per the
//! event-level checks the ingest layer is responsible for.

use crate::event::{Kline, MarketDataEvent, MarketDataKind};
use chrono::{DateTime, Utc};
use perpbot_integration::collection::FnvIndexMap;
use perpbot_markets::Symbol;

/// Price jump beyond this fraction of the last known close is rejected outright.
const MAX_PRICE_JUMP_PCT: f64 = 0.20;

/// Events timestamped further than this from wall clock are rejected.
const MAX_CLOCK_SKEW: chrono::Duration = chrono::Duration::seconds(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MalformedKline,
    PriceJump,
    ClockSkew,
    LatencyExceeded,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedKline => "malformed_kline",
            Self::PriceJump => "price_jump",
            Self::ClockSkew => "clock_skew",
            Self::LatencyExceeded => "latency_exceeded",
        }
    }
}

/// Tracks the last accepted close per symbol to detect price jumps, plus a running
/// rejection counter per reason.
#[derive(Debug, Clone, Default)]
pub struct EventValidator {
    last_close: FnvIndexMap<Symbol, f64>,
    rejected: FnvIndexMap<&'static str, u64>,
    timestamp_tolerance_ms: i64,
}

impl EventValidator {
    pub fn new(timestamp_tolerance_ms: i64) -> Self {
        Self {
            last_close: FnvIndexMap::default(),
            rejected: FnvIndexMap::default(),
            timestamp_tolerance_ms,
        }
    }

    pub fn rejected_count(&self, reason: RejectReason) -> u64 {
        self.rejected.get(reason.as_str()).copied().unwrap_or(0)
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejected.values().sum()
    }

    /// Validate one event, updating internal per-symbol state as a side effect.
    /// Returns the rejection reason, if any; the caller drops the event on `Some`.
    pub fn validate(&mut self, event: &MarketDataEvent, now: DateTime<Utc>) -> Option<RejectReason> {
        let reason = self.check(event, now);
        if let Some(reason) = reason {
            *self.rejected.entry(reason.as_str()).or_insert(0) += 1;
        } else if let MarketDataKind::Kline(kline) = &event.kind {
            self.last_close.insert(event.symbol.clone(), kline.close);
        }
        reason
    }

    fn check(&self, event: &MarketDataEvent, now: DateTime<Utc>) -> Option<RejectReason> {
        if (now - event.exchange_ts).abs() > MAX_CLOCK_SKEW {
            return Some(RejectReason::ClockSkew);
        }
        if event.latency_ms() > self.timestamp_tolerance_ms {
            return Some(RejectReason::LatencyExceeded);
        }
        if let MarketDataKind::Kline(kline) = &event.kind {
            if !kline.is_structurally_valid() {
                return Some(RejectReason::MalformedKline);
            }
            if self.jumped_too_far(&event.symbol, kline) {
                return Some(RejectReason::PriceJump);
            }
        }
        None
    }

    fn jumped_too_far(&self, symbol: &Symbol, kline: &Kline) -> bool {
        match self.last_close.get(symbol) {
            Some(&last) if last > 0.0 => ((kline.close - last).abs() / last) > MAX_PRICE_JUMP_PCT,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Kline;

    fn kline_event(symbol: &str, close: f64, exchange_ts: DateTime<Utc>) -> MarketDataEvent {
        MarketDataEvent {
            symbol: Symbol::new(symbol),
            exchange_ts,
            received_ts: exchange_ts,
            kind: MarketDataKind::Kline(Kline {
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
                is_closed: true,
            }),
        }
    }

    #[test]
    fn rejects_malformed_kline() {
        let mut validator = EventValidator::new(5_000);
        let mut event = kline_event("BTCUSDT", 100.0, Utc::now());
        if let MarketDataKind::Kline(k) = &mut event.kind {
            k.high = 5.0;
            k.low = 10.0;
        }
        assert_eq!(validator.validate(&event, Utc::now()), Some(RejectReason::MalformedKline));
    }

    #[test]
    fn rejects_large_price_jump() {
        let mut validator = EventValidator::new(5_000);
        let now = Utc::now();
        let first = kline_event("BTCUSDT", 100.0, now);
        assert!(validator.validate(&first, now).is_none());

        let jumped = kline_event("BTCUSDT", 200.0, now);
        assert_eq!(validator.validate(&jumped, now), Some(RejectReason::PriceJump));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let mut validator = EventValidator::new(5_000);
        let stale = kline_event("BTCUSDT", 100.0, Utc::now() - chrono::Duration::seconds(120));
        assert_eq!(validator.validate(&stale, Utc::now()), Some(RejectReason::ClockSkew));
    }
}
