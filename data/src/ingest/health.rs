//! Liveness tracking: the aggregate last-message timestamp and a per-symbol
//! last-seen map, checked on a periodic timer by the connection supervisor.

use perpbot_integration::collection::FnvIndexMap;
use perpbot_markets::Symbol;
use std::time::{Duration, Instant};

/// Aggregate silence beyond this duration is a warning.
const AGGREGATE_SILENCE_WARNING: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    AggregateSilence(Duration),
    SymbolSilence(Symbol, Duration),
}

#[derive(Debug, Clone)]
pub struct HealthMonitor {
    last_seen_aggregate: Instant,
    last_seen_symbol: FnvIndexMap<Symbol, Instant>,
    data_loss_timeout: Duration,
}

impl HealthMonitor {
    pub fn new(data_loss_timeout: Duration) -> Self {
        Self {
            last_seen_aggregate: Instant::now(),
            last_seen_symbol: FnvIndexMap::default(),
            data_loss_timeout,
        }
    }

    pub fn record(&mut self, symbol: &Symbol) {
        let now = Instant::now();
        self.last_seen_aggregate = now;
        self.last_seen_symbol.insert(symbol.clone(), now);
    }

    /// Run on a 30s timer; returns every violation currently in effect.
    pub fn check(&self, symbols: &[Symbol]) -> Vec<HealthEvent> {
        let now = Instant::now();
        let mut events = Vec::new();

        let aggregate_silence = now.duration_since(self.last_seen_aggregate);
        if aggregate_silence > AGGREGATE_SILENCE_WARNING {
            events.push(HealthEvent::AggregateSilence(aggregate_silence));
        }

        for symbol in symbols {
            let silence = match self.last_seen_symbol.get(symbol) {
                Some(last) => now.duration_since(*last),
                None => now.duration_since(self.last_seen_aggregate),
            };
            if silence > self.data_loss_timeout {
                events.push(HealthEvent::SymbolSilence(symbol.clone(), silence));
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_monitor_reports_no_silence() {
        let mut monitor = HealthMonitor::new(Duration::from_secs(30));
        let symbol = Symbol::new("BTCUSDT");
        monitor.record(&symbol);
        assert!(monitor.check(&[symbol]).is_empty());
    }

    #[test]
    fn unseen_symbol_reports_silence_relative_to_aggregate() {
        let monitor = HealthMonitor::new(Duration::from_secs(0));
        let symbol = Symbol::new("ETHUSDT");
        let events = monitor.check(&[symbol.clone()]);
        assert!(events
            .iter()
            .any(|e| matches!(e, HealthEvent::SymbolSilence(s, _) if *s == symbol)));
    }
}
