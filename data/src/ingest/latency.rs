use std::collections::VecDeque;

const CAPACITY: usize = 1000;

/// Ring buffer of the last [`CAPACITY`] event latencies (`received_ts - exchange_ts`,
/// milliseconds), exposing percentile summaries.
#[derive(Debug, Clone, Default)]
pub struct LatencyRing {
    samples: VecDeque<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub p50: i64,
    pub p95: i64,
    pub p99: i64,
    pub max: i64,
}

impl LatencyRing {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(CAPACITY),
        }
    }

    pub fn record(&mut self, latency_ms: i64) {
        if self.samples.len() == CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn stats(&self) -> Option<LatencyStats> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<i64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let percentile = |p: f64| -> i64 {
            let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
            sorted[idx.min(sorted.len() - 1)]
        };
        Some(LatencyStats {
            p50: percentile(0.50),
            p95: percentile(0.95),
            p99: percentile(0.99),
            max: *sorted.last().unwrap(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_has_no_stats() {
        assert!(LatencyRing::new().stats().is_none());
    }

    #[test]
    fn percentiles_track_distribution() {
        let mut ring = LatencyRing::new();
        for ms in 1..=100 {
            ring.record(ms);
        }
        let stats = ring.stats().unwrap();
        assert_eq!(stats.max, 100);
        assert!(stats.p50 < stats.p95 && stats.p95 <= stats.p99);
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut ring = LatencyRing::new();
        for ms in 0..(CAPACITY as i64 + 10) {
            ring.record(ms);
        }
        assert_eq!(ring.len(), CAPACITY);
    }
}
