//! # Rate Limiter
//!
//! Token-bucket gate placed in front of every exchange REST call. Endpoints on
//! perpetual-futures venues are weighted (eg/ placing an order costs more "weight"
//! than a read-only balance poll); the bucket tracks weight, not request count, and
//! is sized to a safety margin below the exchange's advertised per-minute limit so
//! that a burst of weighted calls from several symbols at once never trips the
//! venue's own ban threshold.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Fraction of the exchange's advertised per-minute weight budget the bucket is
/// sized to. Leaves headroom for weight the exchange attributes to us that we
/// didn't account for (eg/ other processes sharing the same API key).
const SAFETY_MARGIN: f64 = 0.8;

#[derive(Debug)]
struct Bucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}

/// Token-bucket rate limiter keyed on request weight, shared across every caller
/// issuing REST requests to the exchange.
///
/// A single global instance is owned by the orchestrator and handed to the
/// exchange client and order manager; internally it is a mutex-protected bucket,
/// matching the single-writer shared-resource policy for the rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Construct a limiter for an exchange advertising `weight_per_minute` total
    /// request weight per rolling minute.
    pub fn new(weight_per_minute: u32) -> Self {
        let capacity = weight_per_minute as f64 * SAFETY_MARGIN;
        Self {
            bucket: Mutex::new(Bucket {
                capacity,
                tokens: capacity,
                refill_per_sec: capacity / 60.0,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Acquire `weight` tokens, sleeping as necessary until enough have accrued.
    ///
    /// Each call to this method is a suspension point; CPU-only work never calls it.
    pub async fn acquire(&self, weight: u32) {
        let weight = weight as f64;
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                bucket.refill();
                if bucket.tokens >= weight {
                    bucket.tokens -= weight;
                    debug!(weight, remaining = bucket.tokens, "rate limiter token acquired");
                    return;
                }
                let deficit = weight - bucket.tokens;
                Duration::from_secs_f64((deficit / bucket.refill_per_sec).max(0.001))
            };
            warn!(?wait, weight, "rate limiter throttling request");
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently available, for diagnostics.
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        bucket.refill();
        bucket.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquires_immediately_when_capacity_available() {
        let limiter = RateLimiter::new(1200);
        let before = limiter.available();
        limiter.acquire(10).await;
        assert!(limiter.available() <= before);
    }

    #[tokio::test(start_paused = true)]
    async fn blocks_until_tokens_refill() {
        let limiter = RateLimiter::new(60); // 0.8 tok/sec after safety margin
        limiter.acquire(48).await; // drains bucket to ~0
        let start = Instant::now();
        limiter.acquire(1).await;
        assert!(Instant::now() >= start);
    }
}
