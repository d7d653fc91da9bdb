use std::time::Duration;

/// Exponential reconnect backoff: `base * multiplier^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectBackoff {
    base: Duration,
    multiplier: f64,
    max: Duration,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(base: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            base,
            multiplier,
            max,
            attempt: 0,
        }
    }

    /// Default policy: 1s base, 1.5x multiplier, capped at 60s.
    pub fn default_policy() -> Self {
        Self::new(Duration::from_secs(1), 1.5, Duration::from_secs(60))
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay for the current attempt, then advance the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let factor = self.multiplier.powi(self.attempt as i32);
        let delay = self.base.mul_f64(factor).min(self.max);
        self.attempt += 1;
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_and_caps() {
        let mut backoff = ReconnectBackoff::new(Duration::from_secs(1), 1.5, Duration::from_secs(10));
        let first = backoff.next_delay();
        let second = backoff.next_delay();
        assert!(second > first);
        for _ in 0..20 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn reset_restarts_from_base() {
        let mut backoff = ReconnectBackoff::default_policy();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
    }
}
