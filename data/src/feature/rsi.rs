//! Stateful Wilder RSI.

pub const RSI_FALLBACK: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct WilderRsi {
    period: usize,
    avg_gain: Option<f64>,
    avg_loss: Option<f64>,
    prev_close: Option<f64>,
}

impl WilderRsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            avg_gain: None,
            avg_loss: None,
            prev_close: None,
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.avg_gain.is_some()
    }

    pub fn value(&self) -> f64 {
        match (self.avg_gain, self.avg_loss) {
            (Some(gain), Some(loss)) if gain + loss > 0.0 => {
                if loss == 0.0 {
                    100.0
                } else {
                    let rs = gain / loss;
                    100.0 - 100.0 / (1.0 + rs)
                }
            }
            _ => RSI_FALLBACK,
        }
    }

    /// Seed from `period + 1` or more historical closes.
    pub fn seed(&mut self, closes: &[f64]) {
        if closes.len() < self.period + 1 {
            return;
        }
        *self = Self::new(self.period);
        for &close in closes {
            self.update(close);
        }
    }

    pub fn update(&mut self, close: f64) -> f64 {
        if !close.is_finite() {
            return self.value();
        }
        let Some(prev_close) = self.prev_close else {
            self.prev_close = Some(close);
            return RSI_FALLBACK;
        };

        let change = close - prev_close;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        let n = self.period as f64;

        self.avg_gain = Some(match self.avg_gain {
            Some(prev) => (prev * (n - 1.0) + gain) / n,
            None => gain,
        });
        self.avg_loss = Some(match self.avg_loss {
            Some(prev) => (prev * (n - 1.0) + loss) / n,
            None => loss,
        });

        self.prev_close = Some(close);
        self.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_before_seeding() {
        assert_eq!(WilderRsi::new(14).value(), RSI_FALLBACK);
    }

    #[test]
    fn monotonic_uptrend_pushes_rsi_high() {
        let mut rsi = WilderRsi::new(14);
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        rsi.seed(&closes);
        assert!(rsi.value() > 70.0);
    }
}
