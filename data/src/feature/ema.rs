//! Fully incremental exponential moving average.

/// `ema_t = alpha * price + (1 - alpha) * ema_{t-1}`, seeded from the simple moving
/// average of the first `period` closes.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    period: usize,
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            value: None,
        }
    }

    /// Seed from historical closes; takes the simple average of the most recent
    /// `period` values as the initial EMA.
    pub fn seed(&mut self, closes: &[f64]) {
        if closes.len() < self.period || self.period == 0 {
            return;
        }
        let window = &closes[closes.len() - self.period..];
        let sma = window.iter().sum::<f64>() / self.period as f64;
        self.value = Some(sma);
    }

    /// Apply one new price observation.
    pub fn update(&mut self, price: f64) -> f64 {
        if !price.is_finite() {
            return self.value.unwrap_or(price);
        }
        let next = match self.value {
            Some(prev) => self.alpha * price + (1.0 - self.alpha) * prev,
            None => price,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_seeded(&self) -> bool {
        self.value.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_from_simple_average() {
        let mut ema = Ema::new(3);
        ema.seed(&[1.0, 2.0, 3.0]);
        assert_eq!(ema.value(), Some(2.0));
    }

    #[test]
    fn update_moves_toward_new_price() {
        let mut ema = Ema::new(3);
        ema.seed(&[1.0, 2.0, 3.0]);
        let next = ema.update(10.0);
        assert!(next > 2.0 && next < 10.0);
    }
}
