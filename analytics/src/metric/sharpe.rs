use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

/// Risk-adjusted return over the closed-trade history: excess return over the
/// risk-free rate divided by the standard deviation of per-trade returns.
///
/// Reference: <https://www.investopedia.com/articles/07/sharpe_ratio.asp>
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct SharpeRatio {
    pub value: Decimal,
}

impl SharpeRatio {
    /// `std_dev_returns = 0` (zero or one trades) yields the maximal ratio rather
    /// than dividing by zero.
    pub fn calculate(risk_free_return: Decimal, mean_return: Decimal, std_dev_returns: Decimal) -> Self {
        if std_dev_returns.is_zero() {
            return Self { value: Decimal::MAX };
        }
        let excess_returns = mean_return - risk_free_return;
        Self { value: excess_returns.checked_div(std_dev_returns).unwrap_or(Decimal::MAX) }
    }

    /// Sample mean and (population) standard deviation of `returns`.
    pub fn mean_and_std_dev(returns: &[Decimal]) -> (Decimal, Decimal) {
        if returns.is_empty() {
            return (Decimal::ZERO, Decimal::ZERO);
        }
        let count = Decimal::from(returns.len());
        let mean = returns.iter().copied().sum::<Decimal>() / count;
        let variance =
            returns.iter().map(|r| (*r - mean) * (*r - mean)).sum::<Decimal>() / count;
        (mean, variance.sqrt().unwrap_or(Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_std_dev_returns_maximal_ratio() {
        let result = SharpeRatio::calculate(dec!(0.001), dec!(0.002), dec!(0));
        assert_eq!(result.value, Decimal::MAX);
    }

    #[test]
    fn computes_excess_return_over_std_dev() {
        let result = SharpeRatio::calculate(dec!(0.0015), dec!(0.0025), dec!(0.02));
        assert_eq!(result.value, dec!(0.05));
    }

    #[test]
    fn mean_and_std_dev_of_constant_series_is_zero_variance() {
        let returns = vec![dec!(0.01), dec!(0.01), dec!(0.01)];
        let (mean, std_dev) = SharpeRatio::mean_and_std_dev(&returns);
        assert_eq!(mean, dec!(0.01));
        assert_eq!(std_dev, Decimal::ZERO);
    }
}
