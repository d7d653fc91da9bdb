use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ratio of gross profit to gross loss (both taken as absolute values). Greater
/// than `1.0` indicates a profitable strategy.
///
/// Reference: <https://www.investopedia.com/articles/fundamental-analysis/10/strategy-performance-reports.asp#toc-profit-factor>
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct ProfitFactor {
    pub value: Decimal,
}

impl ProfitFactor {
    pub fn calculate(gross_profit_abs: Decimal, gross_loss_abs: Decimal) -> Option<Self> {
        if gross_profit_abs.is_zero() && gross_loss_abs.is_zero() {
            return None;
        }

        let value = if gross_loss_abs.is_zero() {
            Decimal::MAX
        } else if gross_profit_abs.is_zero() {
            Decimal::MIN
        } else {
            gross_profit_abs.abs().checked_div(gross_loss_abs.abs())?
        };

        Some(Self { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn both_zero_is_undefined() {
        assert_eq!(ProfitFactor::calculate(dec!(0), dec!(0)), None);
    }

    #[test]
    fn no_losses_is_maximal() {
        assert_eq!(ProfitFactor::calculate(dec!(1), dec!(0)).unwrap().value, Decimal::MAX);
    }

    #[test]
    fn no_profits_is_minimal() {
        assert_eq!(ProfitFactor::calculate(dec!(0), dec!(1)).unwrap().value, Decimal::MIN);
    }

    #[test]
    fn mixed_profits_and_losses() {
        assert_eq!(ProfitFactor::calculate(dec!(10), dec!(5)).unwrap().value, dec!(2));
    }
}
