use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fraction of closed trades that were profitable, in `[0, 1]`.
///
/// Reference: <https://www.investopedia.com/terms/w/win-loss-ratio.asp>
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
pub struct WinRate {
    pub value: Decimal,
}

impl WinRate {
    /// `None` when there are no trades to divide by.
    pub fn calculate(wins: Decimal, total: Decimal) -> Option<Self> {
        if total.is_zero() {
            None
        } else {
            Some(Self { value: wins.abs().checked_div(total.abs())? })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn no_trades_is_undefined() {
        assert_eq!(WinRate::calculate(Decimal::ZERO, Decimal::ZERO), None);
    }

    #[test]
    fn mixed_wins_and_losses() {
        assert_eq!(WinRate::calculate(dec!(6), dec!(10)).unwrap().value, dec!(0.6));
    }

    #[test]
    fn all_winning_trades() {
        assert_eq!(WinRate::calculate(dec!(10), dec!(10)).unwrap().value, Decimal::ONE);
    }
}
