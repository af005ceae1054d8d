//! Money type with decimal precision and currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Every amount the ledger stores is a `Decimal` with two fractional digits.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fractional digits kept for every stored amount.
pub const AMOUNT_SCALE: u32 = 2;

/// Exclusive upper bound of a stored amount: `NUMERIC(20, 2)` keeps 18
/// integer digits.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA764_0000, 0x0DE0_B6B3, 0, false, 0);

/// Rounds an amount to [`AMOUNT_SCALE`] places using banker's rounding.
#[must_use]
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Represents a monetary amount with currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount in major units (e.g., 1250.50).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

/// ISO 4217 currency codes seen on travel bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Pakistani Rupee
    Pkr,
    /// Saudi Riyal
    Sar,
    /// UAE Dirham
    Aed,
    /// US Dollar
    Usd,
    /// Euro
    Eur,
    /// Pound Sterling
    Gbp,
}

/// Returned when a currency code is not one of [`Currency`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown currency: {0}")]
pub struct UnknownCurrency(pub String);

impl Money {
    /// Creates a new Money instance.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Amount times `rate`, rounded to two places. `None` on overflow.
    #[must_use]
    pub fn converted_amount(&self, rate: Decimal) -> Option<Decimal> {
        self.amount.checked_mul(rate).map(round_amount)
    }

    /// Converts into another currency with `rate` (target units per source
    /// unit), rounding the result to two places.
    #[must_use]
    pub fn convert(&self, rate: Decimal, target: Currency) -> Option<Self> {
        Some(Self {
            amount: self.converted_amount(rate)?,
            currency: target,
        })
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            Self::Pkr => "PKR",
            Self::Sar => "SAR",
            Self::Aed => "AED",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
        };
        f.write_str(code)
    }
}

impl std::str::FromStr for Currency {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PKR" => Ok(Self::Pkr),
            "SAR" => Ok(Self::Sar),
            "AED" => Ok(Self::Aed),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            _ => Err(UnknownCurrency(s.to_string())),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.currency, self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[rstest]
    #[case(dec!(10.005), dec!(10.00))]
    #[case(dec!(10.015), dec!(10.02))]
    #[case(dec!(10.025), dec!(10.02))]
    #[case(dec!(-3.335), dec!(-3.34))]
    #[case(dec!(7), dec!(7))]
    fn test_round_amount_bankers(#[case] input: Decimal, #[case] expected: Decimal) {
        assert_eq!(round_amount(input), expected);
    }

    #[test]
    fn test_max_amount_is_ten_to_the_eighteenth() {
        assert_eq!(MAX_AMOUNT, Decimal::from(1_000_000_000_000_000_000_i64));
    }

    #[test]
    fn test_money_zero() {
        let money = Money::zero(Currency::Pkr);
        assert!(money.is_zero());
        assert!(!money.is_positive());
    }

    #[test]
    fn test_money_convert() {
        let fare = Money::new(dec!(1200.00), Currency::Sar);
        let converted = fare.convert(dec!(74.3333), Currency::Pkr).unwrap();
        assert_eq!(converted.amount, dec!(89199.96));
        assert_eq!(converted.currency, Currency::Pkr);
    }

    #[test]
    fn test_money_convert_overflow_is_none() {
        let fare = Money::new(Decimal::MAX, Currency::Usd);
        assert_eq!(fare.convert(dec!(2), Currency::Pkr), None);
        assert_eq!(fare.converted_amount(dec!(1.5)), None);
    }

    #[test]
    fn test_currency_round_trip_text() {
        for currency in [
            Currency::Pkr,
            Currency::Sar,
            Currency::Aed,
            Currency::Usd,
            Currency::Eur,
            Currency::Gbp,
        ] {
            assert_eq!(Currency::from_str(&currency.to_string()).unwrap(), currency);
        }
        assert_eq!(Currency::from_str("sar").unwrap(), Currency::Sar);
        assert_eq!(
            Currency::from_str("XXX"),
            Err(UnknownCurrency("XXX".to_string()))
        );
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::new(dec!(15.50), Currency::Aed).to_string(), "AED 15.50");
    }
}
