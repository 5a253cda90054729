//! Money amounts using decimal arithmetic.
//!
//! Prices are stored and computed in major units (`95.00`), and converted to
//! integer minor units (`9500`) only at the payment provider boundary.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors produced when converting between major and minor units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// The amount has more decimal places than the currency allows.
    #[error("amount {0} has sub-cent precision")]
    SubMinorPrecision(Decimal),
    /// The amount does not fit in an `i64` of minor units.
    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),
    /// The amount is zero or negative where a charge is required.
    #[error("amount {0} must be positive")]
    NotPositive(Decimal),
    /// Unknown ISO 4217 code.
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

/// ISO 4217 currency codes accepted by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    #[default]
    EUR,
    RON,
    USD,
    GBP,
}

impl CurrencyCode {
    /// Upper-case ISO code, e.g. `EUR`.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::EUR => "EUR",
            Self::RON => "RON",
            Self::USD => "USD",
            Self::GBP => "GBP",
        }
    }

    /// Lower-case code as the payment provider expects it, e.g. `eur`.
    #[must_use]
    pub const fn provider_code(self) -> &'static str {
        match self {
            Self::EUR => "eur",
            Self::RON => "ron",
            Self::USD => "usd",
            Self::GBP => "gbp",
        }
    }

    /// Number of decimal places in the minor unit.
    #[must_use]
    pub const fn minor_exponent(self) -> u32 {
        2
    }

    /// Convert a major-unit amount into integer minor units.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::SubMinorPrecision`] if the amount cannot be
    /// represented exactly, or [`PriceError::OutOfRange`] on overflow.
    pub fn to_minor_units(self, amount: Decimal) -> Result<i64, PriceError> {
        let factor = Decimal::from(10_i64.pow(self.minor_exponent()));
        let scaled = amount
            .checked_mul(factor)
            .ok_or(PriceError::OutOfRange(amount))?;
        if scaled.fract() != Decimal::ZERO {
            return Err(PriceError::SubMinorPrecision(amount));
        }
        scaled.to_i64().ok_or(PriceError::OutOfRange(amount))
    }

    /// Convert integer minor units back into a major-unit amount.
    #[must_use]
    pub fn from_minor_units(self, minor: i64) -> Decimal {
        Decimal::new(minor, self.minor_exponent())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EUR" => Ok(Self::EUR),
            "RON" => Ok(Self::RON),
            "USD" => Ok(Self::USD),
            "GBP" => Ok(Self::GBP),
            _ => Err(PriceError::UnsupportedCurrency(s.to_owned())),
        }
    }
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's major unit (e.g. euros, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Amount in minor units for the payment provider.
    ///
    /// # Errors
    ///
    /// See [`CurrencyCode::to_minor_units`].
    pub fn minor_units(&self) -> Result<i64, PriceError> {
        self.currency_code.to_minor_units(self.amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut amount = self.amount.round_dp(self.currency_code.minor_exponent());
        amount.rescale(self.currency_code.minor_exponent());
        write!(f, "{amount} {}", self.currency_code)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minor_units() {
        assert_eq!(CurrencyCode::EUR.to_minor_units(Decimal::new(95, 0)), Ok(9500));
        assert_eq!(CurrencyCode::EUR.to_minor_units(Decimal::new(1999, 2)), Ok(1999));
        assert_eq!(CurrencyCode::EUR.to_minor_units(Decimal::ZERO), Ok(0));
    }

    #[test]
    fn test_to_minor_units_rejects_sub_cent() {
        let amount = Decimal::new(10_005, 3);
        assert_eq!(
            CurrencyCode::RON.to_minor_units(amount),
            Err(PriceError::SubMinorPrecision(amount))
        );
    }

    #[test]
    fn test_to_minor_units_overflow() {
        assert!(matches!(
            CurrencyCode::USD.to_minor_units(Decimal::MAX),
            Err(PriceError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_from_minor_units() {
        assert_eq!(CurrencyCode::EUR.from_minor_units(20_000), Decimal::new(200, 0));
        assert_eq!(CurrencyCode::EUR.from_minor_units(5), Decimal::new(5, 2));
    }

    #[test]
    fn test_currency_parse_and_codes() {
        assert_eq!("ron".parse::<CurrencyCode>().unwrap(), CurrencyCode::RON);
        assert_eq!(CurrencyCode::GBP.provider_code(), "gbp");
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_price_display() {
        let price = Price::new(Decimal::new(100, 0), CurrencyCode::EUR);
        assert_eq!(price.to_string(), "100.00 EUR");
        assert_eq!(Price::new(Decimal::new(4999, 2), CurrencyCode::RON).to_string(), "49.99 RON");
        assert_eq!(price.minor_units(), Ok(10_000));
    }
}
