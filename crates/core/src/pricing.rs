//! Option-dependent unit pricing.
//!
//! This is the single place that turns a catalog base price and a shopper's
//! option selection into a unit price. The cart view, the buy-now price
//! endpoint, and the checkout-session builder all call [`unit_price`], so a
//! surcharge can never be applied in one place and forgotten in another.
//!
//! ```
//! use lunaria_core::{SelectedOptions, pricing};
//! use rust_decimal::Decimal;
//!
//! let options = SelectedOptions::new().with("Length", "45-50cm");
//! let line = pricing::price_line(Decimal::new(95, 0), &options, 2);
//! assert_eq!(line.unit_price, Decimal::new(100, 0));
//! assert_eq!(line.line_total, Decimal::new(200, 0));
//! ```

use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::SelectedOptions;

/// A flat amount added when a particular option value is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surcharge {
    /// Option value that triggers the surcharge, compared exactly.
    pub option_value: &'static str,
    /// Amount added to the unit price, in major units.
    pub amount: Decimal,
}

/// Surcharges applied to every product. The longer chain costs +5.
pub const SURCHARGES: &[Surcharge] = &[Surcharge {
    option_value: "45-50cm",
    amount: Decimal::from_parts(5, 0, 0, false, 0),
}];

/// Unit and line price for one line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinePrice {
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Total surcharge for a selection. Surcharges from different options add.
#[must_use]
pub fn surcharge_for(options: &SelectedOptions) -> Decimal {
    options
        .values()
        .flat_map(|value| {
            SURCHARGES
                .iter()
                .filter(move |s| s.option_value == value)
                .map(|s| s.amount)
        })
        .sum()
}

/// Adjusted unit price: `base_price` plus any option surcharges.
#[must_use]
pub fn unit_price(base_price: Decimal, options: &SelectedOptions) -> Decimal {
    base_price + surcharge_for(options)
}

/// `unit_price × quantity`.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Price a line in one step.
#[must_use]
pub fn price_line(base_price: Decimal, options: &SelectedOptions, quantity: u32) -> LinePrice {
    let unit_price = unit_price(base_price, options);
    LinePrice {
        unit_price,
        line_total: line_total(unit_price, quantity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn test_long_chain_adds_five() {
        let options = SelectedOptions::new().with("Length", "45-50cm");
        assert_eq!(unit_price(dec(95), &options), dec(100));
        assert_eq!(unit_price(Decimal::new(4999, 2), &options), Decimal::new(5499, 2));
    }

    #[test]
    fn test_surcharge_is_independent_of_option_name() {
        let by_length = SelectedOptions::new().with("Length", "45-50cm");
        let by_chain = SelectedOptions::new().with("Chain", "45-50cm");
        assert_eq!(surcharge_for(&by_length), dec(5));
        assert_eq!(surcharge_for(&by_chain), dec(5));
    }

    #[test]
    fn test_other_options_leave_price_unchanged() {
        let short = SelectedOptions::new().with("Length", "40-45cm");
        assert_eq!(unit_price(dec(95), &short), dec(95));
        assert_eq!(unit_price(dec(95), &SelectedOptions::new()), dec(95));
        // Near-miss values do not match.
        let near = SelectedOptions::new().with("Length", "45-50 cm");
        assert_eq!(unit_price(dec(95), &near), dec(95));
    }

    #[test]
    fn test_example_line_total() {
        let options = SelectedOptions::new().with("Length", "45-50cm");
        let line = price_line(dec(95), &options, 2);
        assert_eq!(line.unit_price, dec(100));
        assert_eq!(line.line_total, dec(200));
    }

    #[test]
    fn test_line_total_zero_quantity() {
        assert_eq!(line_total(dec(100), 0), Decimal::ZERO);
    }
}
