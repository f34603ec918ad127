//! Money calculation utilities using rust_decimal for precision
//!
//! Amounts are stored as `f64` but every sum and comparison happens on
//! `Decimal`, rounded to 2 dp with midpoint-away-from-zero.

use rust_decimal::prelude::*;

const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Convert f64 to Decimal; non-finite input becomes zero
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_else(|| {
        tracing::error!(value = ?value, "Non-finite f64 in monetary calculation, defaulting to zero");
        Decimal::ZERO
    })
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    round(value).to_f64().unwrap_or_default()
}

#[inline]
fn round(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to whole currency units, as the payment gateway expects
pub fn to_whole_units(value: f64) -> i64 {
    to_decimal(value)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or_default()
}

/// `unit_price * quantity - discount + tax`
pub fn line_total(unit_price: f64, quantity: i64, discount: f64, tax: f64) -> Decimal {
    round(to_decimal(unit_price) * Decimal::from(quantity) - to_decimal(discount) + to_decimal(tax))
}

/// Order-level amounts entering the totals formula
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderAmounts {
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub service_charge: f64,
    pub delivery_fee: f64,
}

impl OrderAmounts {
    /// `subtotal - discount + tax + service_charge + delivery_fee`
    pub fn expected_total(&self) -> Decimal {
        round(
            to_decimal(self.subtotal) - to_decimal(self.discount)
                + to_decimal(self.tax)
                + to_decimal(self.service_charge)
                + to_decimal(self.delivery_fee),
        )
    }
}

/// Equal within [`MONEY_TOLERANCE`]
pub fn amounts_match(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < MONEY_TOLERANCE
}

/// How much is missing for `paid` to cover `total`; `None` when covered
pub fn shortage(total: f64, paid: f64) -> Option<Decimal> {
    let missing = round(to_decimal(total) - to_decimal(paid));
    (missing >= MONEY_TOLERANCE).then_some(missing)
}
