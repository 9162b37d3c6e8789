//! Fixed-point helpers for monetary amounts and rates.
//!
//! Monetary quantities carry four fractional digits and rates or percentages six. Intermediate
//! values keep full `Decimal` precision; only reported figures are quantized.

use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use std::str::FromStr;

pub const MONEY_SCALE: u32 = 4;
pub const RATE_SCALE: u32 = 6;

/// Quantize a monetary amount to four fractional digits (half away from zero).
pub fn round_money(value: Decimal) -> Decimal {
    quantize(value, MONEY_SCALE)
}

/// Quantize a rate or percentage to six fractional digits (half away from zero).
pub fn round_rate(value: Decimal) -> Decimal {
    quantize(value, RATE_SCALE)
}

/// `amount × percent / 100`, or `None` on overflow.
pub fn percent_of(amount: Decimal, percent: Decimal) -> Option<Decimal> {
    amount
        .checked_mul(percent)?
        .checked_div(Decimal::ONE_HUNDRED)
}

/// Read a JSON number or numeric string without a detour through `f64`.
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => Decimal::from_str(&number.to_string())
            .or_else(|_| Decimal::from_scientific(&number.to_string()))
            .ok(),
        Value::String(raw) => {
            let trimmed = raw.trim();
            Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .ok()
        }
        _ => None,
    }
}

fn quantize(value: Decimal, scale: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(scale);
    rounded
}
