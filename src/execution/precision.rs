//! Exchange-legal quantity and price rounding
//!
//! Venues reject orders whose quantity is not a multiple of the instrument's
//! quantity step or whose price is not a multiple of its price tick.
//! Quantities are floored (never round exposure up); prices are rounded to
//! the nearest tick.

use rust_decimal::Decimal;

/// Floor a raw quantity to the instrument's quantity step.
pub fn floor_to_step(quantity: Decimal, step: Decimal) -> Decimal {
    if step.is_zero() {
        return quantity;
    }
    (quantity / step).floor() * step
}

/// Round a price to the nearest instrument price tick.
pub fn round_to_tick(price: Decimal, tick: Decimal) -> Decimal {
    if tick.is_zero() {
        return price;
    }
    (price / tick).round() * tick
}
