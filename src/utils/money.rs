use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to cents, halves away from zero.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Two decimals for display: 50 -> "50.00", 4.990 -> "4.99".
pub fn format_money(amount: Decimal) -> String {
    let mut amount = round_cents(amount);
    amount.rescale(2);
    amount.to_string()
}

/// Minor units (cents) as payment providers expect them.
pub fn to_cents(amount: Decimal) -> Option<i64> {
    (round_cents(amount) * Decimal::ONE_HUNDRED).to_i64()
}
