use rust_decimal::Decimal;

use crate::errors::{AppError, Result};

pub const STANDARD: &str = "standard";
pub const EXPRESS: &str = "express";

/// Subtotal from which standard shipping is free
pub fn free_shipping_threshold() -> Decimal {
    Decimal::new(7500, 2)
}

/// Cost of a shipping method for a given (post-discount) subtotal.
pub fn shipping_cost(method: &str, subtotal: Decimal) -> Result<Decimal> {
    match method {
        STANDARD if subtotal >= free_shipping_threshold() => Ok(Decimal::ZERO),
        STANDARD => Ok(Decimal::new(499, 2)),
        EXPRESS => Ok(Decimal::new(1499, 2)),
        other => Err(AppError::Validation(format!(
            "Invalid shipping method '{}'. Must be one of: {}, {}",
            other, STANDARD, EXPRESS
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_shipping_is_free_from_threshold() {
        assert_eq!(shipping_cost(STANDARD, Decimal::new(7499, 2)).unwrap(), Decimal::new(499, 2));
        assert_eq!(shipping_cost(STANDARD, Decimal::new(7500, 2)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn express_always_costs() {
        assert_eq!(shipping_cost(EXPRESS, Decimal::new(50000, 2)).unwrap(), Decimal::new(1499, 2));
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(matches!(shipping_cost("drone", Decimal::ONE), Err(AppError::Validation(_))));
    }
}
