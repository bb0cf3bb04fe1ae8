//! Quantity and money helpers
//!
//! Fabric is sold in meters with centimeter precision; prices carry two
//! decimal places. Everything is `rust_decimal::Decimal` end to end - no
//! float drift in the counters.

use rust_decimal::prelude::*;
use shared::{SaleError, SaleResult};

/// Monetary and quantity values use 2 decimal places, half-up
const DECIMAL_PLACES: u32 = 2;

/// Maximum quantity per campaign or order (meters)
const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 2); // 10000.00

/// Round to 2 decimal places, half-up
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Validate a quantity: positive, at most 2 decimal places, bounded
pub fn validate_quantity(quantity: Decimal) -> SaleResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(SaleError::validation(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(SaleError::validation(format!(
            "quantity exceeds maximum allowed ({MAX_QUANTITY}), got {quantity}"
        )));
    }
    if quantity != quantity.round_dp(DECIMAL_PLACES) {
        return Err(SaleError::validation(format!(
            "quantity must have at most 2 decimal places, got {quantity}"
        )));
    }
    Ok(())
}

/// Line total: `unit_price * quantity`, rounded
pub fn line_total(unit_price: Decimal, quantity: Decimal) -> Decimal {
    round2(unit_price * quantity)
}

/// Savings versus the original price: `(original - flash) * quantity`
pub fn discount_amount(original_price: Decimal, flash_price: Decimal, quantity: Decimal) -> Decimal {
    round2((original_price - flash_price) * quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(d("1.005")), d("1.01"));
        assert_eq!(round2(d("1.004")), d("1.00"));
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(d("0.50")).is_ok());
        assert!(validate_quantity(d("10000.00")).is_ok());
        assert!(validate_quantity(Decimal::ZERO).is_err());
        assert!(validate_quantity(d("-1.00")).is_err());
        assert!(validate_quantity(d("10000.01")).is_err());
        assert!(validate_quantity(d("0.125")).is_err());
    }

    #[test]
    fn test_line_total_and_discount() {
        assert_eq!(line_total(d("12.50"), d("2.40")), d("30.00"));
        assert_eq!(discount_amount(d("20.00"), d("12.50"), d("2.40")), d("18.00"));
    }
}
