//! Price Calculator
//!
//! Turns a unit price, a quantity and an optional promo discount into the
//! subtotal / discount / final amount triple stored on a purchase.
//! Pure arithmetic on `rust_decimal`, no I/O.

use serde::Serialize;

use super::money::{Money, MoneyError};
use super::promo::Discount;

/// Validated purchase quantity (at least one unit)
///
/// Large values are accepted here; a quantity above any `INTEGER` stock is
/// rejected by the stock check, not by validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Quantity(i64);

impl Quantity {
    /// Returns `None` for zero or negative values.
    pub fn new(value: i64) -> Option<Self> {
        (value >= 1).then_some(Self(value))
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    /// Column representation, `None` beyond the `INTEGER` range
    pub fn as_i32(&self) -> Option<i32> {
        i32::try_from(self.0).ok()
    }
}

/// Result of a price computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub discount: Money,
    pub final_amount: Money,
}

/// Compute `subtotal`, `discount` and `final_amount` for a purchase line.
///
/// - `subtotal = unit_price * quantity`
/// - percentage discount is `subtotal * value / 100`, rounded to minor units
/// - fixed discount is the promo value
/// - the discount is clamped to the subtotal, so the final amount is never negative
///
/// # Errors
/// `MoneyError::Overflow` if the subtotal leaves the storable range.
pub fn compute(
    unit_price: Money,
    quantity: Quantity,
    discount: Option<&Discount>,
) -> Result<PriceBreakdown, MoneyError> {
    let subtotal = unit_price.checked_mul(quantity.get())?;

    let raw_discount = match discount {
        None => Money::zero(),
        Some(Discount::Percentage(percentage)) => {
            Money::from_decimal_rounded(subtotal.value() * percentage.as_fraction())?
        }
        Some(Discount::FixedAmount(amount)) => *amount,
    };

    let discount = raw_discount.min(subtotal);
    let final_amount = subtotal.checked_sub(&discount)?;

    Ok(PriceBreakdown {
        subtotal,
        discount,
        final_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::promo::Percentage;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn money(value: Decimal) -> Money {
        Money::new(value).unwrap()
    }

    fn qty(value: i64) -> Quantity {
        Quantity::new(value).unwrap()
    }

    fn percent(value: Decimal) -> Discount {
        Discount::Percentage(Percentage::new(value).unwrap())
    }

    #[test]
    fn test_quantity_validation() {
        assert!(Quantity::new(0).is_none());
        assert!(Quantity::new(-3).is_none());
        assert_eq!(qty(5).get(), 5);
        assert_eq!(qty(5).as_i32(), Some(5));

        let huge = qty(i64::from(i32::MAX) + 1);
        assert_eq!(huge.get(), 2_147_483_648);
        assert_eq!(huge.as_i32(), None);
    }

    #[test]
    fn test_no_promo() {
        let result = compute(money(dec!(19.99)), qty(3), None).unwrap();
        assert_eq!(result.subtotal.value(), dec!(59.97));
        assert_eq!(result.discount.value(), dec!(0));
        assert_eq!(result.final_amount.value(), dec!(59.97));
    }

    #[test]
    fn test_percentage_promo_example() {
        // 100,000 x 2 at 12%
        let promo = percent(dec!(12));
        let result = compute(money(dec!(100000)), qty(2), Some(&promo)).unwrap();
        assert_eq!(result.subtotal.value(), dec!(200000));
        assert_eq!(result.discount.value(), dec!(24000));
        assert_eq!(result.final_amount.value(), dec!(176000));
    }

    #[test]
    fn test_fixed_promo_clamped_to_subtotal() {
        // 50,000 x 1 with a 60,000 voucher
        let promo = Discount::FixedAmount(money(dec!(60000)));
        let result = compute(money(dec!(50000)), qty(1), Some(&promo)).unwrap();
        assert_eq!(result.discount.value(), dec!(50000));
        assert_eq!(result.final_amount.value(), dec!(0));
    }

    #[test]
    fn test_fixed_promo_below_subtotal() {
        let promo = Discount::FixedAmount(money(dec!(15000)));
        let result = compute(money(dec!(50000)), qty(2), Some(&promo)).unwrap();
        assert_eq!(result.discount.value(), dec!(15000));
        assert_eq!(result.final_amount.value(), dec!(85000));
    }

    #[test]
    fn test_full_and_zero_percentage() {
        let full = percent(dec!(100));
        let result = compute(money(dec!(12.34)), qty(1), Some(&full)).unwrap();
        assert_eq!(result.discount, result.subtotal);
        assert!(result.final_amount.is_zero());

        let none = percent(dec!(0));
        let result = compute(money(dec!(12.34)), qty(1), Some(&none)).unwrap();
        assert!(result.discount.is_zero());
        assert_eq!(result.final_amount, result.subtotal);
    }

    #[test]
    fn test_percentage_rounds_to_minor_units() {
        // 33.33 * 12.5% = 4.16625 -> 4.17
        let promo = percent(dec!(12.5));
        let result = compute(money(dec!(33.33)), qty(1), Some(&promo)).unwrap();
        assert_eq!(result.discount.value(), dec!(4.17));
        assert_eq!(result.final_amount.value(), dec!(29.16));
    }

    #[test]
    fn test_free_product() {
        let promo = Discount::FixedAmount(money(dec!(10)));
        let result = compute(Money::zero(), qty(4), Some(&promo)).unwrap();
        assert!(result.subtotal.is_zero());
        assert!(result.discount.is_zero());
        assert!(result.final_amount.is_zero());
    }

    #[test]
    fn test_subtotal_overflow() {
        let result = compute(money(dec!(999999999999.99)), qty(2), None);
        assert!(matches!(result, Err(MoneyError::Overflow)));
    }

    #[test]
    fn test_invariants_hold_over_grid() {
        let prices = [dec!(0), dec!(0.01), dec!(9.99), dec!(50000), dec!(123456.78)];
        let quantities = [1, 2, 7, 100];
        let discounts = [
            None,
            Some(percent(dec!(0))),
            Some(percent(dec!(12))),
            Some(percent(dec!(33.33))),
            Some(percent(dec!(100))),
            Some(Discount::FixedAmount(money(dec!(0)))),
            Some(Discount::FixedAmount(money(dec!(5)))),
            Some(Discount::FixedAmount(money(dec!(60000)))),
        ];

        for price in prices {
            for quantity in quantities {
                for discount in &discounts {
                    let r = compute(money(price), qty(quantity), discount.as_ref()).unwrap();
                    assert!(r.discount.value() >= Decimal::ZERO);
                    assert!(r.discount <= r.subtotal);
                    assert_eq!(r.final_amount.value(), r.subtotal.value() - r.discount.value());
                    assert!(r.final_amount.value() >= Decimal::ZERO);
                }
            }
        }
    }
}
