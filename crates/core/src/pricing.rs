//! Cart price rollup.
//!
//! Everything here is derived from the item list alone, so UI code and order
//! submission always agree on the total.
//!
//! Per line:
//! - unit price = product price + option surcharge, or the reform cost
//! - unit discount = coupon rule applied to the unit price, never more than
//!   the unit price
//! - final total = (unit price - unit discount) x quantity
//!
//! Percentage discounts are truncated to whole won before the cap is applied.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{DiscountRule, LineItem, Price};

/// Price breakdown of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinePricing {
    /// Price of one unit before discount.
    pub unit_price: Price,
    /// Discount on one unit.
    pub unit_discount: Price,
    /// `unit_price * quantity`.
    pub original_total: Price,
    /// `unit_discount * quantity`.
    pub discount_total: Price,
    /// `original_total - discount_total`.
    pub final_total: Price,
}

/// Totals across a whole cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartRollup {
    /// Sum of line prices before discounts.
    pub original_total: Price,
    /// Sum of discounts.
    pub discount_total: Price,
    /// Amount payable.
    pub final_total: Price,
    /// Sum of quantities.
    pub total_quantity: u64,
}

/// Unit price of a line before discount.
#[must_use]
pub fn unit_price(item: &LineItem) -> Price {
    match item {
        LineItem::Product(line) => {
            let surcharge = line
                .selected_option
                .as_ref()
                .map_or(Price::ZERO, |option| option.additional_price);
            line.product.price + surcharge
        }
        LineItem::Reform(line) => line.reform_data.cost,
    }
}

/// Discount a rule grants on one unit priced at `unit`.
#[must_use]
pub fn unit_discount(rule: &DiscountRule, unit: Price) -> Price {
    let discount = match rule {
        DiscountRule::Percentage { rate, max_discount } => {
            let amount = unit.amount();
            let scaled = amount
                .checked_mul(*rate)
                .map(|product| product / Decimal::ONE_HUNDRED)
                .or_else(|| (amount / Decimal::ONE_HUNDRED).checked_mul(*rate))
                .unwrap_or(amount);
            let raw = Price::new(scaled).floor();
            max_discount.map_or(raw, |cap| raw.min(cap))
        }
        DiscountRule::Fixed { amount } => *amount,
    };
    discount.max(Price::ZERO).min(unit)
}

/// Price a single line.
#[must_use]
pub fn price_line(item: &LineItem) -> LinePricing {
    let unit = unit_price(item);
    let discount = item
        .applied_coupon()
        .map_or(Price::ZERO, |coupon| unit_discount(&coupon.rule, unit));
    let quantity = item.quantity();

    LinePricing {
        unit_price: unit,
        unit_discount: discount,
        original_total: unit * quantity,
        discount_total: discount * quantity,
        final_total: unit.saturating_sub(discount) * quantity,
    }
}

/// Roll up a whole cart.
#[must_use]
pub fn rollup(items: &[LineItem]) -> CartRollup {
    items.iter().fold(CartRollup::default(), |acc, item| {
        let line = price_line(item);
        CartRollup {
            original_total: acc.original_total + line.original_total,
            discount_total: acc.discount_total + line.discount_total,
            final_total: acc.final_total + line.final_total,
            total_quantity: acc.total_quantity + u64::from(item.quantity()),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::types::{
        AppliedCoupon, CouponId, OptionId, ProductId, ProductLine, ProductSnapshot, ReformData,
        ReformLine, SelectedOption,
    };

    fn product_line(price: i64, option_surcharge: Option<i64>, quantity: u32) -> ProductLine {
        ProductLine::new(
            ProductSnapshot {
                id: ProductId::new(1),
                code: "SKU-1".to_string(),
                name: "Shirt".to_string(),
                price: Price::won(price),
                attributes: BTreeMap::new(),
            },
            option_surcharge.map(|won| SelectedOption {
                id: OptionId::new(2),
                name: "XL".to_string(),
                additional_price: Price::won(won),
            }),
            quantity,
        )
    }

    fn with_coupon(mut line: ProductLine, rule: DiscountRule) -> LineItem {
        line.applied_coupon = Some(AppliedCoupon {
            id: CouponId::new(1),
            name: "coupon".to_string(),
            rule,
        });
        LineItem::Product(line)
    }

    #[test]
    fn test_fixed_coupon_times_quantity() {
        let item = with_coupon(
            product_line(10_000, None, 3),
            DiscountRule::Fixed {
                amount: Price::won(1_000),
            },
        );
        let totals = rollup(&[item]);
        assert_eq!(totals.original_total, Price::won(30_000));
        assert_eq!(totals.discount_total, Price::won(3_000));
        assert_eq!(totals.final_total, Price::won(27_000));
        assert_eq!(totals.total_quantity, 3);
    }

    #[test]
    fn test_option_surcharge_in_unit_price() {
        let item = LineItem::Product(product_line(10_000, Some(2_500), 1));
        assert_eq!(unit_price(&item), Price::won(12_500));
    }

    #[test]
    fn test_percentage_with_cap() {
        let rule = DiscountRule::Percentage {
            rate: Decimal::from(10),
            max_discount: Some(Price::won(500)),
        };
        assert_eq!(unit_discount(&rule, Price::won(10_000)), Price::won(500));
        assert_eq!(unit_discount(&rule, Price::won(3_000)), Price::won(300));
    }

    #[test]
    fn test_percentage_truncates_to_whole_won() {
        let rule = DiscountRule::Percentage {
            rate: Decimal::from(15),
            max_discount: None,
        };
        assert_eq!(unit_discount(&rule, Price::won(999)), Price::won(149));
    }

    #[test]
    fn test_discount_never_exceeds_unit_price() {
        let rule = DiscountRule::Fixed {
            amount: Price::won(50_000),
        };
        let item = with_coupon(product_line(10_000, None, 2), rule);
        let line = price_line(&item);
        assert_eq!(line.unit_discount, Price::won(10_000));
        assert_eq!(line.final_total, Price::ZERO);
    }

    #[test]
    fn test_reform_uses_cost() {
        let item = LineItem::Reform(ReformLine::new(ReformData {
            garment: "coat".to_string(),
            measurements: BTreeMap::new(),
            tie: None,
            note: None,
            cost: Price::won(35_000),
        }));
        let totals = rollup(&[item, LineItem::Product(product_line(10_000, None, 2))]);
        assert_eq!(totals.final_total, Price::won(55_000));
        assert_eq!(totals.total_quantity, 3);
    }

    #[test]
    fn test_huge_amounts_saturate_instead_of_panicking() {
        let mut line = product_line(0, None, 2);
        line.product.price = Price::new(Decimal::MAX);
        let item = with_coupon(
            line,
            DiscountRule::Percentage {
                rate: Decimal::from(50),
                max_discount: None,
            },
        );
        let totals = rollup(&[item.clone(), item]);
        assert_eq!(totals.original_total, Price::new(Decimal::MAX));
        assert_eq!(totals.total_quantity, 4);
    }

    #[test]
    fn test_empty_cart_rolls_up_to_zero() {
        assert_eq!(rollup(&[]), CartRollup::default());
    }
}
