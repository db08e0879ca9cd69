//! Cart line items.
//!
//! A cart holds two kinds of entries: product purchases, which are keyed by
//! product and selected option, and reform (alteration) requests, which each
//! describe a physical garment and therefore never merge with one another.
//!
//! ## Wire format
//!
//! Line items serialize with a `kind` discriminant and camelCase fields:
//!
//! ```json
//! { "kind": "product", "id": "7-base", "product": { ... }, "quantity": 2 }
//! { "kind": "reform", "id": "0b6f...", "quantity": 1, "reformData": { ... } }
//! ```

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CouponId, IdError, LineItemId, OptionId, ProductId};
use super::price::Price;

/// Identity segment used when no option is selected.
pub const BASE_OPTION: &str = "base";

/// Compute the identity string of a product line.
///
/// Two product lines occupy the same cart slot iff their identities match.
/// The identity doubles as the line's [`LineItemId`].
///
/// ```
/// use suitcart_core::{OptionId, ProductId, identity_of};
///
/// assert_eq!(identity_of(ProductId::new(7), None), "7-base");
/// assert_eq!(identity_of(ProductId::new(7), Some(OptionId::new(3))), "7-3");
/// ```
#[must_use]
pub fn identity_of(product_id: ProductId, option_id: Option<OptionId>) -> String {
    option_id.map_or_else(
        || format!("{product_id}-{BASE_OPTION}"),
        |option| format!("{product_id}-{option}"),
    )
}

/// Errors found when validating a decoded line item.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LineItemError {
    /// Line item id is blank or malformed.
    #[error("invalid id: {0}")]
    InvalidId(#[from] IdError),
    /// Quantity is zero.
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    /// A monetary field is negative.
    #[error("{field} must not be negative")]
    NegativeAmount {
        /// Name of the offending field.
        field: &'static str,
    },
    /// A monetary field is above [`Price::MAX_WON`].
    #[error("{field} exceeds the largest supported amount")]
    AmountTooLarge {
        /// Name of the offending field.
        field: &'static str,
    },
    /// A product line's id does not match its product/option identity.
    #[error("product line id {id} does not match identity {expected}")]
    IdentityMismatch {
        /// Stored id.
        id: String,
        /// Identity computed from product and option.
        expected: String,
    },
    /// A percentage discount is outside 0..=100.
    #[error("discount rate {0} is outside 0..=100")]
    RateOutOfRange(Decimal),
}

/// Product data captured when the item was added to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    /// Catalog product id.
    pub id: ProductId,
    /// SKU code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Base unit price before option surcharges.
    pub price: Price,
    /// Free-form catalog attributes (fabric, color, fit, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Product option chosen by the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedOption {
    /// Option id.
    pub id: OptionId,
    /// Display name.
    pub name: String,
    /// Surcharge added to the product's base price.
    pub additional_price: Price,
}

/// How a coupon reduces the unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DiscountRule {
    /// Percentage of the unit price, optionally capped.
    #[serde(rename_all = "camelCase")]
    Percentage {
        /// Percent off, 0 to 100.
        rate: Decimal,
        /// Upper bound on the per-unit discount.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_discount: Option<Price>,
    },
    /// Fixed amount off each unit.
    #[serde(rename_all = "camelCase")]
    Fixed {
        /// Won off per unit.
        amount: Price,
    },
}

/// A coupon attached to a single line.
///
/// The coupon id lives inside this value, so a line can never reference one
/// coupon id while carrying another coupon's rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon {
    /// The customer's coupon id.
    pub id: CouponId,
    /// Display name.
    pub name: String,
    /// Discount rule captured at apply time.
    pub rule: DiscountRule,
}

/// Alteration request details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReformData {
    /// Garment type being altered (e.g. "jacket", "trousers").
    pub garment: String,
    /// Measurements in centimetres, keyed by body position.
    #[serde(default)]
    pub measurements: BTreeMap<String, Decimal>,
    /// Selected tie option, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tie: Option<String>,
    /// Free-text request from the customer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Resolved price of the alteration.
    pub cost: Price,
}

/// A product purchase line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLine {
    /// Line id, equal to [`identity_of`] the product and option.
    pub id: LineItemId,
    /// Product snapshot.
    pub product: ProductSnapshot,
    /// Selected option, `None` for the base product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<SelectedOption>,
    /// Quantity, at least 1.
    pub quantity: u32,
    /// Applied coupon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_coupon: Option<AppliedCoupon>,
}

impl ProductLine {
    /// Build a new line, deriving its id from the product and option.
    #[must_use]
    pub fn new(product: ProductSnapshot, selected_option: Option<SelectedOption>, quantity: u32) -> Self {
        let identity = identity_of(product.id, selected_option.as_ref().map(|o| o.id));
        Self {
            id: LineItemId::from_identity(identity),
            product,
            selected_option,
            quantity,
            applied_coupon: None,
        }
    }

    /// This line's product/option identity.
    #[must_use]
    pub fn identity(&self) -> String {
        identity_of(self.product.id, self.selected_option.as_ref().map(|o| o.id))
    }
}

/// An alteration request line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReformLine {
    /// Random line id.
    pub id: LineItemId,
    /// Quantity; one per garment in practice.
    pub quantity: u32,
    /// Alteration details.
    pub reform_data: ReformData,
    /// Applied coupon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_coupon: Option<AppliedCoupon>,
}

impl ReformLine {
    /// Build a new reform line with a fresh id and quantity 1.
    #[must_use]
    pub fn new(reform_data: ReformData) -> Self {
        Self {
            id: LineItemId::generate(),
            quantity: 1,
            reform_data,
            applied_coupon: None,
        }
    }
}

/// A cart entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LineItem {
    /// Product purchase.
    Product(ProductLine),
    /// Alteration request.
    Reform(ReformLine),
}

impl LineItem {
    /// Line id.
    #[must_use]
    pub const fn id(&self) -> &LineItemId {
        match self {
            Self::Product(line) => &line.id,
            Self::Reform(line) => &line.id,
        }
    }

    /// Quantity.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        match self {
            Self::Product(line) => line.quantity,
            Self::Reform(line) => line.quantity,
        }
    }

    /// Applied coupon, if any.
    #[must_use]
    pub const fn applied_coupon(&self) -> Option<&AppliedCoupon> {
        match self {
            Self::Product(line) => line.applied_coupon.as_ref(),
            Self::Reform(line) => line.applied_coupon.as_ref(),
        }
    }

    /// Product/option identity; reform lines have none.
    #[must_use]
    pub fn identity(&self) -> Option<String> {
        match self {
            Self::Product(line) => Some(line.identity()),
            Self::Reform(_) => None,
        }
    }

    /// Check the constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), LineItemError> {
        self.id().validate()?;
        if self.quantity() == 0 {
            return Err(LineItemError::ZeroQuantity);
        }

        match self {
            Self::Product(line) => {
                amount_in_range("product.price", line.product.price)?;
                if let Some(option) = &line.selected_option {
                    amount_in_range("selectedOption.additionalPrice", option.additional_price)?;
                }
                let expected = line.identity();
                if line.id.as_str() != expected {
                    return Err(LineItemError::IdentityMismatch {
                        id: line.id.to_string(),
                        expected,
                    });
                }
            }
            Self::Reform(line) => amount_in_range("reformData.cost", line.reform_data.cost)?,
        }

        if let Some(coupon) = self.applied_coupon() {
            coupon.rule.validate()?;
        }
        Ok(())
    }
}

impl DiscountRule {
    fn validate(&self) -> Result<(), LineItemError> {
        match self {
            Self::Percentage { rate, max_discount } => {
                if *rate < Decimal::ZERO || *rate > Decimal::ONE_HUNDRED {
                    return Err(LineItemError::RateOutOfRange(*rate));
                }
                if let Some(cap) = max_discount {
                    amount_in_range("rule.maxDiscount", *cap)?;
                }
                Ok(())
            }
            Self::Fixed { amount } => amount_in_range("rule.amount", *amount),
        }
    }
}

fn amount_in_range(field: &'static str, price: Price) -> Result<(), LineItemError> {
    if price.is_negative() {
        Err(LineItemError::NegativeAmount { field })
    } else if price > Price::won(Price::MAX_WON) {
        Err(LineItemError::AmountTooLarge { field })
    } else {
        Ok(())
    }
}
