//! Core types for suitcart.
//!
//! This module provides type-safe wrappers for ids and prices, and the
//! line-item sum type stored in every cart snapshot.

pub mod id;
pub mod line_item;
pub mod price;

pub use id::*;
pub use line_item::{
    AppliedCoupon, BASE_OPTION, DiscountRule, LineItem, LineItemError, ProductLine,
    ProductSnapshot, ReformData, ReformLine, SelectedOption, identity_of,
};
pub use price::Price;
