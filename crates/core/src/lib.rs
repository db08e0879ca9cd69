//! Suitcart Core - cart line items, item operations and pricing.
//!
//! This crate provides the pure half of the cart engine:
//! - [`types`] - Ids, prices and the [`LineItem`] sum type
//! - [`ops`] - Functions that compute the next item list for each mutation
//! - [`pricing`] - Per-line and whole-cart price rollup
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! storage, no HTTP clients. Persistence, rollback and session handling live
//! in `suitcart-sync`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod ops;
pub mod pricing;
pub mod types;

pub use ops::AddOutcome;
pub use pricing::{CartRollup, LinePricing, rollup};
pub use types::*;
