//! End-to-end tests for suitcart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p suitcart-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_scenarios` - Item operations, pricing and persistence together
//! - `rollback` - Failed persists restore the previous cart
//! - `session_transitions` - Login, logout and user switches
//!
//! Everything runs in process: [`TestContext`] wires a [`CartEngine`] over
//! [`MemoryStorage`] and [`MemoryCartStore`] with a recording notifier, so
//! failures can be injected per call.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use suitcart_core::{OptionId, Price, ProductId, ProductSnapshot, SelectedOption, UserId};
use suitcart_sync::{CartEngine, LocalCartStore, MemoryCartStore, MemoryStorage, Notifier};

/// Notifier that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// Messages received so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

/// An engine with its in-memory collaborators exposed.
pub struct TestContext {
    /// Device storage.
    pub storage: Arc<MemoryStorage>,
    /// Server cart store.
    pub remote: Arc<MemoryCartStore>,
    /// Notifications shown to the user.
    pub notifier: Arc<RecordingNotifier>,
    /// Engine under test.
    pub engine: CartEngine,
}

impl TestContext {
    /// Fresh context with unlimited storage.
    #[must_use]
    pub fn new() -> Self {
        Self::with_storage(MemoryStorage::new())
    }

    /// Fresh context over the given storage.
    #[must_use]
    pub fn with_storage(storage: MemoryStorage) -> Self {
        let storage = Arc::new(storage);
        let remote = Arc::new(MemoryCartStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = CartEngine::new(storage.clone(), remote.clone(), notifier.clone());
        Self {
            storage,
            remote,
            notifier,
            engine,
        }
    }

    /// A new engine over the same device storage and server, as after a
    /// process restart that does not resume the previous session.
    #[must_use]
    pub fn restart(&self) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = CartEngine::new(self.storage.clone(), self.remote.clone(), notifier.clone());
        Self {
            storage: self.storage.clone(),
            remote: self.remote.clone(),
            notifier,
            engine,
        }
    }

    /// Direct access to device cart storage.
    #[must_use]
    pub fn local(&self) -> LocalCartStore {
        LocalCartStore::new(self.storage.clone())
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A product priced in whole won.
#[must_use]
pub fn product(id: i64, price: i64) -> ProductSnapshot {
    ProductSnapshot {
        id: ProductId::new(id),
        code: format!("SKU-{id}"),
        name: format!("Product {id}"),
        price: Price::won(price),
        attributes: BTreeMap::new(),
    }
}

/// An option with a surcharge.
#[must_use]
pub fn option(id: i64, name: &str, additional: i64) -> SelectedOption {
    SelectedOption {
        id: OptionId::new(id),
        name: name.to_string(),
        additional_price: Price::won(additional),
    }
}

/// Parse a user id.
///
/// # Panics
///
/// Panics if `id` is not a valid user id.
#[must_use]
#[allow(clippy::expect_used)]
pub fn user(id: &str) -> UserId {
    UserId::parse(id).expect("valid user id")
}
