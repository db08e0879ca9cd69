//! Device-local cart persistence.
//!
//! Carts are stored as a versionless JSON envelope, `{"items": [...]}`.
//! Reads never fail: unparseable or invalid data is logged and treated as an
//! empty cart, so a corrupted entry can never take the cart down with it.
//!
//! # Keys
//!
//! - `suitcart:guest-cart` - the anonymous cart
//! - `suitcart:user-cart:{user}` - last known cart of a signed-in user
//! - `suitcart:merge-lock:{user}` - set while/after the guest cart has been
//!   uploaded for that user, cleared on logout

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use suitcart_core::{LineItem, LineItemError, UserId};
use thiserror::Error;
use tracing::{debug, warn};

use crate::storage::{LocalStorage, StorageError};

/// Key of the guest cart.
pub const GUEST_CART_KEY: &str = "suitcart:guest-cart";

const USER_CART_PREFIX: &str = "suitcart:user-cart:";
const MERGE_LOCK_PREFIX: &str = "suitcart:merge-lock:";

/// Key of a user's cached cart.
#[must_use]
pub fn user_cart_key(user: &UserId) -> String {
    format!("{USER_CART_PREFIX}{user}")
}

/// Key of a user's merge lock.
#[must_use]
pub fn merge_lock_key(user: &UserId) -> String {
    format!("{MERGE_LOCK_PREFIX}{user}")
}

/// Errors writing a cart to local storage.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The device has no room left for the cart.
    #[error("저장 공간 부족: 장바구니를 저장할 공간이 없습니다")]
    InsufficientSpace(#[source] StorageError),

    /// Any other storage failure.
    #[error(transparent)]
    Storage(StorageError),

    /// The cart could not be encoded.
    #[error("failed to encode cart: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<StorageError> for PersistenceError {
    fn from(err: StorageError) -> Self {
        if err.is_quota_exceeded() {
            Self::InsufficientSpace(err)
        } else {
            Self::Storage(err)
        }
    }
}

/// Reasons a stored snapshot is rejected.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Not JSON, or the JSON does not have the envelope/item shape.
    #[error("malformed cart data: {0}")]
    Malformed(#[from] serde_json::Error),

    /// An item decoded but broke a constraint.
    #[error("invalid item at index {index}: {source}")]
    InvalidItem {
        /// Position in the stored list.
        index: usize,
        /// Violated constraint.
        #[source]
        source: LineItemError,
    },

    /// Two product lines share an identity.
    #[error("duplicate product line {0}")]
    DuplicateIdentity(String),
}

#[derive(Deserialize)]
struct CartEnvelope {
    items: Vec<LineItem>,
}

#[derive(Serialize)]
struct CartEnvelopeRef<'a> {
    items: &'a [LineItem],
}

/// Encode items as a cart envelope.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_snapshot(items: &[LineItem]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&CartEnvelopeRef { items })
}

/// Decode and validate a cart envelope.
///
/// # Errors
///
/// Returns the first problem found; see [`SnapshotError`].
pub fn decode_snapshot(raw: &str) -> Result<Vec<LineItem>, SnapshotError> {
    let envelope: CartEnvelope = serde_json::from_str(raw)?;
    validate_items(&envelope.items)?;
    Ok(envelope.items)
}

/// Check every item and the identity-uniqueness rule.
///
/// # Errors
///
/// Returns the first problem found.
pub fn validate_items(items: &[LineItem]) -> Result<(), SnapshotError> {
    let mut identities = HashSet::new();
    for (index, item) in items.iter().enumerate() {
        item.validate()
            .map_err(|source| SnapshotError::InvalidItem { index, source })?;
        if let Some(identity) = item.identity()
            && !identities.insert(identity.clone())
        {
            return Err(SnapshotError::DuplicateIdentity(identity));
        }
    }
    Ok(())
}

/// Decode a cart envelope, returning an empty cart for anything invalid.
#[must_use]
pub fn parse_snapshot(raw: &str) -> Vec<LineItem> {
    decode_snapshot(raw).unwrap_or_else(|e| {
        warn!(error = %e, "Discarding invalid stored cart");
        Vec::new()
    })
}

/// Cart-aware wrapper over a [`LocalStorage`] backend.
#[derive(Clone)]
pub struct LocalCartStore {
    storage: Arc<dyn LocalStorage>,
}

impl LocalCartStore {
    /// Wrap a storage backend.
    #[must_use]
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self { storage }
    }

    fn load(&self, key: &str) -> Vec<LineItem> {
        match self.storage.get(key) {
            Ok(Some(raw)) => parse_snapshot(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key, error = %e, "Failed to read stored cart");
                Vec::new()
            }
        }
    }

    fn save(&self, key: &str, items: &[LineItem]) -> Result<(), PersistenceError> {
        let raw = serialize_snapshot(items)?;
        self.storage.set(key, &raw)?;
        debug!(key, items = items.len(), "Saved cart");
        Ok(())
    }

    /// Raw guest cart entry, for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn raw_guest(&self) -> Result<Option<String>, StorageError> {
        self.storage.get(GUEST_CART_KEY)
    }

    /// Load the guest cart. Never fails.
    #[must_use]
    pub fn load_guest(&self) -> Vec<LineItem> {
        self.load(GUEST_CART_KEY)
    }

    /// Save the guest cart.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InsufficientSpace`] when storage is full.
    pub fn save_guest(&self, items: &[LineItem]) -> Result<(), PersistenceError> {
        self.save(GUEST_CART_KEY, items)
    }

    /// Delete the guest cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the delete.
    pub fn clear_guest(&self) -> Result<(), PersistenceError> {
        self.storage.remove(GUEST_CART_KEY)?;
        Ok(())
    }

    /// Load a user's cached cart. Never fails.
    #[must_use]
    pub fn load_user_cache(&self, user: &UserId) -> Vec<LineItem> {
        self.load(&user_cart_key(user))
    }

    /// Cache a user's cart for offline use.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InsufficientSpace`] when storage is full.
    pub fn save_user_cache(&self, user: &UserId, items: &[LineItem]) -> Result<(), PersistenceError> {
        self.save(&user_cart_key(user), items)
    }

    /// Whether the merge lock is held for `user`.
    #[must_use]
    pub fn has_merge_lock(&self, user: &UserId) -> bool {
        match self.storage.get(&merge_lock_key(user)) {
            Ok(value) => value.is_some(),
            Err(e) => {
                warn!(%user, error = %e, "Failed to read merge lock");
                false
            }
        }
    }

    /// Stamp the merge lock for `user` with the current time, replacing any
    /// earlier stamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be written.
    pub fn write_merge_lock(&self, user: &UserId) -> Result<(), PersistenceError> {
        let stamp = chrono::Utc::now().to_rfc3339();
        self.storage.set(&merge_lock_key(user), &stamp)?;
        Ok(())
    }

    /// Release the merge lock for `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the delete.
    pub fn release_merge_lock(&self, user: &UserId) -> Result<(), PersistenceError> {
        self.storage.remove(&merge_lock_key(user))?;
        Ok(())
    }

    /// Remove everything stored for `user`.
    ///
    /// Both keys are attempted even if the first delete fails.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn purge_user(&self, user: &UserId) -> Result<(), PersistenceError> {
        let cache = self.storage.remove(&user_cart_key(user));
        let lock = self.storage.remove(&merge_lock_key(user));
        cache?;
        lock?;
        debug!(%user, "Purged local user cart data");
        Ok(())
    }
}
