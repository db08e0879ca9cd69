//! In-process [`RemoteCartStore`] with failure injection.
//!
//! Stands in for the cart API in tests and offline demos. Each operation can
//! be told to fail once, to exercise rollback and fallback paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use suitcart_core::{LineItem, UserId};
use tokio::sync::Mutex;

use super::{RemoteCartStore, RemoteError};

/// A remote store operation, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    /// `fetch_items`
    Fetch,
    /// `replace_items`
    Replace,
    /// `clear_items`
    Clear,
}

/// In-memory cart store.
#[derive(Default)]
pub struct MemoryCartStore {
    carts: Mutex<HashMap<UserId, Vec<LineItem>>>,
    fail_next: Mutex<HashSet<RemoteOp>>,
    fetches: AtomicUsize,
    replaces: AtomicUsize,
    clears: AtomicUsize,
}

impl MemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user's server cart.
    pub async fn seed(&self, user: &UserId, items: Vec<LineItem>) {
        self.carts.lock().await.insert(user.clone(), items);
    }

    /// Current server cart for `user`.
    pub async fn items(&self, user: &UserId) -> Vec<LineItem> {
        self.carts.lock().await.get(user).cloned().unwrap_or_default()
    }

    /// Make the next call of `op` fail with [`RemoteError::Unavailable`].
    pub async fn fail_next(&self, op: RemoteOp) {
        self.fail_next.lock().await.insert(op);
    }

    /// Number of calls made for `op`, failed ones included.
    #[must_use]
    pub fn calls(&self, op: RemoteOp) -> usize {
        self.counter(op).load(Ordering::SeqCst)
    }

    const fn counter(&self, op: RemoteOp) -> &AtomicUsize {
        match op {
            RemoteOp::Fetch => &self.fetches,
            RemoteOp::Replace => &self.replaces,
            RemoteOp::Clear => &self.clears,
        }
    }

    async fn enter(&self, op: RemoteOp) -> Result<(), RemoteError> {
        self.counter(op).fetch_add(1, Ordering::SeqCst);

        if self.fail_next.lock().await.remove(&op) {
            return Err(RemoteError::Unavailable(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCartStore for MemoryCartStore {
    async fn fetch_items(&self, user: &UserId) -> Result<Vec<LineItem>, RemoteError> {
        self.enter(RemoteOp::Fetch).await?;
        Ok(self.items(user).await)
    }

    async fn replace_items(&self, user: &UserId, items: &[LineItem]) -> Result<(), RemoteError> {
        self.enter(RemoteOp::Replace).await?;
        self.carts.lock().await.insert(user.clone(), items.to_vec());
        Ok(())
    }

    async fn clear_items(&self, user: &UserId) -> Result<(), RemoteError> {
        self.enter(RemoteOp::Clear).await?;
        self.carts.lock().await.remove(user);
        Ok(())
    }
}
