//! Read cache of cart snapshots, keyed by scope.
//!
//! UI layers read carts from here and subscribe to [`CacheEvent`]s to
//! re-render. The engine only ever writes to the cache; operations always
//! receive the current list explicitly from their caller.
//!
//! Entries are never evicted or expired. A scope leaves the cache only through
//! [`CartCache::invalidate`], which session transitions call for the user
//! being signed out.

use std::fmt;
use std::sync::Arc;

use moka::future::Cache;
use suitcart_core::{LineItem, UserId};
use tokio::sync::broadcast;
use tracing::trace;

const EVENT_CAPACITY: usize = 64;

/// Which cart a snapshot belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartScope {
    /// The anonymous, device-local cart.
    Guest,
    /// A signed-in user's server-backed cart.
    User(UserId),
}

impl CartScope {
    /// Scope for an optional identity.
    #[must_use]
    pub fn for_identity(user: Option<&UserId>) -> Self {
        user.map_or(Self::Guest, |user| Self::User(user.clone()))
    }

    /// The user, if this is a user scope.
    #[must_use]
    pub const fn user(&self) -> Option<&UserId> {
        match self {
            Self::Guest => None,
            Self::User(user) => Some(user),
        }
    }
}

impl fmt::Display for CartScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest => f.write_str("guest"),
            Self::User(user) => write!(f, "user:{user}"),
        }
    }
}

/// Change notification for cache readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A new snapshot was written for the scope.
    Updated(CartScope),
    /// The scope's snapshot was dropped.
    Invalidated(CartScope),
}

/// Scope-keyed cart snapshots.
pub struct CartCache {
    entries: Cache<CartScope, Arc<[LineItem]>>,
    events: broadcast::Sender<CacheEvent>,
}

impl Default for CartCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CartCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: Cache::builder().build(),
            events,
        }
    }

    /// Replace the snapshot for `scope`.
    pub async fn set(&self, scope: &CartScope, items: Vec<LineItem>) {
        trace!(%scope, items = items.len(), "Cache write");
        self.entries.insert(scope.clone(), Arc::from(items)).await;
        // No subscribers is fine
        let _ = self.events.send(CacheEvent::Updated(scope.clone()));
    }

    /// Snapshot for `scope`, if one has been written.
    pub async fn get(&self, scope: &CartScope) -> Option<Arc<[LineItem]>> {
        self.entries.get(scope).await
    }

    /// Snapshot for `scope` as an owned list, empty if absent.
    pub async fn items(&self, scope: &CartScope) -> Vec<LineItem> {
        self.get(scope).await.map(|items| items.to_vec()).unwrap_or_default()
    }

    /// Drop the snapshot for `scope`.
    pub async fn invalidate(&self, scope: &CartScope) {
        self.entries.invalidate(scope).await;
        let _ = self.events.send(CacheEvent::Invalidated(scope.clone()));
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }
}
