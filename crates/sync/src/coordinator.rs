//! Optimistic cart mutations with rollback.
//!
//! Every mutation follows the same protocol:
//!
//! 1. Snapshot - the caller keeps the previous list in the [`Mutation`]
//! 2. Apply - the next list goes into the read cache before any I/O
//! 3. Commit or revert - the next list is persisted (server for users,
//!    device storage for guests); on failure the previous list is restored
//!    to the cache and, for guests, to device storage, the user is notified
//!    and the error is returned
//!
//! Mutations are not queued. Two overlapping commits for the same scope race
//! and the last successful persist wins; callers await one commit before
//! issuing the next from the same control.

use std::borrow::Cow;
use std::sync::Arc;

use suitcart_core::LineItem;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{CartCache, CartScope};
use crate::error::{self, CartError};
use crate::local::LocalCartStore;
use crate::notify::Notifier;
use crate::remote::RemoteCartStore;

/// How the next list is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Bulk replace with the next list.
    Replace,
    /// Bulk delete; the next list is empty.
    Clear,
}

/// A pending cart change: the list before and the list after.
#[derive(Debug, Clone)]
pub struct Mutation<'a> {
    scope: CartScope,
    previous: &'a [LineItem],
    next: Cow<'a, [LineItem]>,
    kind: MutationKind,
}

impl<'a> Mutation<'a> {
    /// Replace `previous` with `next`.
    ///
    /// A borrowed `next` (as returned by item operations that changed
    /// nothing) makes the mutation a no-op.
    #[must_use]
    pub const fn replace(
        scope: CartScope,
        previous: &'a [LineItem],
        next: Cow<'a, [LineItem]>,
    ) -> Self {
        Self {
            scope,
            previous,
            next,
            kind: MutationKind::Replace,
        }
    }

    /// Empty the cart.
    #[must_use]
    pub const fn clear(scope: CartScope, previous: &'a [LineItem]) -> Self {
        Self {
            scope,
            previous,
            next: Cow::Owned(Vec::new()),
            kind: MutationKind::Clear,
        }
    }

    /// Scope the mutation applies to.
    #[must_use]
    pub const fn scope(&self) -> &CartScope {
        &self.scope
    }

    /// Kind of persistence call.
    #[must_use]
    pub const fn kind(&self) -> MutationKind {
        self.kind
    }

    /// Whether there is nothing to persist.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(
            (self.kind, &self.next),
            (MutationKind::Replace, Cow::Borrowed(_))
        )
    }
}

/// Applies [`Mutation`]s: cache first, then storage, rolling back on failure.
#[derive(Clone)]
pub struct CartSync {
    cache: Arc<CartCache>,
    local: LocalCartStore,
    remote: Arc<dyn RemoteCartStore>,
    notifier: Arc<dyn Notifier>,
}

impl CartSync {
    /// Create a coordinator over the given collaborators.
    #[must_use]
    pub fn new(
        cache: Arc<CartCache>,
        local: LocalCartStore,
        remote: Arc<dyn RemoteCartStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            cache,
            local,
            remote,
            notifier,
        }
    }

    /// Apply a mutation and persist it.
    ///
    /// Returns the committed list. No-op mutations return the previous list
    /// without touching the cache or any store.
    ///
    /// # Errors
    ///
    /// Returns the persistence error after the previous list has been
    /// restored and the user notified.
    #[instrument(skip(self, mutation), fields(scope = %mutation.scope, kind = ?mutation.kind))]
    pub async fn commit(&self, mutation: Mutation<'_>) -> Result<Vec<LineItem>, CartError> {
        if mutation.is_noop() {
            debug!("Nothing changed, skipping persistence");
            return Ok(mutation.previous.to_vec());
        }

        let Mutation {
            scope,
            previous,
            next,
            kind,
        } = mutation;
        let next = next.into_owned();

        self.cache.set(&scope, next.clone()).await;

        match self.persist(&scope, kind, &next).await {
            Ok(()) => {
                info!(items = next.len(), "Cart committed");
                error::breadcrumb(
                    "cart",
                    "Cart committed",
                    &[("scope", scope.to_string().into()), ("items", next.len().into())],
                );
                Ok(next)
            }
            Err(err) => {
                self.rollback(&scope, previous).await;
                error::capture(&err, "Cart persist failed, rolled back");
                self.notifier.notify(err.user_message());
                Err(err)
            }
        }
    }

    async fn persist(
        &self,
        scope: &CartScope,
        kind: MutationKind,
        next: &[LineItem],
    ) -> Result<(), CartError> {
        match (scope, kind) {
            (CartScope::Guest, MutationKind::Replace) => self.local.save_guest(next)?,
            (CartScope::Guest, MutationKind::Clear) => self.local.clear_guest()?,
            (CartScope::User(user), MutationKind::Replace) => {
                self.remote.replace_items(user, next).await?;
            }
            (CartScope::User(user), MutationKind::Clear) => self.remote.clear_items(user).await?,
        }
        Ok(())
    }

    async fn rollback(&self, scope: &CartScope, previous: &[LineItem]) {
        warn!(%scope, items = previous.len(), "Rolling back cart");
        self.cache.set(scope, previous.to_vec()).await;

        if *scope == CartScope::Guest
            && let Err(e) = self.local.save_guest(previous)
        {
            error!(error = %e, "Failed to restore guest cart in local storage");
        }
    }

    /// Reload a scope's snapshot from its authoritative store into the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote fetch fails; the cache is untouched.
    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn refresh(&self, scope: &CartScope) -> Result<Vec<LineItem>, CartError> {
        let items = match scope {
            CartScope::Guest => self.local.load_guest(),
            CartScope::User(user) => self.remote.fetch_items(user).await?,
        };
        self.cache.set(scope, items.clone()).await;
        Ok(items)
    }
}
