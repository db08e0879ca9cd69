//! Identity transitions: guest to user, user to guest, user to user.
//!
//! [`SessionTransitions`] decides which cart is active whenever the signed-in
//! identity changes and migrates data between scopes:
//!
//! - **Logout** loads the device-local guest cart. No network.
//! - **Login** fetches the server cart and, if the guest cart holds items,
//!   uploads it wholesale (the guest cart wins) and clears it. A failed upload
//!   falls back to the server cart and tells the user.
//! - **User switch** first purges everything stored locally for the previous
//!   user.
//!
//! Transitions never fail; every error degrades to a usable cart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use suitcart_core::{LineItem, UserId};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CartCache, CartScope};
use crate::error::{self, FETCH_FAILED_MESSAGE, MERGE_FAILED_MESSAGE};
use crate::local::LocalCartStore;
use crate::notify::Notifier;
use crate::remote::RemoteCartStore;

/// What happened to the guest cart during a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestMerge {
    /// The guest cart was empty.
    NothingToMerge,
    /// The guest cart replaced the server cart and was cleared.
    Uploaded,
    /// A merge lock was held and the server already held this exact guest
    /// cart; the guest copy was cleared without a second upload.
    AlreadyMerged,
    /// The upload failed; the server cart is shown instead.
    Failed,
}

/// Result of [`SessionTransitions::on_identity_change`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Another transition was running; nothing was done.
    Skipped,
    /// The identity is the one already handled.
    Unchanged,
    /// The guest cart is active.
    Guest {
        /// Guest cart now in the read cache.
        items: Vec<LineItem>,
    },
    /// A user's cart is active.
    SignedIn {
        /// The signed-in user.
        user: UserId,
        /// Cart now in the read cache.
        items: Vec<LineItem>,
        /// How the guest cart was handled.
        merge: GuestMerge,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Previous {
    Uninitialized,
    Known(Option<UserId>),
}

/// Clears the in-flight flag when a transition ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs cart migrations when the signed-in identity changes.
pub struct SessionTransitions {
    cache: Arc<CartCache>,
    local: LocalCartStore,
    remote: Arc<dyn RemoteCartStore>,
    notifier: Arc<dyn Notifier>,
    previous: Mutex<Previous>,
    in_flight: AtomicBool,
    active_scope: watch::Sender<CartScope>,
}

impl SessionTransitions {
    /// Create a handler. The guest scope is active until the first
    /// transition completes.
    #[must_use]
    pub fn new(
        cache: Arc<CartCache>,
        local: LocalCartStore,
        remote: Arc<dyn RemoteCartStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (active_scope, _) = watch::channel(CartScope::Guest);
        Self {
            cache,
            local,
            remote,
            notifier,
            previous: Mutex::new(Previous::Uninitialized),
            in_flight: AtomicBool::new(false),
            active_scope,
        }
    }

    /// Create a handler that already knows the identity of an earlier run,
    /// so that a logout or switch purges that user's local data.
    #[must_use]
    pub fn resume(
        cache: Arc<CartCache>,
        local: LocalCartStore,
        remote: Arc<dyn RemoteCartStore>,
        notifier: Arc<dyn Notifier>,
        previous: Option<UserId>,
    ) -> Self {
        let handler = Self::new(cache, local, remote, notifier);
        handler.active_scope.send_replace(CartScope::for_identity(previous.as_ref()));
        *handler.lock_previous() = Previous::Known(previous);
        handler
    }

    /// Scope whose cart is currently active.
    #[must_use]
    pub fn scope(&self) -> CartScope {
        self.active_scope.borrow().clone()
    }

    /// Watch the active scope.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartScope> {
        self.active_scope.subscribe()
    }

    /// Whether a transition is currently running.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn lock_previous(&self) -> std::sync::MutexGuard<'_, Previous> {
        self.previous.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle a change of signed-in identity.
    ///
    /// Returns [`TransitionOutcome::Skipped`] if another transition is still
    /// running; [`run`](Self::run) re-evaluates the latest identity after it.
    #[instrument(skip(self), fields(user = current.map(UserId::as_str)))]
    pub async fn on_identity_change(&self, current: Option<&UserId>) -> TransitionOutcome {
        let Some(_guard) = InFlight::enter(&self.in_flight) else {
            debug!("Transition already in flight, skipping");
            return TransitionOutcome::Skipped;
        };

        let previous = self.lock_previous().clone();
        if previous == Previous::Known(current.cloned()) {
            return TransitionOutcome::Unchanged;
        }

        if let Previous::Known(Some(prev)) = &previous
            && Some(prev) != current
        {
            self.forget_user(prev).await;
        }

        let outcome = match current {
            None => self.sign_out().await,
            Some(user) => self.sign_in(user).await,
        };

        *self.lock_previous() = Previous::Known(current.cloned());
        outcome
    }

    /// Follow an identity provider until it is dropped.
    ///
    /// The current value is handled first; later values are handled in
    /// order, with intermediate values coalesced by the channel.
    pub async fn run(&self, mut identity: watch::Receiver<Option<UserId>>) {
        loop {
            let current = identity.borrow_and_update().clone();
            let outcome = self.on_identity_change(current.as_ref()).await;
            debug!(?outcome, "Identity transition handled");
            if identity.changed().await.is_err() {
                debug!("Identity provider closed");
                break;
            }
        }
    }

    async fn forget_user(&self, user: &UserId) {
        info!(%user, "Purging previous user's local cart data");
        if let Err(e) = self.local.purge_user(user) {
            warn!(%user, error = %e, "Failed to purge previous user's cart data");
        }
        self.cache.invalidate(&CartScope::User(user.clone())).await;
    }

    async fn sign_out(&self) -> TransitionOutcome {
        let items = self.local.load_guest();
        self.cache.set(&CartScope::Guest, items.clone()).await;
        self.active_scope.send_replace(CartScope::Guest);
        error::clear_sentry_user();
        error::breadcrumb("session", "Guest cart active", &[("items", items.len().into())]);

        info!(items = items.len(), "Guest cart active");
        TransitionOutcome::Guest { items }
    }

    async fn sign_in(&self, user: &UserId) -> TransitionOutcome {
        error::set_sentry_user(user);

        let (server_items, fetched) = match self.remote.fetch_items(user).await {
            Ok(items) => (items, true),
            Err(e) => {
                error::capture(&e, "Failed to fetch server cart at login");
                self.notifier.notify(FETCH_FAILED_MESSAGE);
                (self.local.load_user_cache(user), false)
            }
        };

        let guest = self.local.load_guest();
        let (items, merge) = if guest.is_empty() {
            (server_items, GuestMerge::NothingToMerge)
        } else {
            self.merge_guest(user, guest, server_items, fetched).await
        };

        let scope = CartScope::User(user.clone());
        self.cache.set(&scope, items.clone()).await;
        if let Err(e) = self.local.save_user_cache(user, &items) {
            warn!(error = %e, "Failed to cache user cart locally");
        }
        self.active_scope.send_replace(scope);
        error::breadcrumb(
            "session",
            "User cart active",
            &[("items", items.len().into()), ("merge", format!("{merge:?}").into())],
        );

        info!(items = items.len(), ?merge, "User cart active");
        TransitionOutcome::SignedIn {
            user: user.clone(),
            items,
            merge,
        }
    }

    /// Upload a non-empty guest cart for `user`.
    ///
    /// The guest cart is only cleared once the server holds its items: either
    /// the upload succeeded, or a held merge lock plus a freshly fetched
    /// server cart equal to the guest cart show an earlier upload landed.
    async fn merge_guest(
        &self,
        user: &UserId,
        guest: Vec<LineItem>,
        server_items: Vec<LineItem>,
        fetched: bool,
    ) -> (Vec<LineItem>, GuestMerge) {
        if self.local.has_merge_lock(user) {
            if fetched && guest == server_items {
                info!("Guest cart already on the server");
                self.clear_guest();
                return (server_items, GuestMerge::AlreadyMerged);
            }
            info!("Stale merge lock, uploading guest cart");
        }
        if let Err(e) = self.local.write_merge_lock(user) {
            warn!(error = %e, "Failed to write merge lock, uploading anyway");
        }

        match self.remote.replace_items(user, &guest).await {
            Ok(()) => {
                self.clear_guest();
                info!(items = guest.len(), "Guest cart uploaded");
                (guest, GuestMerge::Uploaded)
            }
            Err(e) => {
                if let Err(release) = self.local.release_merge_lock(user) {
                    warn!(error = %release, "Failed to release merge lock");
                }
                error::capture(&e, "Guest cart upload failed");
                self.notifier.notify(MERGE_FAILED_MESSAGE);
                (server_items, GuestMerge::Failed)
            }
        }
    }

    fn clear_guest(&self) {
        if let Err(e) = self.local.clear_guest() {
            warn!(error = %e, "Failed to clear guest cart");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use suitcart_core::{Price, ProductId, ProductSnapshot, ops};

    use super::*;
    use crate::local::{GUEST_CART_KEY, merge_lock_key, user_cart_key};
    use crate::remote::{MemoryCartStore, RemoteOp};
    use crate::storage::MemoryStorage;

    struct Harness {
        storage: Arc<MemoryStorage>,
        remote: Arc<MemoryCartStore>,
        cache: Arc<CartCache>,
        notes: Arc<Mutex<Vec<String>>>,
        session: SessionTransitions,
    }

    fn harness() -> Harness {
        let storage = Arc::new(MemoryStorage::new());
        let remote = Arc::new(MemoryCartStore::new());
        let cache = Arc::new(CartCache::new());
        let notes = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let notes = Arc::clone(&notes);
            move |message: &str| notes.lock().unwrap().push(message.to_string())
        };
        let session = SessionTransitions::new(
            Arc::clone(&cache),
            LocalCartStore::new(storage.clone()),
            remote.clone(),
            Arc::new(sink),
        );
        Harness {
            storage,
            remote,
            cache,
            notes,
            session,
        }
    }

    fn items_of(id: i64, quantity: u32) -> Vec<LineItem> {
        let product = ProductSnapshot {
            id: ProductId::new(id),
            code: format!("P-{id}"),
            name: format!("Product {id}"),
            price: Price::won(5_000),
            attributes: BTreeMap::new(),
        };
        ops::add_product(&[], &product, None, quantity).next_items.into_owned()
    }

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn test_first_guest_transition_loads_guest_cart() {
        let h = harness();
        let local = LocalCartStore::new(h.storage.clone());
        local.save_guest(&items_of(1, 2)).unwrap();

        let outcome = h.session.on_identity_change(None).await;

        assert_eq!(outcome, TransitionOutcome::Guest { items: items_of(1, 2) });
        assert_eq!(h.cache.items(&CartScope::Guest).await, items_of(1, 2));
        assert_eq!(h.remote.calls(RemoteOp::Fetch), 0);
    }

    #[tokio::test]
    async fn test_login_uploads_guest_cart() {
        let h = harness();
        let u = user("u1");
        LocalCartStore::new(h.storage.clone()).save_guest(&items_of(1, 1)).unwrap();
        h.remote.seed(&u, items_of(2, 4)).await;

        let outcome = h.session.on_identity_change(Some(&u)).await;

        let TransitionOutcome::SignedIn { items, merge, .. } = outcome else {
            panic!("expected sign-in");
        };
        assert_eq!(merge, GuestMerge::Uploaded);
        assert_eq!(items, items_of(1, 1));
        assert_eq!(h.remote.items(&u).await, items_of(1, 1));
        assert!(!h.storage.contains(GUEST_CART_KEY));
        assert!(h.storage.contains(&merge_lock_key(&u)));
        assert_eq!(h.session.scope(), CartScope::User(u));
    }

    #[tokio::test]
    async fn test_login_with_empty_guest_uses_server_cart() {
        let h = harness();
        let u = user("u1");
        h.remote.seed(&u, items_of(2, 4)).await;

        let outcome = h.session.on_identity_change(Some(&u)).await;

        let TransitionOutcome::SignedIn { items, merge, .. } = outcome else {
            panic!("expected sign-in");
        };
        assert_eq!(merge, GuestMerge::NothingToMerge);
        assert_eq!(items, items_of(2, 4));
        assert_eq!(h.remote.calls(RemoteOp::Replace), 0);
        assert!(h.storage.contains(&user_cart_key(&u)));
    }

    #[tokio::test]
    async fn test_failed_upload_falls_back_and_keeps_guest() {
        let h = harness();
        let u = user("u1");
        LocalCartStore::new(h.storage.clone()).save_guest(&items_of(1, 1)).unwrap();
        h.remote.seed(&u, items_of(2, 4)).await;
        h.remote.fail_next(RemoteOp::Replace).await;

        let outcome = h.session.on_identity_change(Some(&u)).await;

        let TransitionOutcome::SignedIn { items, merge, .. } = outcome else {
            panic!("expected sign-in");
        };
        assert_eq!(merge, GuestMerge::Failed);
        assert_eq!(items, items_of(2, 4));
        assert!(h.storage.contains(GUEST_CART_KEY));
        assert!(!h.storage.contains(&merge_lock_key(&u)));
        assert_eq!(h.notes.lock().unwrap().as_slice(), [MERGE_FAILED_MESSAGE]);
    }

    #[tokio::test]
    async fn test_fetch_failure_uses_local_user_cache() {
        let h = harness();
        let u = user("u1");
        LocalCartStore::new(h.storage.clone())
            .save_user_cache(&u, &items_of(3, 1))
            .unwrap();
        h.remote.fail_next(RemoteOp::Fetch).await;

        let outcome = h.session.on_identity_change(Some(&u)).await;

        let TransitionOutcome::SignedIn { items, .. } = outcome else {
            panic!("expected sign-in");
        };
        assert_eq!(items, items_of(3, 1));
        assert_eq!(h.notes.lock().unwrap().as_slice(), [FETCH_FAILED_MESSAGE]);
    }

    #[tokio::test]
    async fn test_stale_merge_lock_still_uploads_guest() {
        let h = harness();
        let u = user("u1");
        let local = LocalCartStore::new(h.storage.clone());
        local.save_guest(&items_of(1, 1)).unwrap();
        local.write_merge_lock(&u).unwrap();
        h.remote.seed(&u, items_of(2, 4)).await;

        let outcome = h.session.on_identity_change(Some(&u)).await;

        let TransitionOutcome::SignedIn { items, merge, .. } = outcome else {
            panic!("expected sign-in");
        };
        assert_eq!(merge, GuestMerge::Uploaded);
        assert_eq!(items, items_of(1, 1));
        assert_eq!(h.remote.items(&u).await, items_of(1, 1));
        assert!(!h.storage.contains(GUEST_CART_KEY));
    }

    #[tokio::test]
    async fn test_held_lock_with_matching_server_cart_skips_upload() {
        let h = harness();
        let u = user("u1");
        let local = LocalCartStore::new(h.storage.clone());
        local.save_guest(&items_of(1, 1)).unwrap();
        local.write_merge_lock(&u).unwrap();
        h.remote.seed(&u, items_of(1, 1)).await;

        let outcome = h.session.on_identity_change(Some(&u)).await;

        let TransitionOutcome::SignedIn { items, merge, .. } = outcome else {
            panic!("expected sign-in");
        };
        assert_eq!(merge, GuestMerge::AlreadyMerged);
        assert_eq!(items, items_of(1, 1));
        assert_eq!(h.remote.calls(RemoteOp::Replace), 0);
        assert!(!h.storage.contains(GUEST_CART_KEY));
    }

    #[tokio::test]
    async fn test_held_lock_without_server_cart_keeps_guest_on_failure() {
        let h = harness();
        let u = user("u1");
        let local = LocalCartStore::new(h.storage.clone());
        local.save_guest(&items_of(1, 1)).unwrap();
        local.save_user_cache(&u, &items_of(1, 1)).unwrap();
        local.write_merge_lock(&u).unwrap();
        h.remote.fail_next(RemoteOp::Fetch).await;
        h.remote.fail_next(RemoteOp::Replace).await;

        let outcome = h.session.on_identity_change(Some(&u)).await;

        let TransitionOutcome::SignedIn { merge, .. } = outcome else {
            panic!("expected sign-in");
        };
        assert_eq!(merge, GuestMerge::Failed);
        assert_eq!(local.load_guest(), items_of(1, 1));
    }

    #[tokio::test]
    async fn test_logout_purges_user_and_loads_guest() {
        let h = harness();
        let u = user("u1");
        h.session.on_identity_change(Some(&u)).await;
        assert!(h.storage.contains(&user_cart_key(&u)));

        let outcome = h.session.on_identity_change(None).await;

        assert_eq!(outcome, TransitionOutcome::Guest { items: Vec::new() });
        assert!(!h.storage.contains(&user_cart_key(&u)));
        assert!(h.cache.get(&CartScope::User(u)).await.is_none());
        assert_eq!(h.session.scope(), CartScope::Guest);
    }

    #[tokio::test]
    async fn test_user_switch_purges_previous_user() {
        let h = harness();
        let (a, b) = (user("a"), user("b"));
        h.session.on_identity_change(Some(&a)).await;

        h.session.on_identity_change(Some(&b)).await;

        assert!(!h.storage.contains(&user_cart_key(&a)));
        assert!(h.storage.contains(&user_cart_key(&b)));
        assert_eq!(h.session.scope(), CartScope::User(b));
    }

    #[tokio::test]
    async fn test_same_identity_is_unchanged() {
        let h = harness();
        let u = user("u1");
        h.session.on_identity_change(Some(&u)).await;
        assert_eq!(
            h.session.on_identity_change(Some(&u)).await,
            TransitionOutcome::Unchanged
        );
        assert_eq!(h.remote.calls(RemoteOp::Fetch), 1);
    }

    #[tokio::test]
    async fn test_reentrant_trigger_is_skipped() {
        let h = harness();
        h.session.in_flight.store(true, Ordering::Release);
        assert_eq!(
            h.session.on_identity_change(None).await,
            TransitionOutcome::Skipped
        );
        h.session.in_flight.store(false, Ordering::Release);
        assert!(matches!(
            h.session.on_identity_change(None).await,
            TransitionOutcome::Guest { .. }
        ));
    }

    #[tokio::test]
    async fn test_resume_purges_remembered_user_on_logout() {
        let storage = Arc::new(MemoryStorage::new());
        let local = LocalCartStore::new(storage.clone());
        let u = user("u1");
        local.save_user_cache(&u, &items_of(1, 1)).unwrap();

        let session = SessionTransitions::resume(
            Arc::new(CartCache::new()),
            local,
            Arc::new(MemoryCartStore::new()),
            Arc::new(crate::notify::TracingNotifier),
            Some(u.clone()),
        );
        assert_eq!(session.scope(), CartScope::User(u.clone()));

        session.on_identity_change(None).await;
        assert!(!storage.contains(&user_cart_key(&u)));
    }

    #[tokio::test]
    async fn test_run_follows_identity_provider() {
        let h = harness();
        let u = user("u1");
        let (tx, rx) = watch::channel(Some(u.clone()));
        let mut scopes = h.session.subscribe();

        let session = Arc::new(h.session);
        let runner = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.run(rx).await })
        };

        scopes
            .wait_for(|scope| *scope == CartScope::User(u.clone()))
            .await
            .unwrap();
        tx.send(None).unwrap();
        scopes.wait_for(|scope| *scope == CartScope::Guest).await.unwrap();

        drop(tx);
        runner.await.unwrap();
    }
}
