//! Per-session wiring of the cart engine.
//!
//! [`CartEngine`] owns one read cache, one coordinator and one session
//! handler. Every mutation takes the caller's current list, computes the next
//! one with a `suitcart_core::ops` function and commits it for the active
//! scope.

use std::borrow::Cow;
use std::sync::Arc;

use suitcart_core::{
    AppliedCoupon, CartRollup, LineItem, LineItemId, ProductSnapshot, ReformData, SelectedOption,
    UserId, ops, rollup,
};
use tracing::instrument;

use crate::cache::{CartCache, CartScope};
use crate::coordinator::{CartSync, Mutation};
use crate::error::Result;
use crate::local::LocalCartStore;
use crate::notify::Notifier;
use crate::remote::RemoteCartStore;
use crate::session::SessionTransitions;
use crate::storage::LocalStorage;

/// Committed result of [`CartEngine::add_product`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedProduct {
    /// The committed list.
    pub items: Vec<LineItem>,
    /// Whether the product merged into an existing line.
    pub was_existing_item: bool,
}

/// Cart engine for one application session.
#[derive(Clone)]
pub struct CartEngine {
    cache: Arc<CartCache>,
    local: LocalCartStore,
    sync: CartSync,
    session: Arc<SessionTransitions>,
}

impl CartEngine {
    /// Wire an engine over a storage backend, a remote store and a notifier.
    #[must_use]
    pub fn new(
        storage: Arc<dyn LocalStorage>,
        remote: Arc<dyn RemoteCartStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::resume(storage, remote, notifier, None)
    }

    /// Like [`new`](Self::new), for a process that knows which user was
    /// signed in when it last ran.
    #[must_use]
    pub fn resume(
        storage: Arc<dyn LocalStorage>,
        remote: Arc<dyn RemoteCartStore>,
        notifier: Arc<dyn Notifier>,
        previous: Option<UserId>,
    ) -> Self {
        let cache = Arc::new(CartCache::new());
        let local = LocalCartStore::new(storage);
        let sync = CartSync::new(
            Arc::clone(&cache),
            local.clone(),
            Arc::clone(&remote),
            Arc::clone(&notifier),
        );
        let session = if previous.is_some() {
            SessionTransitions::resume(Arc::clone(&cache), local.clone(), remote, notifier, previous)
        } else {
            SessionTransitions::new(Arc::clone(&cache), local.clone(), remote, notifier)
        };

        Self {
            cache,
            local,
            sync,
            session: Arc::new(session),
        }
    }

    /// The read cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<CartCache> {
        &self.cache
    }

    /// The local cart store.
    #[must_use]
    pub const fn local(&self) -> &LocalCartStore {
        &self.local
    }

    /// The mutation coordinator.
    #[must_use]
    pub const fn sync(&self) -> &CartSync {
        &self.sync
    }

    /// The session handler.
    #[must_use]
    pub const fn session(&self) -> &Arc<SessionTransitions> {
        &self.session
    }

    /// Scope of the active cart.
    #[must_use]
    pub fn scope(&self) -> CartScope {
        self.session.scope()
    }

    /// Active cart as currently cached.
    pub async fn items(&self) -> Vec<LineItem> {
        self.cache.items(&self.scope()).await
    }

    /// Price rollup of the active cart.
    pub async fn rollup(&self) -> CartRollup {
        rollup(&self.items().await)
    }

    async fn commit(&self, current: &[LineItem], next: Cow<'_, [LineItem]>) -> Result<Vec<LineItem>> {
        self.sync
            .commit(Mutation::replace(self.scope(), current, next))
            .await
    }

    /// Add `quantity` of a product, merging into an existing line.
    ///
    /// # Errors
    ///
    /// Returns the persistence error after rollback.
    #[instrument(skip(self, current, product, option), fields(product_id = %product.id))]
    pub async fn add_product(
        &self,
        current: &[LineItem],
        product: &ProductSnapshot,
        option: Option<&SelectedOption>,
        quantity: u32,
    ) -> Result<AddedProduct> {
        let outcome = ops::add_product(current, product, option, quantity);
        let items = self.commit(current, outcome.next_items).await?;
        Ok(AddedProduct {
            items,
            was_existing_item: outcome.was_existing_item,
        })
    }

    /// Append a reform request.
    ///
    /// # Errors
    ///
    /// Returns the persistence error after rollback.
    #[instrument(skip_all)]
    pub async fn add_reform(&self, current: &[LineItem], reform_data: ReformData) -> Result<Vec<LineItem>> {
        let next = ops::add_reform(current, reform_data);
        self.commit(current, next.into()).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns the persistence error after rollback.
    #[instrument(skip(self, current), fields(item_id = %item_id))]
    pub async fn remove_item(&self, current: &[LineItem], item_id: &LineItemId) -> Result<Vec<LineItem>> {
        self.commit(current, ops::remove(current, item_id)).await
    }

    /// Set a line's quantity. Zero is ignored.
    ///
    /// # Errors
    ///
    /// Returns the persistence error after rollback.
    #[instrument(skip(self, current), fields(item_id = %item_id))]
    pub async fn update_quantity(
        &self,
        current: &[LineItem],
        item_id: &LineItemId,
        quantity: u32,
    ) -> Result<Vec<LineItem>> {
        self.commit(current, ops::update_quantity(current, item_id, quantity))
            .await
    }

    /// Change the tie selection of a reform line.
    ///
    /// # Errors
    ///
    /// Returns the persistence error after rollback.
    #[instrument(skip(self, current), fields(item_id = %item_id))]
    pub async fn update_reform_option(
        &self,
        current: &[LineItem],
        item_id: &LineItemId,
        tie: Option<String>,
    ) -> Result<Vec<LineItem>> {
        self.commit(current, ops::update_reform_option(current, item_id, tie))
            .await
    }

    /// Attach or detach a coupon.
    ///
    /// # Errors
    ///
    /// Returns the persistence error after rollback.
    #[instrument(skip(self, current, coupon), fields(item_id = %item_id))]
    pub async fn apply_coupon(
        &self,
        current: &[LineItem],
        item_id: &LineItemId,
        coupon: Option<AppliedCoupon>,
    ) -> Result<Vec<LineItem>> {
        self.commit(current, ops::apply_coupon(current, item_id, coupon))
            .await
    }

    /// Switch a product line to another option.
    ///
    /// # Errors
    ///
    /// Returns the persistence error after rollback.
    #[instrument(skip(self, current, option), fields(item_id = %item_id))]
    pub async fn update_product_option(
        &self,
        current: &[LineItem],
        item_id: &LineItemId,
        option: Option<&SelectedOption>,
        quantity: u32,
    ) -> Result<Vec<LineItem>> {
        let next = ops::update_product_option(current, item_id, option, quantity);
        self.commit(current, next).await
    }

    /// Empty the active cart.
    ///
    /// # Errors
    ///
    /// Returns the persistence error after rollback.
    #[instrument(skip_all)]
    pub async fn clear(&self, current: &[LineItem]) -> Result<Vec<LineItem>> {
        self.sync.commit(Mutation::clear(self.scope(), current)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use suitcart_core::{CouponId, DiscountRule, OptionId, Price, ProductId};

    use super::*;
    use crate::notify::TracingNotifier;
    use crate::remote::MemoryCartStore;
    use crate::storage::MemoryStorage;

    fn engine() -> (Arc<MemoryCartStore>, CartEngine) {
        let remote = Arc::new(MemoryCartStore::new());
        let engine = CartEngine::new(
            Arc::new(MemoryStorage::new()),
            remote.clone(),
            Arc::new(TracingNotifier),
        );
        (remote, engine)
    }

    fn shirt() -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(7),
            code: "SH-7".to_string(),
            name: "Poplin shirt".to_string(),
            price: Price::won(10_000),
            attributes: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_guest_mutations_flow_through_cache() {
        let (_, engine) = engine();

        let added = engine.add_product(&[], &shirt(), None, 1).await.unwrap();
        assert!(!added.was_existing_item);
        let added = engine.add_product(&added.items, &shirt(), None, 2).await.unwrap();
        assert!(added.was_existing_item);

        assert_eq!(engine.items().await, added.items);
        assert_eq!(engine.local().load_guest(), added.items);
        assert_eq!(engine.rollup().await.total_quantity, 3);
    }

    #[tokio::test]
    async fn test_coupon_and_clear_for_user() {
        let (remote, engine) = engine();
        let user = UserId::parse("u1").unwrap();
        engine.session().on_identity_change(Some(&user)).await;

        let items = engine.add_product(&[], &shirt(), None, 3).await.unwrap().items;
        let id = items[0].id().clone();
        let coupon = AppliedCoupon {
            id: CouponId::new(1),
            name: "1,000 off".to_string(),
            rule: DiscountRule::Fixed {
                amount: Price::won(1_000),
            },
        };
        let items = engine.apply_coupon(&items, &id, Some(coupon)).await.unwrap();
        assert_eq!(engine.rollup().await.discount_total, Price::won(3_000));
        assert_eq!(remote.items(&user).await, items);

        let items = engine.clear(&items).await.unwrap();
        assert!(items.is_empty());
        assert!(remote.items(&user).await.is_empty());
    }

    #[tokio::test]
    async fn test_reform_lines_and_option_switch() {
        let (_, engine) = engine();
        let items = engine
            .add_reform(
                &[],
                ReformData {
                    garment: "suit jacket".to_string(),
                    measurements: BTreeMap::new(),
                    tie: None,
                    note: None,
                    cost: Price::won(20_000),
                },
            )
            .await
            .unwrap();
        let reform_id = items[0].id().clone();
        let items = engine
            .update_reform_option(&items, &reform_id, Some("navy".to_string()))
            .await
            .unwrap();
        let LineItem::Reform(line) = &items[0] else {
            panic!("expected reform line");
        };
        assert_eq!(line.reform_data.tie.as_deref(), Some("navy"));

        let items = engine.add_product(&items, &shirt(), None, 1).await.unwrap().items;
        let large = SelectedOption {
            id: OptionId::new(2),
            name: "L".to_string(),
            additional_price: Price::won(1_000),
        };
        let product_id = items[1].id().clone();
        let items = engine
            .update_product_option(&items, &product_id, Some(&large), 2)
            .await
            .unwrap();
        assert_eq!(items[1].id().as_str(), "7-2");
        assert_eq!(items[1].quantity(), 2);

        let items = engine.update_quantity(&items, &items[1].id().clone(), 5).await.unwrap();
        let items = engine.remove_item(&items, &reform_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity(), 5);
    }
}
