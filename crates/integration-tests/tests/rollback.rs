//! Failed persists restore the previous cart and tell the user.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::BTreeMap;

use suitcart_core::{LineItem, LineItemId, Price, ReformData, ReformLine};
use suitcart_integration_tests::{TestContext, product, user};
use suitcart_sync::local::GUEST_CART_KEY;
use suitcart_sync::{CartError, CartScope, InjectedFailure, MemoryStorage, RemoteOp};

fn reform_line(id: &str) -> LineItem {
    let mut line = ReformLine::new(ReformData {
        garment: "jacket".to_string(),
        measurements: BTreeMap::new(),
        tie: None,
        note: Some("shorten sleeves".to_string()),
        cost: Price::won(25_000),
    });
    line.id = LineItemId::parse(id).unwrap();
    LineItem::Reform(line)
}

#[tokio::test]
async fn test_failed_remove_keeps_item_and_reports() {
    let ctx = TestContext::new();
    let u = user("member-1");
    ctx.remote.seed(&u, vec![reform_line("item-1")]).await;
    ctx.engine.session().on_identity_change(Some(&u)).await;
    let current = ctx.engine.items().await;

    ctx.remote.fail_next(RemoteOp::Replace).await;
    let result = ctx
        .engine
        .remove_item(&current, &LineItemId::parse("item-1").unwrap())
        .await;

    assert!(matches!(result, Err(CartError::Remote(_))));
    let cached = ctx.engine.items().await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id().as_str(), "item-1");
    assert_eq!(ctx.remote.items(&u).await, current);
    assert_eq!(ctx.notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_rollback_restores_cache_and_guest_storage() {
    let ctx = TestContext::new();
    ctx.engine.session().on_identity_change(None).await;
    let before = ctx
        .engine
        .add_product(&[], &product(1, 10_000), None, 1)
        .await
        .unwrap()
        .items;
    let stored_before = ctx.storage.raw(GUEST_CART_KEY);

    ctx.storage.fail_next_set(InjectedFailure::Unavailable);
    let result = ctx
        .engine
        .update_quantity(&before, before[0].id(), 4)
        .await;

    assert!(matches!(result, Err(CartError::Local(_))));
    assert_eq!(ctx.engine.items().await, before);
    assert_eq!(ctx.storage.raw(GUEST_CART_KEY), stored_before);
    assert_eq!(ctx.notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_quota_failure_is_insufficient_space() {
    let ctx = TestContext::with_storage(MemoryStorage::with_quota(400));
    ctx.engine.session().on_identity_change(None).await;

    let mut items = Vec::new();
    let mut failure = None;
    for id in 1..=20 {
        match ctx.engine.add_product(&items, &product(id, 1_000), None, 1).await {
            Ok(added) => items = added.items,
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let err = failure.expect("quota should be hit");
    assert!(err.is_insufficient_space());
    assert!(err.to_string().contains("저장 공간 부족"));
    assert_eq!(ctx.engine.items().await, items);
    assert_eq!(ctx.local().load_guest(), items);
    assert!(ctx.notifier.messages()[0].starts_with("저장 공간 부족"));
}

#[tokio::test]
async fn test_failed_clear_keeps_server_cart() {
    let ctx = TestContext::new();
    let u = user("member-2");
    ctx.engine.session().on_identity_change(Some(&u)).await;
    let items = ctx
        .engine
        .add_product(&[], &product(2, 3_000), None, 2)
        .await
        .unwrap()
        .items;

    ctx.remote.fail_next(RemoteOp::Clear).await;
    assert!(ctx.engine.clear(&items).await.is_err());

    assert_eq!(ctx.engine.items().await, items);
    assert_eq!(ctx.remote.items(&u).await, items);
    assert_eq!(ctx.engine.scope(), CartScope::User(u));
}

#[tokio::test]
async fn test_success_after_failure_persists() {
    let ctx = TestContext::new();
    let before = ctx
        .engine
        .add_product(&[], &product(1, 10_000), None, 1)
        .await
        .unwrap()
        .items;

    ctx.storage.fail_next_set(InjectedFailure::Unavailable);
    let id = before[0].id().clone();
    assert!(ctx.engine.update_quantity(&before, &id, 2).await.is_err());

    let current = ctx.engine.items().await;
    let after = ctx.engine.update_quantity(&current, &id, 2).await.unwrap();
    assert_eq!(after[0].quantity(), 2);
    assert_eq!(ctx.local().load_guest(), after);
}
