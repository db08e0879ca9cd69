//! End-to-end cart scenarios over the public engine API.
//!
//! Each test drives a [`CartEngine`](suitcart_sync::CartEngine) the way a UI
//! would: read the current list, call one mutation, keep the returned list.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use suitcart_core::{
    AppliedCoupon, CouponId, DiscountRule, LineItem, LineItemId, Price, ReformData, rollup,
};
use suitcart_integration_tests::{TestContext, option, product, user};
use suitcart_sync::local::GUEST_CART_KEY;
use suitcart_sync::{CartScope, LocalStorage, TransitionOutcome};

// =============================================================================
// Merging
// =============================================================================

#[tokio::test]
async fn test_guest_adds_same_product_option_twice() {
    let ctx = TestContext::new();
    let opt_a = option(10, "A", 0);
    ctx.engine.session().on_identity_change(None).await;

    let first = ctx
        .engine
        .add_product(&[], &product(1, 10_000), Some(&opt_a), 2)
        .await
        .unwrap();
    let second = ctx
        .engine
        .add_product(&first.items, &product(1, 10_000), Some(&opt_a), 1)
        .await
        .unwrap();

    assert!(second.was_existing_item);
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].quantity(), 3);
    assert_eq!(ctx.local().load_guest(), second.items);
    assert_eq!(ctx.engine.items().await, second.items);
}

#[tokio::test]
async fn test_adds_are_associative() {
    let p = product(1, 5_000);

    let ctx = TestContext::new();
    let once = ctx.engine.add_product(&[], &p, None, 5).await.unwrap().items;

    let ctx = TestContext::new();
    let mut items = Vec::new();
    for quantity in [1, 3, 1] {
        items = ctx.engine.add_product(&items, &p, None, quantity).await.unwrap().items;
    }

    assert_eq!(items, once);
}

#[tokio::test]
async fn test_option_change_merges_into_existing_line() {
    let ctx = TestContext::new();
    let p = product(1, 10_000);
    let (opt_a, opt_b) = (option(1, "A", 0), option(2, "B", 500));

    let items = ctx.engine.add_product(&[], &p, Some(&opt_a), 1).await.unwrap().items;
    let items = ctx.engine.add_product(&items, &p, Some(&opt_b), 2).await.unwrap().items;
    let item_a = items[0].id().clone();

    let items = ctx
        .engine
        .update_product_option(&items, &item_a, Some(&opt_b), 1)
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id().as_str(), "1-2");
    assert_eq!(items[0].quantity(), 3);
}

#[tokio::test]
async fn test_reform_lines_never_merge() {
    let ctx = TestContext::new();
    let reform = || ReformData {
        garment: "trousers".to_string(),
        measurements: BTreeMap::from([("waist".to_string(), Decimal::from(82))]),
        tie: None,
        note: None,
        cost: Price::won(15_000),
    };

    let items = ctx.engine.add_reform(&[], reform()).await.unwrap();
    let items = ctx.engine.add_reform(&items, reform()).await.unwrap();

    assert_eq!(items.len(), 2);
    assert_ne!(items[0].id(), items[1].id());
    assert_eq!(rollup(&items).final_total, Price::won(30_000));
}

// =============================================================================
// Pricing
// =============================================================================

#[tokio::test]
async fn test_fixed_coupon_for_signed_in_user() {
    let ctx = TestContext::new();
    let u = user("member-1");
    ctx.engine.session().on_identity_change(Some(&u)).await;

    let items = ctx
        .engine
        .add_product(&[], &product(1, 10_000), None, 3)
        .await
        .unwrap()
        .items;
    let coupon = AppliedCoupon {
        id: CouponId::new(5),
        name: "₩1,000 off".to_string(),
        rule: DiscountRule::Fixed {
            amount: Price::won(1_000),
        },
    };
    let items = ctx
        .engine
        .apply_coupon(&items, &items[0].id().clone(), Some(coupon))
        .await
        .unwrap();

    let totals = ctx.engine.rollup().await;
    assert_eq!(totals.discount_total, Price::won(3_000));
    assert_eq!(totals.final_total, Price::won(27_000));
    assert_eq!(totals.final_total.to_string(), "₩27,000");
    assert_eq!(ctx.remote.items(&u).await, items);
}

#[tokio::test]
async fn test_capped_percentage_coupon() {
    let ctx = TestContext::new();
    let items = ctx
        .engine
        .add_product(&[], &product(1, 99_900), Some(&option(3, "XL", 100)), 2)
        .await
        .unwrap()
        .items;
    let coupon = AppliedCoupon {
        id: CouponId::new(6),
        name: "15% off, up to ₩10,000".to_string(),
        rule: DiscountRule::Percentage {
            rate: Decimal::from(15),
            max_discount: Some(Price::won(10_000)),
        },
    };
    let items = ctx
        .engine
        .apply_coupon(&items, &items[0].id().clone(), Some(coupon))
        .await
        .unwrap();

    let totals = rollup(&items);
    assert_eq!(totals.original_total, Price::won(200_000));
    assert_eq!(totals.discount_total, Price::won(20_000));
    assert_eq!(totals.final_total, Price::won(180_000));
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_corrupted_guest_cart_starts_empty() {
    let ctx = TestContext::new();
    ctx.storage
        .set(
            GUEST_CART_KEY,
            r#"{"items":[{"kind":"product","id":"1-base","quantity":0}]}"#,
        )
        .unwrap();

    let outcome = ctx.engine.session().on_identity_change(None).await;

    assert_eq!(outcome, TransitionOutcome::Guest { items: Vec::new() });
    assert_eq!(ctx.engine.scope(), CartScope::Guest);
}

#[tokio::test]
async fn test_noop_mutations_do_not_persist() {
    let ctx = TestContext::new();
    let items = ctx
        .engine
        .add_product(&[], &product(1, 1_000), None, 1)
        .await
        .unwrap()
        .items;
    let stored = ctx.storage.raw(GUEST_CART_KEY);

    let missing = LineItemId::parse("404-base").unwrap();
    let after_remove = ctx.engine.remove_item(&items, &missing).await.unwrap();
    let after_zero = ctx
        .engine
        .update_quantity(&items, items[0].id(), 0)
        .await
        .unwrap();

    assert_eq!(after_remove, items);
    assert_eq!(after_zero, items);
    assert_eq!(ctx.storage.raw(GUEST_CART_KEY), stored);
}

#[tokio::test]
async fn test_stored_items_keep_their_shape() {
    let ctx = TestContext::new();
    ctx.engine
        .add_product(&[], &product(9, 49_000), Some(&option(4, "Navy", 0)), 1)
        .await
        .unwrap();

    let raw = ctx.storage.raw(GUEST_CART_KEY).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let item = &value["items"][0];

    assert_eq!(item["kind"], "product");
    assert_eq!(item["id"], "9-4");
    assert_eq!(item["product"]["price"], "49000");
    assert_eq!(item["selectedOption"]["name"], "Navy");
    assert!(matches!(
        ctx.local().load_guest().as_slice(),
        [LineItem::Product(_)]
    ));
}
