//! Cart inspection commands.

use std::error::Error;

use suitcart_core::pricing::price_line;
use suitcart_core::{LineItem, UserId, rollup};
use suitcart_sync::CartScope;
use suitcart_sync::local::decode_snapshot;
use tracing::info;

use super::Context;

/// Print a cart's lines and totals.
///
/// # Errors
///
/// Returns an error if the user id is invalid or the server cart cannot be
/// fetched.
pub async fn show(ctx: &Context, user: Option<&str>) -> Result<(), Box<dyn Error>> {
    let scope = match user {
        Some(user) => CartScope::User(UserId::parse(user)?),
        None => CartScope::for_identity(ctx.session_user()?.as_ref()),
    };
    let engine = ctx.engine(scope.user().is_some())?;

    let items = engine.sync().refresh(&scope).await?;
    print_cart(&scope, &items);
    Ok(())
}

/// Report whether the stored guest cart survives validation.
///
/// # Errors
///
/// Returns an error if storage cannot be read or the stored cart is invalid.
#[allow(clippy::print_stdout)]
pub fn validate(ctx: &Context) -> Result<(), Box<dyn Error>> {
    let engine = ctx.engine(false)?;

    let Some(raw) = engine.local().raw_guest()? else {
        println!("No guest cart stored");
        return Ok(());
    };

    match decode_snapshot(&raw) {
        Ok(items) => {
            println!("Guest cart is valid ({} lines)", items.len());
            Ok(())
        }
        Err(e) => {
            println!("Guest cart is invalid and will load as empty: {e}");
            Err(e.into())
        }
    }
}

/// Empty the active cart.
///
/// # Errors
///
/// Returns an error if the cart cannot be read or cleared.
#[allow(clippy::print_stdout)]
pub async fn clear(ctx: &Context) -> Result<(), Box<dyn Error>> {
    let needs_remote = ctx.session_user()?.is_some();
    let engine = ctx.engine(needs_remote)?;
    let scope = engine.scope();

    let current = engine.sync().refresh(&scope).await?;
    engine.clear(&current).await?;

    info!(%scope, removed = current.len(), "Cart cleared");
    println!("Cleared {} lines from the {scope} cart", current.len());
    Ok(())
}

fn describe(item: &LineItem) -> String {
    match item {
        LineItem::Product(line) => match &line.selected_option {
            Some(option) => format!("{} ({})", line.product.name, option.name),
            None => line.product.name.clone(),
        },
        LineItem::Reform(line) => match &line.reform_data.tie {
            Some(tie) => format!("Reform: {} (tie: {tie})", line.reform_data.garment),
            None => format!("Reform: {}", line.reform_data.garment),
        },
    }
}

#[allow(clippy::print_stdout)]
pub(super) fn print_cart(scope: &CartScope, items: &[LineItem]) {
    println!("Cart: {scope}");
    if items.is_empty() {
        println!("  (empty)");
        return;
    }

    for item in items {
        let pricing = price_line(item);
        let coupon = item
            .applied_coupon()
            .map(|coupon| format!("  [{}: -{}]", coupon.name, pricing.discount_total))
            .unwrap_or_default();
        println!(
            "  {:<24} {:<32} x{:<3} {:>12}{coupon}",
            item.id().as_str(),
            describe(item),
            item.quantity(),
            pricing.final_total.to_string(),
        );
    }

    let totals = rollup(items);
    println!("  Items:    {}", totals.total_quantity);
    println!("  Subtotal: {}", totals.original_total);
    println!("  Discount: -{}", totals.discount_total);
    println!("  Total:    {}", totals.final_total);
}
