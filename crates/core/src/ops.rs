//! Pure cart item operations.
//!
//! Each operation takes the current item list and returns the next one. The
//! input is never modified, so callers can keep it for rollback.
//!
//! Operations return [`Cow`]: `Cow::Borrowed` hands back the input slice
//! untouched and means "nothing changed, skip persistence"; `Cow::Owned` is a
//! freshly built list.
//!
//! # Merging
//!
//! Product lines are keyed by [`identity_of`]. When an operation would create
//! a second line with an existing identity, the quantities are summed into the
//! existing line and its other fields (coupon included) are kept. Reform lines
//! never merge.

use std::borrow::Cow;

use crate::types::{
    AppliedCoupon, LineItem, LineItemId, ProductLine, ProductSnapshot, ReformData, ReformLine,
    SelectedOption, identity_of,
};

/// Result of [`add_product`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome<'a> {
    /// The next item list.
    pub next_items: Cow<'a, [LineItem]>,
    /// Whether the product merged into a line that was already in the cart.
    pub was_existing_item: bool,
}

fn position_of_identity(items: &[LineItem], identity: &str) -> Option<usize> {
    items
        .iter()
        .position(|item| matches!(item, LineItem::Product(line) if line.id.as_str() == identity))
}

fn position_of_id(items: &[LineItem], item_id: &LineItemId) -> Option<usize> {
    items.iter().position(|item| item.id() == item_id)
}

/// Return a copy of `items` with the element at `index` replaced by `f(item)`.
fn replace_at(items: &[LineItem], index: usize, f: impl FnOnce(&LineItem) -> LineItem) -> Vec<LineItem> {
    let mut next = items.to_vec();
    if let Some(slot) = next.get_mut(index) {
        *slot = f(slot);
    }
    next
}

fn with_quantity(item: &LineItem, quantity: u32) -> LineItem {
    let mut next = item.clone();
    match &mut next {
        LineItem::Product(line) => line.quantity = quantity,
        LineItem::Reform(line) => line.quantity = quantity,
    }
    next
}

/// Add a product to the cart.
///
/// If a line with the same product/option identity exists its quantity is
/// increased; otherwise a new line is appended. A `quantity` of zero changes
/// nothing.
#[must_use]
pub fn add_product<'a>(
    items: &'a [LineItem],
    product: &ProductSnapshot,
    option: Option<&SelectedOption>,
    quantity: u32,
) -> AddOutcome<'a> {
    let identity = identity_of(product.id, option.map(|o| o.id));
    let existing = position_of_identity(items, &identity);

    if quantity == 0 {
        return AddOutcome {
            next_items: Cow::Borrowed(items),
            was_existing_item: existing.is_some(),
        };
    }

    let next_items = match existing {
        Some(index) => replace_at(items, index, |item| {
            with_quantity(item, item.quantity().saturating_add(quantity))
        }),
        None => {
            let mut next = items.to_vec();
            next.push(LineItem::Product(ProductLine::new(
                product.clone(),
                option.cloned(),
                quantity,
            )));
            next
        }
    };

    AddOutcome {
        next_items: Cow::Owned(next_items),
        was_existing_item: existing.is_some(),
    }
}

/// Append a reform request. Always creates a new line.
#[must_use]
pub fn add_reform(items: &[LineItem], reform_data: ReformData) -> Vec<LineItem> {
    let mut next = items.to_vec();
    next.push(LineItem::Reform(ReformLine::new(reform_data)));
    next
}

/// Remove the line with `item_id`.
#[must_use]
pub fn remove<'a>(items: &'a [LineItem], item_id: &LineItemId) -> Cow<'a, [LineItem]> {
    if position_of_id(items, item_id).is_none() {
        return Cow::Borrowed(items);
    }
    Cow::Owned(
        items
            .iter()
            .filter(|item| item.id() != item_id)
            .cloned()
            .collect(),
    )
}

/// Set the quantity of the line with `item_id`.
///
/// Quantities below 1 are refused: the input is returned borrowed so the
/// caller can tell there is nothing to persist.
#[must_use]
pub fn update_quantity<'a>(
    items: &'a [LineItem],
    item_id: &LineItemId,
    quantity: u32,
) -> Cow<'a, [LineItem]> {
    if quantity < 1 {
        return Cow::Borrowed(items);
    }
    match position_of_id(items, item_id) {
        Some(index) if items.get(index).is_some_and(|item| item.quantity() != quantity) => {
            Cow::Owned(replace_at(items, index, |item| with_quantity(item, quantity)))
        }
        _ => Cow::Borrowed(items),
    }
}

/// Replace the tie selection of a reform line. Product lines are untouched.
#[must_use]
pub fn update_reform_option<'a>(
    items: &'a [LineItem],
    item_id: &LineItemId,
    tie: Option<String>,
) -> Cow<'a, [LineItem]> {
    let target = items
        .iter()
        .position(|item| matches!(item, LineItem::Reform(line) if &line.id == item_id));

    let Some(index) = target else {
        return Cow::Borrowed(items);
    };

    Cow::Owned(replace_at(items, index, |item| {
        let mut next = item.clone();
        if let LineItem::Reform(line) = &mut next {
            line.reform_data.tie = tie;
        }
        next
    }))
}

/// Attach `coupon` to the line with `item_id`, or detach with `None`.
#[must_use]
pub fn apply_coupon<'a>(
    items: &'a [LineItem],
    item_id: &LineItemId,
    coupon: Option<AppliedCoupon>,
) -> Cow<'a, [LineItem]> {
    let Some(index) = position_of_id(items, item_id) else {
        return Cow::Borrowed(items);
    };

    Cow::Owned(replace_at(items, index, |item| {
        let mut next = item.clone();
        match &mut next {
            LineItem::Product(line) => line.applied_coupon = coupon,
            LineItem::Reform(line) => line.applied_coupon = coupon,
        }
        next
    }))
}

/// Switch a product line to a different option.
///
/// The old line is removed. If another line already holds the new identity,
/// `quantity` is added to it; otherwise a new line with the new option and
/// `quantity` takes the old line's position. Selecting the line's current
/// option just sets its quantity.
///
/// Missing targets, reform targets and zero quantities change nothing.
#[must_use]
pub fn update_product_option<'a>(
    items: &'a [LineItem],
    item_id: &LineItemId,
    new_option: Option<&SelectedOption>,
    quantity: u32,
) -> Cow<'a, [LineItem]> {
    let Some(old_index) = position_of_id(items, item_id) else {
        return Cow::Borrowed(items);
    };
    let Some(LineItem::Product(old_line)) = items.get(old_index) else {
        return Cow::Borrowed(items);
    };
    if quantity == 0 {
        return Cow::Borrowed(items);
    }

    let new_identity = identity_of(old_line.product.id, new_option.map(|o| o.id));
    if new_identity == old_line.id.as_str() {
        return update_quantity(items, item_id, quantity);
    }

    let merge_target = position_of_identity(items, &new_identity);
    let mut next = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if i == old_index {
            if merge_target.is_none() {
                next.push(LineItem::Product(ProductLine::new(
                    old_line.product.clone(),
                    new_option.cloned(),
                    quantity,
                )));
            }
        } else if Some(i) == merge_target {
            next.push(with_quantity(item, item.quantity().saturating_add(quantity)));
        } else {
            next.push(item.clone());
        }
    }
    Cow::Owned(next)
}
