//! Session transition commands.

use std::error::Error;

use suitcart_core::UserId;
use suitcart_sync::{CartScope, GuestMerge, TransitionOutcome};

use super::Context;
use super::cart::print_cart;

/// Sign in as `user`, uploading the guest cart if it holds items.
///
/// # Errors
///
/// Returns an error if the user id is invalid, no cart API is configured, or
/// the session cannot be recorded.
#[allow(clippy::print_stdout)]
pub async fn login(ctx: &Context, user: &str) -> Result<(), Box<dyn Error>> {
    let user = UserId::parse(user)?;
    let engine = ctx.engine(true)?;

    match engine.session().on_identity_change(Some(&user)).await {
        TransitionOutcome::SignedIn { user, items, merge } => {
            ctx.remember(Some(&user))?;
            match merge {
                GuestMerge::NothingToMerge => println!("Signed in as {user}"),
                GuestMerge::Uploaded => println!("Signed in as {user}; guest cart uploaded"),
                GuestMerge::AlreadyMerged => {
                    println!("Signed in as {user}; guest cart was already uploaded");
                }
                GuestMerge::Failed => {
                    println!("Signed in as {user}; guest cart upload failed, kept locally");
                }
            }
            print_cart(&CartScope::User(user), &items);
        }
        TransitionOutcome::Unchanged => println!("Already signed in as {user}"),
        other => return Err(format!("unexpected login outcome: {other:?}").into()),
    }
    Ok(())
}

/// Sign out and switch back to the guest cart.
///
/// # Errors
///
/// Returns an error if the session cannot be cleared.
#[allow(clippy::print_stdout)]
pub async fn logout(ctx: &Context) -> Result<(), Box<dyn Error>> {
    let Some(previous) = ctx.session_user()? else {
        println!("Not signed in");
        return Ok(());
    };
    let engine = ctx.engine(false)?;

    let outcome = engine.session().on_identity_change(None).await;
    ctx.remember(None)?;

    println!("Signed out {previous}");
    if let TransitionOutcome::Guest { items } = outcome {
        print_cart(&CartScope::Guest, &items);
    }
    Ok(())
}
