//! Server-side cart storage.
//!
//! # Contract
//!
//! - `fetch_items` is a plain read
//! - `replace_items` swaps the whole cart atomically (all or nothing)
//! - `clear_items` deletes the whole cart
//!
//! All three must be safe to retry.

mod http;
mod memory;

pub use http::HttpCartStore;
pub use memory::{MemoryCartStore, RemoteOp};

use async_trait::async_trait;
use suitcart_core::{LineItem, UserId};
use thiserror::Error;

use crate::local::SnapshotError;

/// Errors returned by a [`RemoteCartStore`].
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// First part of the response body.
        body: String,
    },

    /// Response body was not a cart envelope.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Server returned a cart that fails validation.
    #[error("invalid cart from server: {0}")]
    InvalidSnapshot(#[from] SnapshotError),

    /// Rate limited by the server.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Endpoint URL could not be built.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Store unreachable or refusing requests.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

/// Authoritative cart storage for signed-in users.
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// Read a user's cart. A user without a cart has an empty one.
    async fn fetch_items(&self, user: &UserId) -> Result<Vec<LineItem>, RemoteError>;

    /// Replace a user's cart with `items`.
    async fn replace_items(&self, user: &UserId, items: &[LineItem]) -> Result<(), RemoteError>;

    /// Delete a user's cart.
    async fn clear_items(&self, user: &UserId) -> Result<(), RemoteError>;
}
