//! Suitcart Sync - cart persistence, optimistic rollback and session migration.
//!
//! This crate keeps a cart consistent across the device, the read cache and
//! the server:
//! - [`storage`] - Synchronous key-value backends (memory, files)
//! - [`local`] - Cart snapshots in local storage, validated on read
//! - [`remote`] - The server cart store (HTTP and in-memory)
//! - [`cache`] - Scope-keyed read cache with change events
//! - [`coordinator`] - Optimistic mutations with rollback
//! - [`session`] - Guest/user transitions and guest cart upload
//! - [`engine`] - Everything above wired together for one session
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use suitcart_sync::{CartEngine, MemoryCartStore, MemoryStorage, TracingNotifier};
//!
//! let engine = CartEngine::new(
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(MemoryCartStore::new()),
//!     Arc::new(TracingNotifier),
//! );
//! engine.session().on_identity_change(None).await;
//! let current = engine.items().await;
//! let added = engine.add_product(&current, &product, None, 1).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod local;
pub mod notify;
pub mod remote;
pub mod session;
pub mod storage;

pub use cache::{CacheEvent, CartCache, CartScope};
pub use config::{ConfigError, RemoteApiConfig, SyncConfig};
pub use coordinator::{CartSync, Mutation, MutationKind};
pub use engine::{AddedProduct, CartEngine};
pub use error::{CartError, Result};
pub use local::{LocalCartStore, PersistenceError, SnapshotError};
pub use notify::{Notifier, TracingNotifier};
pub use remote::{HttpCartStore, MemoryCartStore, RemoteCartStore, RemoteError, RemoteOp};
pub use session::{GuestMerge, SessionTransitions, TransitionOutcome};
pub use storage::{FileStorage, InjectedFailure, LocalStorage, MemoryStorage, StorageError};
