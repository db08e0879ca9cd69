//! CLI subcommands and the state they share.

pub mod cart;
pub mod session;

use std::error::Error;
use std::sync::Arc;

use suitcart_core::UserId;
use suitcart_sync::{
    CartEngine, FileStorage, HttpCartStore, LocalStorage, MemoryCartStore, RemoteCartStore,
    SyncConfig, TracingNotifier,
};
use tracing::info;

/// Key under which the CLI remembers who ran `login` last.
const SESSION_USER_KEY: &str = "suitcart:cli-session-user";

const NO_API: &str = "SUITCART_API_URL is not set; server carts are unavailable";

/// Storage and remote store opened from configuration.
pub struct Context {
    storage: Arc<FileStorage>,
    remote: Option<Arc<dyn RemoteCartStore>>,
}

impl Context {
    /// Open local storage and, if configured, the cart API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created or the
    /// HTTP client cannot be built.
    pub fn open(config: &SyncConfig) -> Result<Self, Box<dyn Error>> {
        let storage = Arc::new(FileStorage::open(
            config.storage_dir.clone(),
            config.storage_quota_bytes,
        )?);
        info!(dir = %config.storage_dir.display(), "Opened local cart storage");

        let remote = match &config.api {
            Some(api) => {
                info!(base_url = %api.base_url, "Using cart API");
                Some(Arc::new(HttpCartStore::new(api)?) as Arc<dyn RemoteCartStore>)
            }
            None => None,
        };

        Ok(Self { storage, remote })
    }

    /// User signed in by the last `login`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value cannot be read or is not a user id.
    pub fn session_user(&self) -> Result<Option<UserId>, Box<dyn Error>> {
        match self.storage.get(SESSION_USER_KEY)? {
            Some(raw) => Ok(Some(UserId::parse(raw.trim())?)),
            None => Ok(None),
        }
    }

    /// Remember `user` as signed in, or forget the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be written.
    pub fn remember(&self, user: Option<&UserId>) -> Result<(), Box<dyn Error>> {
        match user {
            Some(user) => self.storage.set(SESSION_USER_KEY, user.as_str())?,
            None => self.storage.remove(SESSION_USER_KEY)?,
        }
        Ok(())
    }

    /// Build an engine resumed from the remembered session.
    ///
    /// Without a configured API, guest-only work still runs against an
    /// in-process store; anything that touches a server cart is refused.
    ///
    /// # Errors
    ///
    /// Returns an error if `needs_remote` is set and no API is configured.
    pub fn engine(&self, needs_remote: bool) -> Result<CartEngine, Box<dyn Error>> {
        let remote: Arc<dyn RemoteCartStore> = match &self.remote {
            Some(remote) => Arc::clone(remote),
            None if needs_remote => return Err(NO_API.into()),
            None => Arc::new(MemoryCartStore::new()),
        };

        Ok(CartEngine::resume(
            self.storage.clone(),
            remote,
            Arc::new(TracingNotifier),
            self.session_user()?,
        ))
    }
}
