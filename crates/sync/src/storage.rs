//! Durable key-value storage for the device-local cart.
//!
//! The [`LocalStorage`] trait is intentionally synchronous: writes are small
//! and must complete before the coordinator moves on. Implementations must
//! report quota exhaustion as [`StorageError::QuotaExceeded`] so callers can
//! tell "disk full" apart from other failures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;

/// Errors raised by a [`LocalStorage`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The value does not fit in the remaining space.
    #[error("storage quota exceeded writing {key} ({bytes} bytes)")]
    QuotaExceeded {
        /// Key being written.
        key: String,
        /// Size of the rejected value.
        bytes: usize,
    },

    /// Filesystem I/O failed.
    #[error("storage I/O error on {key}: {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The backend refused the operation for another reason.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether this error means the storage is full.
    #[must_use]
    pub const fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// Synchronous string key-value storage.
pub trait LocalStorage: Send + Sync {
    /// Read a value. Missing keys are `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::QuotaExceeded`] when out of space, other
    /// variants for backend failures.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Failure to inject into the next [`MemoryStorage::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Fail with [`StorageError::QuotaExceeded`].
    Quota,
    /// Fail with [`StorageError::Unavailable`].
    Unavailable,
}

#[derive(Default)]
struct MemoryState {
    values: HashMap<String, String>,
    fail_next_set: Option<InjectedFailure>,
}

/// In-memory storage with an optional total byte quota.
///
/// Used by tests and by embedders without a persistent disk.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    /// Create unbounded storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage that rejects writes once the stored keys and values
    /// would exceed `quota_bytes` in total.
    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            state: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Make the next `set` call fail.
    pub fn fail_next_set(&self, failure: InjectedFailure) {
        self.lock().fail_next_set = Some(failure);
    }

    /// Raw stored value, bypassing any validation.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    /// Whether `key` holds a value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().values.contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut state = self.lock();

        match state.fail_next_set.take() {
            Some(InjectedFailure::Quota) => {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    bytes: value.len(),
                });
            }
            Some(InjectedFailure::Unavailable) => {
                return Err(StorageError::Unavailable("injected failure".to_string()));
            }
            None => {}
        }

        if let Some(quota) = self.quota_bytes {
            let used: usize = state
                .values
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    bytes: value.len(),
                });
            }
        }

        state.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().values.remove(key);
        Ok(())
    }
}

/// Storage backed by one file per key inside a directory.
///
/// Keys are URL-encoded into file names, so any key maps to a single file
/// directly under the root.
pub struct FileStorage {
    root: PathBuf,
    quota_bytes: Option<usize>,
}

impl FileStorage {
    /// Open (creating if needed) storage rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>, quota_bytes: Option<usize>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            key: root.display().to_string(),
            source,
        })?;
        debug!(root = %root.display(), "Opened file storage");
        Ok(Self { root, quota_bytes })
    }

    /// Directory holding the stored files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_name(key: &str) -> String {
        url::form_urlencoded::byte_serialize(key.as_bytes()).collect()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(Self::file_name(key))
    }
}

fn map_io_error(key: &str, bytes: usize, source: std::io::Error) -> StorageError {
    match source.kind() {
        std::io::ErrorKind::StorageFull => {
            StorageError::QuotaExceeded {
                key: key.to_string(),
                bytes,
            }
        }
        _ => StorageError::Io {
            key: key.to_string(),
            source,
        },
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io_error(key, 0, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.quota_bytes.is_some_and(|quota| value.len() > quota) {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                bytes: value.len(),
            });
        }

        // Write then rename so a crash never leaves a half-written cart
        let path = self.path_for(key);
        let tmp = self.root.join(format!("{}.tmp", Self::file_name(key)));
        std::fs::write(&tmp, value).map_err(|e| map_io_error(key, value.len(), e))?;
        std::fs::rename(&tmp, &path).map_err(|e| map_io_error(key, value.len(), e))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io_error(key, 0, e)),
        }
    }
}
