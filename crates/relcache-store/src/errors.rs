//! Error handling for relcache-store
//!
//! The adapter reports every failure as the engine's `StorageError`.

use relcache_core::StorageError;

/// Result type alias using StorageError
pub type Result<T> = std::result::Result<T, StorageError>;

/// Create a storage error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> StorageError {
    StorageError::new(err.to_string())
}
