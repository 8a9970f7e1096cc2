//! Error types for the checkpoint store.

use ogmios_core::CoreError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored point failed to encode or decode.
    #[error("point encoding error: {0}")]
    Core(#[from] CoreError),

    /// A value does not fit the storage schema.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// The blocking task running a database call failed.
    #[error("blocking task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
