//! Error types for the client.

use ogmios_core::CoreError;
use ogmios_store::StoreError;
use ogmios_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Wire decoding error.
    #[error("protocol error: {0}")]
    Core(#[from] CoreError),

    /// Checkpoint store error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Session or transport error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// A query result that does not have the expected shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The node rejected a query.
    #[error("query {method} failed: {message}")]
    Query { method: String, message: String },
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
