//! Error types for chain-sync sessions.

use ogmios_core::{CoreError, PointStruct};
use thiserror::Error;

/// Errors that end (or interrupt) a chain-sync session.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Connection-level failure. Retried under the reconnect policy.
    #[error("transport error: {0}")]
    Transport(String),

    /// No response within the configured window. Retried like a transport error.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A frame neither wire generation understands, or an invalid point.
    #[error("protocol decode error: {0}")]
    Core(#[from] CoreError),

    /// Checkpoint store failure.
    #[error("store error: {0}")]
    Store(#[from] ogmios_store::StoreError),

    /// None of the resume points is on the node's chain.
    #[error("intersection not found (tip: {})", display_tip(.tip))]
    IntersectionNotFound { tip: Option<PointStruct> },

    /// The node reported an application error.
    #[error("node error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// The event handler failed. Never retried.
    #[error("callback failed: {0}")]
    Callback(#[source] anyhow::Error),

    /// A response that does not match the outstanding request.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Invalid session configuration.
    #[error("invalid config: {0}")]
    Config(String),

    /// The session task panicked or was aborted.
    #[error("session task failed: {0}")]
    Task(String),

    /// The session was closed.
    #[error("session cancelled")]
    Cancelled,
}

fn display_tip(tip: &Option<PointStruct>) -> String {
    tip.as_ref()
        .map_or_else(|| "unknown".to_string(), ToString::to_string)
}

impl SyncError {
    /// True if a reconnect may recover from this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Timeout(_))
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_retry() {
        assert!(SyncError::Transport("reset".into()).is_retryable());
        assert!(SyncError::Timeout("idle".into()).is_retryable());
        assert!(!SyncError::IntersectionNotFound { tip: None }.is_retryable());
        assert!(!SyncError::Callback(anyhow::anyhow!("boom")).is_retryable());
        assert!(!SyncError::Core(CoreError::UnknownMethod("x".into())).is_retryable());
    }

    #[test]
    fn test_intersection_not_found_display() {
        let err = SyncError::IntersectionNotFound {
            tip: Some(PointStruct::new(9, "ab")),
        };
        assert_eq!(err.to_string(), "intersection not found (tip: slot=9 id=ab)");
    }
}
