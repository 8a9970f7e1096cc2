//! Error types for the Ogmios core model.

use thiserror::Error;

/// Errors produced while constructing, encoding or decoding core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid point: {0}")]
    InvalidPoint(String),

    /// Neither wire generation matched. Carries both underlying decode errors.
    #[error("incompatible wire format for {kind}: current: {current}; legacy: {legacy}")]
    IncompatibleWireFormat {
        kind: &'static str,
        current: String,
        legacy: String,
    },

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("wrong variant: expected {expected}, got {actual}")]
    WrongVariant {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cbor encoding error: {0}")]
    CborEncoding(String),

    #[error("cbor decoding error: {0}")]
    CborDecoding(String),

    #[error("attribute error: {0}")]
    Attribute(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

impl CoreError {
    /// True for errors that mean the peer speaks a protocol we do not understand.
    pub fn is_protocol_mismatch(&self) -> bool {
        matches!(
            self,
            CoreError::IncompatibleWireFormat { .. } | CoreError::UnknownMethod(_)
        )
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
