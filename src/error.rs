//! Error types for the pub/sub engine.

use crate::types::SubscriptionId;
use thiserror::Error;

/// Main error type for pub/sub operations.
#[derive(Debug, Error)]
pub enum SubmuxError {
    /// The payload could not be serialized for the wire.
    #[error("failed to encode payload: {0}")]
    Encode(String),

    /// Received bytes were not valid for the codec.
    #[error("failed to decode message: {0}")]
    Decode(String),

    /// Unsubscribe was given an identifier with no registration.
    #[error("no subscription with id {0}")]
    SubscriptionNotFound(SubscriptionId),

    /// The broker connection reported a failure.
    #[error("broker transport error: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for SubmuxError {
    fn from(e: serde_json::Error) -> Self {
        SubmuxError::Encode(e.to_string())
    }
}

/// Result type for pub/sub operations.
pub type Result<T> = std::result::Result<T, SubmuxError>;
