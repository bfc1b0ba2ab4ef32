//! Error types for Coffer wire types.

use thiserror::Error;

/// Errors raised while interpreting wire data.
#[derive(Debug, Error)]
pub enum WireError {
    /// Unknown item type discriminator
    #[error("unknown item type: {0}")]
    UnknownKind(String),

    /// Item key is empty
    #[error("item key cannot be empty")]
    EmptyKey,

    /// Envelope type does not match the endpoint it was sent to
    #[error("item type mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        /// Kind served by the endpoint
        expected: String,
        /// Kind declared in the envelope
        actual: String,
    },

    /// Card validity month outside 1..=12
    #[error("invalid card month: {0}")]
    InvalidMonth(u8),

    /// A non-binary item arrived without its payload
    #[error("item {0} has no payload")]
    MissingPayload(String),

    /// Payload JSON did not match the declared kind
    #[error("invalid payload: {0}")]
    Payload(#[source] serde_json::Error),
}
