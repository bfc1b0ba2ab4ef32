//! Client error types.

use reqwest::StatusCode;
use thiserror::Error;

use crate::crypto::CryptoError;
use coffer_types::WireError;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error (connect, TLS, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status
        status: StatusCode,
        /// Error message from the response body
        message: String,
    },

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Response did not match the wire format.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An item route was called before register or login.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Auth response carried no token header.
    #[error("server response carried no auth token")]
    MissingToken,

    /// Server URL cannot carry item paths.
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// HTTP status of a server rejection, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
