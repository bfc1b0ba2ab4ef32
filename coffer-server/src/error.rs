//! Error types for coffer-server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use coffer_types::WireError;
use std::path::PathBuf;

/// Main error type for server lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Token authority could not be built.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Certificate or key could not be loaded.
    #[error("failed to load TLS material ({cert}, {key}): {source}")]
    Tls {
        /// Certificate path.
        cert: PathBuf,
        /// Key path.
        key: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Bind address did not resolve.
    #[error("cannot resolve bind address: {0}")]
    Resolve(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Username already registered.
    #[error("user already exists: {username}")]
    UserExists {
        /// The conflicting username.
        username: String,
    },

    /// No such user.
    #[error("user not found: {username}")]
    UserNotFound {
        /// The missing username.
        username: String,
    },

    /// Key already used by this owner.
    #[error("item key already exists: {key}")]
    KeyExists {
        /// The conflicting key.
        key: String,
    },

    /// No item under this key, or not of the requested kind.
    #[error("item not found: {key}")]
    KeyNotFound {
        /// The missing key.
        key: String,
    },

    /// Stored rows violate an invariant the schema cannot express.
    #[error("corrupt item {item_id}: {reason}")]
    Corrupt {
        /// Internal item id.
        item_id: i64,
        /// What was wrong.
        reason: String,
    },

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Token and password errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Request carried no token.
    #[error("no auth token")]
    MissingToken,

    /// Token failed verification.
    #[error("invalid token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    /// Token could not be signed.
    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(String),

    /// Secret generation failed.
    #[error("secret generation failed: {0}")]
    Random(String),
}

/// Error returned by HTTP handlers, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or invalid request.
    #[error("{0}")]
    BadRequest(String),

    /// Missing, invalid or unusable credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Username or key already exists.
    #[error("{0}")]
    Conflict(String),

    /// No such item.
    #[error("{0}")]
    NotFound(String),

    /// Anything else. The cause is logged, never sent.
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log `cause` and return the opaque internal error.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "request failed");
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UserExists { .. } => ApiError::Conflict("user already exists".into()),
            StorageError::UserNotFound { .. } => {
                ApiError::Unauthorized("invalid credentials".into())
            }
            StorageError::KeyExists { key } => {
                ApiError::Conflict(format!("key already exists: {key}"))
            }
            StorageError::KeyNotFound { key } => ApiError::NotFound(format!("not found: {key}")),
            other => ApiError::internal(other),
        }
    }
}

impl From<WireError> for ApiError {
    fn from(err: WireError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => ApiError::Unauthorized(err.to_string()),
            AuthError::InvalidToken(_) => ApiError::Unauthorized("invalid auth token".into()),
            other => ApiError::internal(other),
        }
    }
}

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_statuses() {
        let cases = [
            (
                StorageError::UserExists { username: "a".into() },
                StatusCode::CONFLICT,
            ),
            (
                StorageError::UserNotFound { username: "a".into() },
                StatusCode::UNAUTHORIZED,
            ),
            (StorageError::KeyExists { key: "k".into() }, StatusCode::CONFLICT),
            (StorageError::KeyNotFound { key: "k".into() }, StatusCode::NOT_FOUND),
            (
                StorageError::Database(sqlx::Error::PoolClosed),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_error_hides_cause() {
        let err = ApiError::from(StorageError::Corrupt {
            item_id: 7,
            reason: "secret detail".into(),
        });
        assert_eq!(err.to_string(), "internal server error");
    }

    #[test]
    fn missing_token_message() {
        let err = ApiError::from(AuthError::MissingToken);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "no auth token");
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ServerError>();
        assert_send_sync::<StorageError>();
        assert_send_sync::<ApiError>();
    }
}
