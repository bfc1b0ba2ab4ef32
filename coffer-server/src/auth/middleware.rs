//! Request gate for item routes.
//!
//! Reads the token from [`AUTH_HEADER`], verifies it, resolves the user id
//! and stores an [`AuthUser`] in request extensions. Requests that fail any
//! step are answered with 401 before a handler runs.

use crate::error::{ApiError, AuthError, StorageError};
use crate::server::VaultServer;
use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use coffer_types::api::AUTH_HEADER;
use std::sync::Arc;
use tracing::debug;

/// The caller established by [`require_auth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Username from the verified token.
    pub username: String,
    /// Internal user id, the owner of every item the request touches.
    pub user_id: i64,
}

/// Middleware guarding every item route.
pub async fn require_auth(
    State(server): State<Arc<VaultServer>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let username = server.tokens().verify(token).map_err(|e| {
        debug!(error = %e, "token rejected");
        ApiError::from(e)
    })?;

    let user_id = match server.storage().get_user_id(&username).await {
        Ok(id) => id,
        Err(StorageError::UserNotFound { .. }) => {
            debug!(%username, "token names unknown user");
            return Err(ApiError::Unauthorized("unknown user".into()));
        }
        Err(e) => return Err(e.into()),
    };

    request
        .extensions_mut()
        .insert(AuthUser { username, user_id });
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::from(AuthError::MissingToken))
    }
}
