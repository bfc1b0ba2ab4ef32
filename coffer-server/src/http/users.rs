//! Registration and login.
//!
//! Both answer with the token in the `X-Auth-Token` header and a plain
//! `success` body.

use crate::auth::{
    hash_password_blocking, reject_unknown_user_blocking, verify_password_blocking,
};
use crate::error::{ApiError, StorageError};
use crate::server::VaultServer;
use axum::body::Bytes;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use coffer_types::api::AUTH_HEADER;
use coffer_types::Credentials;
use std::sync::Arc;
use tracing::info;

fn parse_credentials(body: &[u8]) -> Result<Credentials, ApiError> {
    let creds: Credentials = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid credentials body: {e}")))?;
    if !creds.is_complete() {
        return Err(ApiError::BadRequest("login and password are required".into()));
    }
    Ok(creds)
}

fn token_response(server: &VaultServer, username: &str) -> Result<Response, ApiError> {
    let token = server.tokens().issue(username)?;
    let value = HeaderValue::from_str(&token).map_err(ApiError::internal)?;
    Ok((StatusCode::OK, [(AUTH_HEADER, value)], "success").into_response())
}

/// `POST /api/user/register`
pub async fn register(
    Extension(server): Extension<Arc<VaultServer>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let creds = parse_credentials(&body)?;
    let hash = hash_password_blocking(creds.password).await?;
    server.storage().create_user(&creds.login, &hash).await?;

    info!(username = %creds.login, "user registered");
    token_response(&server, &creds.login)
}

/// `POST /api/user/login`
///
/// Unknown user and wrong password are indistinguishable to the caller, in
/// the response and in the argon2 work done before it.
pub async fn login(
    Extension(server): Extension<Arc<VaultServer>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let creds = parse_credentials(&body)?;
    let invalid = || ApiError::Unauthorized("invalid credentials".into());

    let hash = match server.storage().get_password_hash(&creds.login).await {
        Ok(hash) => hash,
        Err(StorageError::UserNotFound { .. }) => {
            reject_unknown_user_blocking(creds.password).await;
            return Err(invalid());
        }
        Err(e) => return Err(e.into()),
    };
    if !verify_password_blocking(creds.password, hash).await {
        return Err(invalid());
    }

    token_response(&server, &creds.login)
}
