//! Account password hashing (argon2id, PHC strings).

use crate::error::AuthError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::sync::OnceLock;

static DECOY_HASH: OnceLock<String> = OnceLock::new();

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Check a plaintext password against a stored hash.
///
/// An unparseable hash never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// [`hash_password`] off the async runtime.
pub async fn hash_password_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?
}

/// [`verify_password`] off the async runtime.
pub async fn verify_password_blocking(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or(false)
}

/// Hash of a random password, built with the same parameters as real
/// account hashes.
fn decoy_hash() -> &'static str {
    DECOY_HASH.get_or_init(|| {
        let secret = SaltString::generate(&mut OsRng);
        hash_password(secret.as_str()).unwrap_or_default()
    })
}

/// Run a full verification against a decoy hash so a login for a missing
/// account costs the same as a wrong password. Always false.
pub async fn reject_unknown_user_blocking(password: String) -> bool {
    tokio::task::spawn_blocking(move || {
        let _ = verify_password(&password, decoy_hash());
        false
    })
    .await
    .unwrap_or(false)
}
