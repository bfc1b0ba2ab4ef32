//! Signed bearer tokens.
//!
//! Tokens are HMAC-signed JWTs naming the user. Only HMAC algorithms are
//! accepted on verification; the header algorithm is checked before the
//! signature.

use crate::config::AuthConfig;
use crate::error::AuthError;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Length of the generated secret when none is configured.
const GENERATED_SECRET_LEN: usize = 32;

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated username.
    pub username: String,
    /// Issued at (unix timestamp).
    pub iat: u64,
    /// Expiration (unix timestamp), absent when tokens do not expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// Issues and verifies tokens with one process-wide secret.
#[derive(Clone)]
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Option<Duration>,
}

impl TokenAuthority {
    /// Create an authority from a raw HMAC secret.
    pub fn new(secret: &[u8], ttl: Option<Duration>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims.clear();
        if ttl.is_some() {
            validation.required_spec_claims.insert("exp".to_string());
        }

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Build from config, generating a random secret when none is set.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let ttl = config.token_ttl_secs.map(Duration::from_secs);
        match &config.token_secret {
            Some(secret) => Ok(Self::new(secret.as_bytes(), ttl)),
            None => {
                let mut secret = [0u8; GENERATED_SECRET_LEN];
                getrandom::getrandom(&mut secret).map_err(|e| AuthError::Random(e.to_string()))?;
                tracing::warn!("no token secret configured; tokens will not survive a restart");
                Ok(Self::new(&secret, ttl))
            }
        }
    }

    /// Sign a token for `username`.
    pub fn issue(&self, username: &str) -> Result<String, AuthError> {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            username: username.to_string(),
            iat: now,
            exp: self.ttl.map(|ttl| now + ttl.as_secs()),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AuthError::Signing)
    }

    /// Verify a token and return the username it names.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.username)
            .map_err(AuthError::InvalidToken)
    }
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn sign(claims: &Claims, alg: Algorithm, secret: &[u8]) -> String {
        jsonwebtoken::encode(&Header::new(alg), claims, &EncodingKey::from_secret(secret))
            .unwrap()
    }

    #[test]
    fn issue_and_verify() {
        let authority = TokenAuthority::new(SECRET, None);
        let token = authority.issue("alice").unwrap();
        assert_eq!(authority.verify(&token).unwrap(), "alice");
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = TokenAuthority::new(b"other", None).issue("alice").unwrap();
        let authority = TokenAuthority::new(SECRET, None);
        assert!(matches!(
            authority.verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn tampered_token_rejected() {
        let authority = TokenAuthority::new(SECRET, None);
        let mut token = authority.issue("alice").unwrap();
        token.push('x');
        assert!(authority.verify(&token).is_err());
        assert!(authority.verify("").is_err());
        assert!(authority.verify("not.a.token").is_err());
    }

    #[test]
    fn any_hmac_variant_accepted() {
        let authority = TokenAuthority::new(SECRET, None);
        let claims = Claims {
            username: "bob".into(),
            iat: 1,
            exp: None,
        };
        for alg in [Algorithm::HS384, Algorithm::HS512] {
            let token = sign(&claims, alg, SECRET);
            assert_eq!(authority.verify(&token).unwrap(), "bob");
        }
    }

    #[test]
    fn unsigned_token_rejected() {
        // {"alg":"none","typ":"JWT"}.{"username":"alice","iat":1}.
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.eyJ1c2VybmFtZSI6ImFsaWNlIiwiaWF0IjoxfQ.";
        let authority = TokenAuthority::new(SECRET, None);
        assert!(authority.verify(token).is_err());
    }

    #[test]
    fn ttl_sets_and_enforces_expiry() {
        let authority = TokenAuthority::new(SECRET, Some(Duration::from_secs(60)));
        let token = authority.issue("alice").unwrap();
        assert_eq!(authority.verify(&token).unwrap(), "alice");

        let expired = Claims {
            username: "alice".into(),
            iat: 1,
            exp: Some(2),
        };
        assert!(authority
            .verify(&sign(&expired, Algorithm::HS256, SECRET))
            .is_err());

        let forever = Claims {
            username: "alice".into(),
            iat: 1,
            exp: None,
        };
        assert!(authority
            .verify(&sign(&forever, Algorithm::HS256, SECRET))
            .is_err());
    }

    #[test]
    fn generated_secret_is_per_authority() {
        let config = AuthConfig::default();
        let a = TokenAuthority::from_config(&config).unwrap();
        let b = TokenAuthority::from_config(&config).unwrap();
        let token = a.issue("alice").unwrap();
        assert!(a.verify(&token).is_ok());
        assert!(b.verify(&token).is_err());
    }

    #[test]
    fn configured_secret_is_shared() {
        let config = AuthConfig {
            token_secret: Some("shared".into()),
            token_ttl_secs: None,
        };
        let a = TokenAuthority::from_config(&config).unwrap();
        let b = TokenAuthority::from_config(&config).unwrap();
        assert!(b.verify(&a.issue("alice").unwrap()).is_ok());
    }
}
