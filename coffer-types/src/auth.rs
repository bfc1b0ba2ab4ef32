//! Registration and login body.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Username and password sent to the register and login endpoints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Username
    pub login: String,
    /// Plaintext password (only ever sent over TLS)
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    /// Both fields are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.login.is_empty() && !self.password.is_empty()
    }
}

// Don't leak the password in debug output
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
