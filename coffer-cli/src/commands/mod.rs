//! CLI command implementations.

pub mod auth;
pub mod items;

use anyhow::{Context, Result};
use coffer_client::{Cipher, ClientError, StatusCode, VaultClient};
use std::path::PathBuf;

use crate::config::{Session, DEFAULT_SERVER};

/// Options shared by every command.
pub struct Options {
    /// Directory holding the session file.
    pub data_dir: PathBuf,
    /// Server URL from `--server` / `COFFER_SERVER`.
    pub server: Option<String>,
    /// Extra trusted CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,
    /// Account password from `--password` / `COFFER_PASSWORD`.
    pub password: Option<String>,
}

impl Options {
    /// Server to talk to: flag, then saved session, then the default.
    pub fn server_url(&self, session: Option<&Session>) -> String {
        self.server
            .clone()
            .or_else(|| session.map(|s| s.server.clone()))
            .unwrap_or_else(|| DEFAULT_SERVER.to_string())
    }

    /// Build a client for `server`, trusting `--ca-cert` if given.
    pub async fn client(&self, server: &str) -> Result<VaultClient> {
        let client = match &self.ca_cert {
            Some(path) => {
                let pem = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read CA certificate {}", path.display()))?;
                VaultClient::with_ca_cert(server, &pem)?
            }
            None => VaultClient::new(server)?,
        };
        Ok(client)
    }

    /// Account password, prompted without echo unless given up front.
    pub fn password(&self, prompt: &str) -> Result<String> {
        let password = match &self.password {
            Some(p) => p.clone(),
            None => rpassword::prompt_password(prompt).context("Failed to read password")?,
        };
        if password.is_empty() {
            anyhow::bail!("Password cannot be empty");
        }
        Ok(password)
    }
}

/// Client resumed from the saved session.
pub async fn open_session(opts: &Options) -> Result<(VaultClient, Session)> {
    let session = Session::load(&opts.data_dir).await?;
    let mut client = opts.client(&opts.server_url(Some(&session))).await?;
    client.set_token(session.token.clone());
    Ok((client, session))
}

/// Derive the item cipher from the account password.
pub fn unlock(opts: &Options, session: &Session) -> Result<Cipher> {
    let password = opts.password(&format!("Password for {}: ", session.username))?;
    Cipher::from_passphrase(&session.username, &password).context("Failed to derive vault key")
}

/// Attach a re-login hint to rejected tokens.
pub fn explain(err: ClientError) -> anyhow::Error {
    let unauthorized = err.status() == Some(StatusCode::UNAUTHORIZED);
    let err = anyhow::Error::new(err);
    if unauthorized {
        err.context("Session expired or invalid. Run 'coffer login' again.")
    } else {
        err
    }
}
