//! VaultClient - the HTTPS interface to a Coffer server.
//!
//! Every ciphertext field is encrypted with the caller's [`Cipher`] before a
//! request leaves the process, and decrypted after a response arrives. The
//! server only ever sees ciphertext.
//!
//! ```text
//! Application → VaultClient ─(encrypt)→ reqwest/rustls → coffer-server
//!                    ↑                                        │
//!                    └───────────(decrypt)────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use coffer_client::{Cipher, VaultClient};
//! use coffer_types::{Credentials, LoginPassword, ItemData};
//!
//! let mut client = VaultClient::new("https://localhost:8080")?;
//! client.login(&Credentials::new("alice", "hunter2")).await?;
//!
//! let cipher = Cipher::from_passphrase("alice", "hunter2")?;
//! let lp = LoginPassword { login: "alice@mail".into(), password: "pw".into() };
//! client.create_item(&cipher, "mail", "work", lp.into_payload()).await?;
//! ```

use reqwest::multipart::{Form, Part};
use reqwest::{Certificate, RequestBuilder, Response, Url};
use serde::Deserialize;
use tracing::{debug, info, warn};

use coffer_types::api::{
    kind_path, AUTH_HEADER, DOWNLOAD_SEGMENT, ITEM_SEGMENTS, LIST_PATH, LOGIN_PATH,
    METADATA_PART, PAYLOAD_PART, REGISTER_PATH,
};
use coffer_types::{
    BinaryData, Credentials, Envelope, ItemData, ItemKind, ItemMeta, Payload, WireError,
};

use crate::crypto::Cipher;
use crate::error::{ClientError, Result};

const JSON_CONTENT_TYPE: &str = "application/json";
const OCTET_STREAM: &str = "application/octet-stream";

/// An item as returned by [`VaultClient::get_item`].
///
/// Binary items carry no payload here; fetch it with
/// [`VaultClient::download_binary`].
pub type FetchedItem = Envelope<Option<Payload>>;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone, Copy)]
enum WriteMode {
    Create,
    Update,
}

/// HTTPS client for one Coffer server.
#[derive(Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl VaultClient {
    /// Client trusting the platform's web PKI roots.
    pub fn new(server: &str) -> Result<Self> {
        Self::build(server, reqwest::Client::builder())
    }

    /// Client that additionally trusts the given PEM certificate, for servers
    /// running on a self-signed certificate.
    pub fn with_ca_cert(server: &str, pem: &[u8]) -> Result<Self> {
        let cert = Certificate::from_pem(pem)?;
        Self::build(server, reqwest::Client::builder().add_root_certificate(cert))
    }

    fn build(server: &str, builder: reqwest::ClientBuilder) -> Result<Self> {
        let base = Url::parse(server).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(server.to_string()));
        }
        let http = builder.use_rustls_tls().build()?;
        Ok(Self {
            http,
            base,
            token: None,
        })
    }

    /// Server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Current auth token, if logged in.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Resume a session with a previously issued token.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    /// Forget the auth token.
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Create an account and keep the issued token.
    pub async fn register(&mut self, creds: &Credentials) -> Result<()> {
        self.authenticate(REGISTER_PATH, creds).await?;
        info!(username = %creds.login, "registered");
        Ok(())
    }

    /// Log in and keep the issued token.
    pub async fn login(&mut self, creds: &Credentials) -> Result<()> {
        self.authenticate(LOGIN_PATH, creds).await?;
        info!(username = %creds.login, "logged in");
        Ok(())
    }

    async fn authenticate(&mut self, path: &str, creds: &Credentials) -> Result<()> {
        let url = self.url(path.split('/'))?;
        let resp = check(self.http.post(url).json(creds).send().await?).await?;

        let token = resp
            .headers()
            .get(AUTH_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(ClientError::MissingToken)?;
        self.token = Some(token.to_string());
        Ok(())
    }

    /// Encrypt and store a new item under `key`.
    pub async fn create_item(
        &self,
        cipher: &Cipher,
        key: &str,
        note: &str,
        payload: Payload,
    ) -> Result<()> {
        self.write_item(cipher, key, note, payload, WriteMode::Create)
            .await
    }

    /// Encrypt and replace the item stored under `key`.
    ///
    /// The item must already exist with the same kind.
    pub async fn update_item(
        &self,
        cipher: &Cipher,
        key: &str,
        note: &str,
        payload: Payload,
    ) -> Result<()> {
        self.write_item(cipher, key, note, payload, WriteMode::Update)
            .await
    }

    async fn write_item(
        &self,
        cipher: &Cipher,
        key: &str,
        note: &str,
        mut payload: Payload,
        mode: WriteMode,
    ) -> Result<()> {
        let token = self.require_token()?;
        let meta = ItemMeta::new(key, payload.kind(), note);
        payload.encrypt(cipher)?;

        let url = self.url(kind_path(meta.kind).split('/'))?;
        let request = match mode {
            WriteMode::Create => self.http.post(url),
            WriteMode::Update => self.http.put(url),
        };

        let request = match payload {
            Payload::Binary(data) => request.multipart(binary_form(&meta, data.0)?),
            other => request.json(&Envelope::new(meta, other)),
        };

        check(authorized(request, token).send().await?).await?;
        debug!(key, "item written");
        Ok(())
    }

    /// Fetch and decrypt the item stored under `key`.
    pub async fn get_item(&self, cipher: &Cipher, key: &str) -> Result<FetchedItem> {
        let token = self.require_token()?;
        let url = self.item_url([key])?;
        let resp = check(authorized(self.http.get(url), token).send().await?).await?;

        let raw: Envelope<serde_json::Value> = resp.json().await?;
        let data = match (raw.item.kind, raw.data) {
            (ItemKind::Binary, _) | (_, serde_json::Value::Null) => None,
            (kind, value) => {
                let mut payload = Payload::from_json(kind, value)?;
                payload.decrypt(cipher)?;
                Some(payload)
            }
        };
        Ok(Envelope::new(raw.item, data))
    }

    /// Fetch the item under `key` as the concrete shape `T`, decrypted.
    ///
    /// Fails with [`WireError::KindMismatch`] when the stored item is of
    /// another kind. Binary content is downloaded.
    pub async fn get_typed<T: ItemData>(
        &self,
        cipher: &Cipher,
        key: &str,
    ) -> Result<(ItemMeta, T)> {
        let Envelope { item, data } = self.get_item(cipher, key).await?;
        item.validate_for(T::KIND)?;

        let payload = match data {
            Some(payload) => payload,
            None if item.kind == ItemKind::Binary => {
                BinaryData(self.download_binary(cipher, key).await?).into_payload()
            }
            None => return Err(WireError::MissingPayload(item.key).into()),
        };
        let actual = payload.kind();
        let data = T::from_payload(payload).ok_or_else(|| WireError::KindMismatch {
            expected: T::KIND.to_string(),
            actual: actual.to_string(),
        })?;
        Ok((item, data))
    }

    /// List one page of the caller's item metadata.
    pub async fn list_items(&self, page: u32, limit: u32) -> Result<Vec<ItemMeta>> {
        let token = self.require_token()?;
        let url = self.url(LIST_PATH.split('/'))?;
        let request = self
            .http
            .get(url)
            .query(&[("page", page), ("limit", limit)]);

        let resp = check(authorized(request, token).send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Fetch and decrypt the content of a binary item.
    pub async fn download_binary(&self, cipher: &Cipher, key: &str) -> Result<Vec<u8>> {
        let token = self.require_token()?;
        let url = self.item_url([ItemKind::Binary.as_str(), key, DOWNLOAD_SEGMENT])?;
        let resp = check(authorized(self.http.get(url), token).send().await?).await?;

        let sealed = resp.bytes().await?;
        Ok(cipher.open(&sealed)?)
    }

    /// Delete the item stored under `key`.
    pub async fn delete_item(&self, key: &str) -> Result<()> {
        let token = self.require_token()?;
        let url = self.item_url([key])?;
        check(authorized(self.http.delete(url), token).send().await?).await?;
        debug!(key, "item deleted");
        Ok(())
    }

    fn require_token(&self) -> Result<&str> {
        self.token.as_deref().ok_or(ClientError::NotAuthenticated)
    }

    fn item_url<'a>(&self, tail: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut segments: Vec<&str> = ITEM_SEGMENTS.to_vec();
        segments.extend(tail);
        self.url(segments)
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments.into_iter().filter(|s| !s.is_empty()));
        Ok(url)
    }
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("base", &self.base.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn authorized(request: RequestBuilder, token: &str) -> RequestBuilder {
    request.header(AUTH_HEADER, token)
}

fn binary_form(meta: &ItemMeta, sealed: Vec<u8>) -> Result<Form> {
    let item = Part::text(serde_json::to_string(meta)?).mime_str(JSON_CONTENT_TYPE)?;
    let data = Part::bytes(sealed).mime_str(OCTET_STREAM)?;
    Ok(Form::new().part(METADATA_PART, item).part(PAYLOAD_PART, data))
}

/// Turn a non-success response into [`ClientError::Status`].
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed.error,
        Err(_) => body,
    };
    warn!(%status, %message, "request rejected");
    Err(ClientError::Status { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_server_urls_rejected() {
        assert!(matches!(
            VaultClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            VaultClient::new("mailto:alice@example.com"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn fixed_paths_resolve_against_base() {
        let client = VaultClient::new("https://vault.example:8443").unwrap();
        let url = client.url(REGISTER_PATH.split('/')).unwrap();
        assert_eq!(url.as_str(), "https://vault.example:8443/api/user/register");

        let url = client.url(kind_path(ItemKind::CreditCard).split('/')).unwrap();
        assert_eq!(url.path(), "/api/item/credit_card");
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let client = VaultClient::new("https://example.org/coffer/").unwrap();
        let url = client.url(LIST_PATH.split('/')).unwrap();
        assert_eq!(url.path(), "/coffer/api/item/list");
    }

    #[test]
    fn item_keys_are_percent_encoded() {
        let client = VaultClient::new("https://localhost:8080").unwrap();
        let url = client.item_url(["my key/with?chars"]).unwrap();
        assert_eq!(url.path(), "/api/item/my%20key%2Fwith%3Fchars");
        assert!(url.query().is_none());

        let url = client
            .item_url([ItemKind::Binary.as_str(), "photo", DOWNLOAD_SEGMENT])
            .unwrap();
        assert_eq!(url.path(), "/api/item/binary/photo/download");
    }

    #[tokio::test]
    async fn item_calls_require_login() {
        let client = VaultClient::new("https://localhost:8080").unwrap();
        let cipher = Cipher::random().unwrap();

        assert!(matches!(
            client.get_item(&cipher, "k").await,
            Err(ClientError::NotAuthenticated)
        ));
        assert!(matches!(
            client.delete_item("k").await,
            Err(ClientError::NotAuthenticated)
        ));
        assert!(matches!(
            client.list_items(1, 10).await,
            Err(ClientError::NotAuthenticated)
        ));
    }

    #[test]
    fn token_handling_and_debug() {
        let mut client = VaultClient::new("https://localhost:8080").unwrap();
        assert!(client.token().is_none());

        client.set_token("eyJhbGciOi.secret.sig");
        assert_eq!(client.token(), Some("eyJhbGciOi.secret.sig"));
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("REDACTED"));

        client.clear_token();
        assert!(client.token().is_none());
    }

    #[test]
    fn binary_form_builds() {
        let meta = ItemMeta::new("photo", ItemKind::Binary, "");
        assert!(binary_form(&meta, vec![1, 2, 3]).is_ok());
    }
}
