//! # coffer-client
//!
//! Client library for the Coffer secret vault.
//!
//! ## Features
//!
//! - **Client-side encryption**: XChaCha20-Poly1305 with 192-bit random nonces
//! - **Passphrase keys**: Argon2id derivation, salted per username
//! - **HTTPS transport**: reqwest over rustls, with optional pinned CA certificate
//!
//! ## Example
//!
//! ```ignore
//! use coffer_client::{Cipher, VaultClient};
//! use coffer_types::{Credentials, ItemData, TextData};
//!
//! let mut client = VaultClient::new("https://localhost:8080")?;
//! client.register(&Credentials::new("alice", "hunter2")).await?;
//!
//! let cipher = Cipher::from_passphrase("alice", "hunter2")?;
//! client.create_item(&cipher, "note", "", TextData("hi".into()).into_payload()).await?;
//! let item = client.get_item(&cipher, "note").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod crypto;
pub mod error;

pub use client::{FetchedItem, VaultClient};
pub use crypto::{Cipher, CryptoError, KdfParams, KEY_SIZE, NONCE_SIZE};
pub use error::{ClientError, Result};
pub use reqwest::StatusCode;
