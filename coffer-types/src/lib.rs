//! # coffer-types
//!
//! Wire format types for the Coffer secret vault.
//!
//! This crate provides the foundational types shared by the server and the client:
//! - [`ItemKind`], [`ItemMeta`], [`Envelope`] - Item metadata and the JSON envelope
//! - [`Payload`] - The closed set of kind-specific payloads
//! - [`ItemData`], [`FieldCipher`] - Per-field encryption capability
//! - [`Credentials`] - Registration and login body
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
mod auth;
mod error;
mod item;
mod payload;

pub use auth::Credentials;
pub use error::WireError;
pub use item::{Envelope, ItemKind, ItemMeta};
pub use payload::{
    BinaryData, CreditCard, FieldCipher, ItemData, LoginPassword, Payload, TextData,
};
