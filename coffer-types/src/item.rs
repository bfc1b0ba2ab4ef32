//! Item metadata and the JSON envelope.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::WireError;

/// The closed set of payload shapes an item can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Login and password pair
    LoginPassword,
    /// Payment card record
    CreditCard,
    /// Free text
    Text,
    /// Opaque binary blob
    Binary,
}

impl ItemKind {
    /// All kinds, in declaration order.
    pub const ALL: [ItemKind; 4] = [
        ItemKind::LoginPassword,
        ItemKind::CreditCard,
        ItemKind::Text,
        ItemKind::Binary,
    ];

    /// Wire and storage discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::LoginPassword => "login_password",
            ItemKind::CreditCard => "credit_card",
            ItemKind::Text => "text",
            ItemKind::Binary => "binary",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| WireError::UnknownKind(s.to_string()))
    }
}

/// Owner-visible metadata of an item.
///
/// `id` is the store's internal join key and never travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMeta {
    /// Internal item id (0 until persisted)
    #[serde(skip)]
    pub id: i64,
    /// User-chosen key, unique per owner
    pub key: String,
    /// Free-text note
    #[serde(rename = "info", default)]
    pub note: String,
    /// Declared kind
    #[serde(rename = "type")]
    pub kind: ItemKind,
}

impl ItemMeta {
    /// Create metadata for a new item.
    pub fn new(key: impl Into<String>, kind: ItemKind, note: impl Into<String>) -> Self {
        Self {
            id: 0,
            key: key.into(),
            note: note.into(),
            kind,
        }
    }

    /// Check the metadata is acceptable for an endpoint serving `expected`.
    pub fn validate_for(&self, expected: ItemKind) -> Result<(), WireError> {
        if self.key.is_empty() {
            return Err(WireError::EmptyKey);
        }
        if self.kind != expected {
            return Err(WireError::KindMismatch {
                expected: expected.to_string(),
                actual: self.kind.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ItemMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Key: {}", self.key)?;
        writeln!(f, "Info: {}", self.note)?;
        writeln!(f, "Type: {}", self.kind)
    }
}

/// `{"item": <metadata>, "data": <kind-specific>}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Item metadata
    pub item: ItemMeta,
    /// Kind-specific payload
    pub data: T,
}

impl<T> Envelope<T> {
    /// Wrap a payload with its metadata.
    pub fn new(item: ItemMeta, data: T) -> Self {
        Self { item, data }
    }
}
