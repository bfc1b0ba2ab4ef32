//! Kind-specific payloads.
//!
//! Every ciphertext field is produced by the client through a [`FieldCipher`]
//! before it is sent. The server stores and returns these fields unchanged;
//! it never holds a cipher.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ItemKind, WireError};

/// Symmetric cipher applied to individual payload fields.
///
/// Implemented by the client's passphrase cipher.
pub trait FieldCipher {
    /// Error raised by the cipher.
    type Error;

    /// Encrypt a string field into its transportable ciphertext form.
    fn encrypt_str(&self, plaintext: &str) -> Result<String, Self::Error>;

    /// Decrypt a string field produced by [`FieldCipher::encrypt_str`].
    fn decrypt_str(&self, ciphertext: &str) -> Result<String, Self::Error>;

    /// Encrypt raw bytes.
    fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>, Self::Error>;

    /// Decrypt raw bytes produced by [`FieldCipher::encrypt_bytes`].
    fn decrypt_bytes(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Self::Error>;
}

/// Capability shared by every payload shape.
pub trait ItemData:
    Serialize + DeserializeOwned + fmt::Display + Clone + Send + Sync + Sized + 'static
{
    /// Kind tag this payload is stored under.
    const KIND: ItemKind;

    /// Encrypt every sensitive field in place.
    fn encrypt<C: FieldCipher>(&mut self, cipher: &C) -> Result<(), C::Error>;

    /// Decrypt every sensitive field in place.
    fn decrypt<C: FieldCipher>(&mut self, cipher: &C) -> Result<(), C::Error>;

    /// Lift into the tagged payload.
    fn into_payload(self) -> Payload;

    /// Narrow a tagged payload back to this shape.
    fn from_payload(payload: Payload) -> Option<Self>;

    /// Reject values the store would refuse. Most shapes accept anything.
    fn validate(&self) -> Result<(), WireError> {
        Ok(())
    }
}

/// Login and password pair.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoginPassword {
    /// Login (ciphertext on the wire)
    pub login: String,
    /// Password (ciphertext on the wire)
    pub password: String,
}

impl ItemData for LoginPassword {
    const KIND: ItemKind = ItemKind::LoginPassword;

    fn encrypt<C: FieldCipher>(&mut self, cipher: &C) -> Result<(), C::Error> {
        let login = cipher.encrypt_str(&self.login)?;
        let password = cipher.encrypt_str(&self.password)?;
        self.login = login;
        self.password = password;
        Ok(())
    }

    fn decrypt<C: FieldCipher>(&mut self, cipher: &C) -> Result<(), C::Error> {
        let login = cipher.decrypt_str(&self.login)?;
        let password = cipher.decrypt_str(&self.password)?;
        self.login = login;
        self.password = password;
        Ok(())
    }

    fn into_payload(self) -> Payload {
        Payload::LoginPassword(self)
    }

    fn from_payload(payload: Payload) -> Option<Self> {
        match payload {
            Payload::LoginPassword(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for LoginPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Login: {}", self.login)?;
        writeln!(f, "Password: {}", self.password)
    }
}

impl fmt::Debug for LoginPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginPassword")
            .field("login", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Payment card record.
///
/// `number`, `owner_name` and `cvc` are ciphertext; the validity month and
/// year travel in the clear so the server can range-check them.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreditCard {
    /// Card number (ciphertext on the wire)
    pub number: String,
    /// Card holder (ciphertext on the wire)
    #[serde(rename = "name")]
    pub owner_name: String,
    /// Security code (ciphertext on the wire)
    pub cvc: String,
    /// Validity month, 1..=12
    pub valid_month: u8,
    /// Validity year
    pub valid_year: u16,
}

impl ItemData for CreditCard {
    const KIND: ItemKind = ItemKind::CreditCard;

    fn validate(&self) -> Result<(), WireError> {
        if (1..=12).contains(&self.valid_month) {
            Ok(())
        } else {
            Err(WireError::InvalidMonth(self.valid_month))
        }
    }

    fn encrypt<C: FieldCipher>(&mut self, cipher: &C) -> Result<(), C::Error> {
        let number = cipher.encrypt_str(&self.number)?;
        let owner_name = cipher.encrypt_str(&self.owner_name)?;
        let cvc = cipher.encrypt_str(&self.cvc)?;
        self.number = number;
        self.owner_name = owner_name;
        self.cvc = cvc;
        Ok(())
    }

    fn decrypt<C: FieldCipher>(&mut self, cipher: &C) -> Result<(), C::Error> {
        let number = cipher.decrypt_str(&self.number)?;
        let owner_name = cipher.decrypt_str(&self.owner_name)?;
        let cvc = cipher.decrypt_str(&self.cvc)?;
        self.number = number;
        self.owner_name = owner_name;
        self.cvc = cvc;
        Ok(())
    }

    fn into_payload(self) -> Payload {
        Payload::CreditCard(self)
    }

    fn from_payload(payload: Payload) -> Option<Self> {
        match payload {
            Payload::CreditCard(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for CreditCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number: {}", self.number)?;
        writeln!(f, "Valid: {:02}/{}", self.valid_month, self.valid_year)?;
        writeln!(f, "Name: {}", self.owner_name)?;
        writeln!(f, "CVC: {}", self.cvc)
    }
}

impl fmt::Debug for CreditCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreditCard")
            .field("number", &"[REDACTED]")
            .field("owner_name", &"[REDACTED]")
            .field("cvc", &"[REDACTED]")
            .field("valid_month", &self.valid_month)
            .field("valid_year", &self.valid_year)
            .finish()
    }
}

/// Free text.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextData(pub String);

impl ItemData for TextData {
    const KIND: ItemKind = ItemKind::Text;

    fn encrypt<C: FieldCipher>(&mut self, cipher: &C) -> Result<(), C::Error> {
        self.0 = cipher.encrypt_str(&self.0)?;
        Ok(())
    }

    fn decrypt<C: FieldCipher>(&mut self, cipher: &C) -> Result<(), C::Error> {
        self.0 = cipher.decrypt_str(&self.0)?;
        Ok(())
    }

    fn into_payload(self) -> Payload {
        Payload::Text(self)
    }

    fn from_payload(payload: Payload) -> Option<Self> {
        match payload {
            Payload::Text(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for TextData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.0)
    }
}

impl fmt::Debug for TextData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextData([REDACTED])")
    }
}

/// Opaque binary blob.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinaryData(pub Vec<u8>);

impl ItemData for BinaryData {
    const KIND: ItemKind = ItemKind::Binary;

    fn encrypt<C: FieldCipher>(&mut self, cipher: &C) -> Result<(), C::Error> {
        self.0 = cipher.encrypt_bytes(&self.0)?;
        Ok(())
    }

    fn decrypt<C: FieldCipher>(&mut self, cipher: &C) -> Result<(), C::Error> {
        self.0 = cipher.decrypt_bytes(&self.0)?;
        Ok(())
    }

    fn into_payload(self) -> Payload {
        Payload::Binary(self)
    }

    fn from_payload(payload: Payload) -> Option<Self> {
        match payload {
            Payload::Binary(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Binary data ({} bytes)", self.0.len())
    }
}

impl fmt::Debug for BinaryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinaryData({} bytes)", self.0.len())
    }
}

/// One payload of any kind, tagged by its variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Login and password pair
    LoginPassword(LoginPassword),
    /// Payment card record
    CreditCard(CreditCard),
    /// Free text
    Text(TextData),
    /// Opaque binary blob
    Binary(BinaryData),
}

impl Payload {
    /// Kind tag of this payload.
    pub fn kind(&self) -> ItemKind {
        match self {
            Payload::LoginPassword(_) => ItemKind::LoginPassword,
            Payload::CreditCard(_) => ItemKind::CreditCard,
            Payload::Text(_) => ItemKind::Text,
            Payload::Binary(_) => ItemKind::Binary,
        }
    }

    /// Decode the `data` member of an envelope whose kind is already known.
    pub fn from_json(kind: ItemKind, value: serde_json::Value) -> Result<Self, WireError> {
        let payload = match kind {
            ItemKind::LoginPassword => {
                Payload::LoginPassword(serde_json::from_value(value).map_err(WireError::Payload)?)
            }
            ItemKind::CreditCard => {
                Payload::CreditCard(serde_json::from_value(value).map_err(WireError::Payload)?)
            }
            ItemKind::Text => {
                Payload::Text(serde_json::from_value(value).map_err(WireError::Payload)?)
            }
            ItemKind::Binary => {
                Payload::Binary(serde_json::from_value(value).map_err(WireError::Payload)?)
            }
        };
        Ok(payload)
    }

    /// Encrypt every sensitive field in place.
    pub fn encrypt<C: FieldCipher>(&mut self, cipher: &C) -> Result<(), C::Error> {
        match self {
            Payload::LoginPassword(p) => p.encrypt(cipher),
            Payload::CreditCard(p) => p.encrypt(cipher),
            Payload::Text(p) => p.encrypt(cipher),
            Payload::Binary(p) => p.encrypt(cipher),
        }
    }

    /// Decrypt every sensitive field in place.
    pub fn decrypt<C: FieldCipher>(&mut self, cipher: &C) -> Result<(), C::Error> {
        match self {
            Payload::LoginPassword(p) => p.decrypt(cipher),
            Payload::CreditCard(p) => p.decrypt(cipher),
            Payload::Text(p) => p.decrypt(cipher),
            Payload::Binary(p) => p.decrypt(cipher),
        }
    }

    /// Validate the wrapped payload.
    pub fn validate(&self) -> Result<(), WireError> {
        match self {
            Payload::LoginPassword(p) => p.validate(),
            Payload::CreditCard(p) => p.validate(),
            Payload::Text(p) => p.validate(),
            Payload::Binary(p) => p.validate(),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::LoginPassword(p) => p.fmt(f),
            Payload::CreditCard(p) => p.fmt(f),
            Payload::Text(p) => p.fmt(f),
            Payload::Binary(p) => p.fmt(f),
        }
    }
}
