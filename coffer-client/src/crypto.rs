//! Field encryption for Coffer.
//!
//! This module provides:
//! - Argon2id derivation of a per-user key from the account passphrase
//! - XChaCha20-Poly1305 encryption with 192-bit random nonces
//! - A [`FieldCipher`] implementation so payloads can encrypt themselves
//!
//! # Wire format
//!
//! Every ciphertext is `nonce (24 bytes) || ciphertext || tag (16 bytes)`.
//! String fields carry that blob base64-encoded (standard alphabet, padded);
//! binary payloads carry it raw.
//!
//! # Security Notes
//!
//! - A fresh random nonce per field means equal plaintexts never produce
//!   equal ciphertexts, and a wrong key fails authentication instead of
//!   producing garbage
//! - The salt is the username under a fixed domain prefix, so the same
//!   passphrase yields different keys for different accounts

use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use coffer_types::FieldCipher;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Nonce size for XChaCha20-Poly1305 (192 bits = 24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Key size for XChaCha20-Poly1305 (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Poly1305 tag size.
pub const TAG_SIZE: usize = 16;

const SALT_PREFIX: &[u8] = b"coffer-vault-key-v1:";

/// Crypto errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (wrong key or tampered data).
    #[error("decryption failed: authentication error")]
    DecryptionFailed,

    /// Ciphertext shorter than nonce plus tag.
    #[error("ciphertext too short: {0} bytes")]
    Truncated(usize),

    /// String field was not valid base64.
    #[error("invalid ciphertext encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Decrypted string field was not UTF-8.
    #[error("decrypted field is not UTF-8")]
    NotUtf8,

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// OS random source failed.
    #[error("random source failed: {0}")]
    Random(String),
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
}

impl KdfParams {
    /// Custom cost. Parallelism is fixed at 1.
    pub fn new(memory_kib: u32, iterations: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism: 1,
        }
    }

    /// Get memory in KiB.
    pub fn memory_kib(&self) -> u32 {
        self.memory_kib
    }

    /// Get iteration count.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    fn to_argon2_params(self) -> Result<Params, CryptoError> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))
    }
}

impl Default for KdfParams {
    /// 19 MiB, 2 iterations.
    fn default() -> Self {
        Self::new(19 * 1024, 2)
    }
}

/// Per-user field cipher.
///
/// The key is wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Cipher {
    key: [u8; KEY_SIZE],
}

impl Cipher {
    /// Derive the cipher for `username` from their passphrase.
    pub fn from_passphrase(username: &str, passphrase: &str) -> Result<Self, CryptoError> {
        Self::from_passphrase_with_params(username, passphrase, KdfParams::default())
    }

    /// Derive with explicit Argon2id cost.
    pub fn from_passphrase_with_params(
        username: &str,
        passphrase: &str,
        params: KdfParams,
    ) -> Result<Self, CryptoError> {
        let mut salt = Vec::with_capacity(SALT_PREFIX.len() + username.len());
        salt.extend_from_slice(SALT_PREFIX);
        salt.extend_from_slice(username.as_bytes());

        let argon2 = Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            params.to_argon2_params()?,
        );

        let mut key = [0u8; KEY_SIZE];
        argon2
            .hash_password_into(passphrase.as_bytes(), &salt, &mut key)
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

        Ok(Self { key })
    }

    /// Create a cipher from raw key bytes.
    pub fn from_key(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Create a random cipher (for testing).
    pub fn random() -> Result<Self, CryptoError> {
        let mut key = [0u8; KEY_SIZE];
        getrandom::getrandom(&mut key).map_err(|e| CryptoError::Random(e.to_string()))?;
        Ok(Self { key })
    }

    fn aead(&self) -> Result<XChaCha20Poly1305, CryptoError> {
        XChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }

    /// Encrypt to `nonce || ciphertext || tag`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes).map_err(|e| CryptoError::Random(e.to_string()))?;
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .aead()?
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::EncryptionFailed("aead encrypt failed".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt output of [`Cipher::seal`].
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Truncated(sealed.len()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

        self.aead()?
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

impl FieldCipher for Cipher {
    type Error = CryptoError;

    fn encrypt_str(&self, plaintext: &str) -> Result<String, CryptoError> {
        Ok(STANDARD.encode(self.seal(plaintext.as_bytes())?))
    }

    fn decrypt_str(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let sealed = STANDARD.decode(ciphertext)?;
        String::from_utf8(self.open(&sealed)?).map_err(|_| CryptoError::NotUtf8)
    }

    fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.seal(plaintext)
    }

    fn decrypt_bytes(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.open(ciphertext)
    }
}

// Don't leak the key in debug output
impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cipher([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_types::{CreditCard, ItemData, LoginPassword};

    fn fast() -> KdfParams {
        KdfParams::new(64, 1)
    }

    #[test]
    fn derivation_is_deterministic_per_user() {
        let a = Cipher::from_passphrase_with_params("alice", "pw", fast()).unwrap();
        let b = Cipher::from_passphrase_with_params("alice", "pw", fast()).unwrap();
        let sealed = a.seal(b"hello").unwrap();
        assert_eq!(b.open(&sealed).unwrap(), b"hello");
    }

    #[test]
    fn same_passphrase_different_user_differs() {
        let alice = Cipher::from_passphrase_with_params("alice", "pw", fast()).unwrap();
        let bob = Cipher::from_passphrase_with_params("bob", "pw", fast()).unwrap();
        let sealed = alice.seal(b"hello").unwrap();
        assert!(matches!(bob.open(&sealed), Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn wrong_passphrase_fails_decryption() {
        let right = Cipher::from_passphrase_with_params("alice", "pw", fast()).unwrap();
        let wrong = Cipher::from_passphrase_with_params("alice", "pW", fast()).unwrap();
        let ct = right.encrypt_str("secret").unwrap();
        assert!(wrong.decrypt_str(&ct).is_err());
    }

    #[test]
    fn random_nonces_hide_equal_plaintexts() {
        let cipher = Cipher::random().unwrap();
        let a = cipher.seal(b"same").unwrap();
        let b = cipher.seal(b"same").unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
        assert_eq!(a.len(), NONCE_SIZE + 4 + TAG_SIZE);
    }

    #[test]
    fn corrupted_ciphertext_fails_decryption() {
        let cipher = Cipher::random().unwrap();
        let mut sealed = cipher.seal(b"Secret message").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert!(matches!(cipher.open(&sealed), Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn truncated_and_malformed_input_rejected() {
        let cipher = Cipher::random().unwrap();
        assert!(matches!(
            cipher.open(&[0u8; NONCE_SIZE]),
            Err(CryptoError::Truncated(24))
        ));
        assert!(matches!(
            cipher.decrypt_str("%%% not base64"),
            Err(CryptoError::Encoding(_))
        ));
    }

    #[test]
    fn empty_and_large_plaintext() {
        let cipher = Cipher::random().unwrap();
        assert_eq!(cipher.decrypt_str(&cipher.encrypt_str("").unwrap()).unwrap(), "");

        let big = vec![0x42u8; 1024 * 1024];
        let sealed = cipher.encrypt_bytes(&big).unwrap();
        assert_eq!(cipher.decrypt_bytes(&sealed).unwrap(), big);
    }

    #[test]
    fn payload_fields_roundtrip() {
        let cipher = Cipher::random().unwrap();
        let original = CreditCard {
            number: "4111 1111 1111 1111".into(),
            owner_name: "ALICE EXAMPLE".into(),
            cvc: "123".into(),
            valid_month: 12,
            valid_year: 2030,
        };

        let mut card = original.clone();
        card.encrypt(&cipher).unwrap();
        assert_ne!(card.number, original.number);
        assert!(STANDARD.decode(&card.cvc).is_ok());
        assert_eq!(card.valid_month, 12);

        card.decrypt(&cipher).unwrap();
        assert_eq!(card, original);
    }

    #[test]
    fn unicode_survives() {
        let cipher = Cipher::random().unwrap();
        let mut lp = LoginPassword {
            login: "алиса".into(),
            password: "пароль🔑".into(),
        };
        lp.encrypt(&cipher).unwrap();
        lp.decrypt(&cipher).unwrap();
        assert_eq!(lp.password, "пароль🔑");
    }

    #[test]
    fn cipher_debug_is_redacted() {
        let cipher = Cipher::from_key([7u8; KEY_SIZE]);
        let debug = format!("{:?}", cipher);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains('7'));
    }

    #[test]
    fn default_params() {
        let params = KdfParams::default();
        assert_eq!(params.memory_kib(), 19 * 1024);
        assert_eq!(params.iterations(), 2);
    }
}
