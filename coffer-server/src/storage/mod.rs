//! Storage layer for coffer-server.
//!
//! Holds user credentials and per-owner items. Every item is one metadata
//! row plus exactly one payload row in the table of its kind; writes touch
//! both inside a single transaction.

mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::StorageResult;
use async_trait::async_trait;
use coffer_types::{ItemMeta, Payload};

/// An item ready to be written: metadata and its payload.
#[derive(Debug, Clone)]
pub struct VaultItem {
    /// Owner-visible metadata.
    pub meta: ItemMeta,
    /// Kind-specific payload (ciphertext fields as received).
    pub payload: Payload,
}

impl VaultItem {
    /// Pair metadata with its payload.
    pub fn new(meta: ItemMeta, payload: Payload) -> Self {
        Self { meta, payload }
    }
}

/// Trait for vault storage backends.
#[async_trait]
pub trait VaultStorage: Send + Sync {
    /// Check that the backend answers a trivial query.
    async fn ping(&self) -> StorageResult<()>;

    /// Register a user. Returns the new user id.
    ///
    /// Fails with `UserExists` if the username is taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> StorageResult<i64>;

    /// Stored password hash for `username`, or `UserNotFound`.
    async fn get_password_hash(&self, username: &str) -> StorageResult<String>;

    /// Internal id for `username`, or `UserNotFound`.
    async fn get_user_id(&self, username: &str) -> StorageResult<i64>;

    /// Insert a new item. Returns the new item id.
    ///
    /// Fails with `KeyExists` if the owner already has the key; nothing is
    /// written in that case.
    async fn insert_item(&self, owner_id: i64, item: &VaultItem) -> StorageResult<i64>;

    /// Replace the note and payload of an existing item of the same kind.
    ///
    /// Fails with `KeyNotFound` if the owner has no item of that kind under
    /// the key.
    async fn update_item(&self, owner_id: i64, item: &VaultItem) -> StorageResult<i64>;

    /// Metadata of the owner's item under `key`.
    async fn get_item(&self, owner_id: i64, key: &str) -> StorageResult<ItemMeta>;

    /// Payload of an item previously returned by [`VaultStorage::get_item`]
    /// or [`VaultStorage::list_items`].
    async fn get_payload(&self, meta: &ItemMeta) -> StorageResult<Payload>;

    /// Raw bytes of the owner's binary item under `key`.
    ///
    /// Items of other kinds are reported as `KeyNotFound`.
    async fn get_binary(&self, owner_id: i64, key: &str) -> StorageResult<Vec<u8>>;

    /// One page of the owner's items in insertion order.
    async fn list_items(&self, owner_id: i64, limit: u32, offset: u64)
        -> StorageResult<Vec<ItemMeta>>;

    /// Delete the owner's item under `key` together with its payload.
    async fn delete_item(&self, owner_id: i64, key: &str) -> StorageResult<()>;
}
