//! SQLite storage backend for coffer-server.

use super::{VaultItem, VaultStorage};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use coffer_types::{BinaryData, CreditCard, ItemKind, ItemMeta, LoginPassword, Payload, TextData};
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool,
    SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{FromRow, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// SQLite-based vault storage.
///
/// Uses WAL mode for concurrent reads/writes and enforces foreign keys so
/// payload rows follow their item on delete.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

#[derive(Clone, Copy)]
enum WriteMode {
    Insert,
    Update,
}

#[derive(FromRow)]
struct ItemRow {
    id: i64,
    item_key: String,
    info: String,
    item_type: String,
}

impl ItemRow {
    fn into_meta(self) -> StorageResult<ItemMeta> {
        let id = self.id;
        let kind = self
            .item_type
            .parse::<ItemKind>()
            .map_err(|e| StorageError::Corrupt {
                item_id: id,
                reason: e.to_string(),
            })?;
        Ok(ItemMeta {
            id,
            key: self.item_key,
            note: self.info,
            kind,
        })
    }
}

/// Payload table of one item kind and its value columns, in bind order.
struct PayloadTable {
    name: &'static str,
    columns: &'static [&'static str],
}

impl PayloadTable {
    fn of(kind: ItemKind) -> Self {
        match kind {
            ItemKind::LoginPassword => Self {
                name: "login_passwords",
                columns: &["login", "password"],
            },
            ItemKind::CreditCard => Self {
                name: "credit_cards",
                columns: &["number", "owner_name", "cvc", "valid_month", "valid_year"],
            },
            ItemKind::Text => Self {
                name: "texts",
                columns: &["data"],
            },
            ItemKind::Binary => Self {
                name: "binaries",
                columns: &["data"],
            },
        }
    }

    /// Value columns bind to `?1..?n`, the item id to `?n+1`.
    fn insert_sql(&self) -> String {
        let placeholders: Vec<String> = (1..=self.columns.len() + 1)
            .map(|i| format!("?{i}"))
            .collect();
        format!(
            "INSERT INTO {} ({}, item_id) VALUES ({})",
            self.name,
            self.columns.join(", "),
            placeholders.join(", ")
        )
    }

    fn update_sql(&self) -> String {
        let assignments: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ?{}", i + 1))
            .collect();
        format!(
            "UPDATE {} SET {} WHERE item_id = ?{}",
            self.name,
            assignments.join(", "),
            self.columns.len() + 1
        )
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE item_id = ?1",
            self.columns.join(", "),
            self.name
        )
    }
}

/// Bind payload values in [`PayloadTable`] column order.
fn bind_payload<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    payload: &'q Payload,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match payload {
        Payload::LoginPassword(p) => query.bind(p.login.as_str()).bind(p.password.as_str()),
        Payload::CreditCard(p) => query
            .bind(p.number.as_str())
            .bind(p.owner_name.as_str())
            .bind(p.cvc.as_str())
            .bind(i64::from(p.valid_month))
            .bind(i64::from(p.valid_year)),
        Payload::Text(p) => query.bind(p.0.as_str()),
        Payload::Binary(p) => query.bind(p.0.as_slice()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl SqliteStorage {
    /// Open (creating if missing) the database at `config.database`.
    pub async fn new(config: &StorageConfig) -> StorageResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.database)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        debug!(path = %config.database.display(), "database opened");
        Ok(storage)
    }

    /// Create an in-memory SQLite storage (for testing).
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(":memory:")?.foreign_keys(true);

        // a second connection would see a different, empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    async fn run_migrations(&self) -> StorageResult<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert the metadata row inside `tx`. Returns the new item id.
    pub async fn insert_item_row(
        tx: &mut Transaction<'_, Sqlite>,
        owner_id: i64,
        meta: &ItemMeta,
    ) -> StorageResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO items (owner_id, item_key, info, item_type)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            "#,
        )
        .bind(owner_id)
        .bind(meta.key.as_str())
        .bind(meta.note.as_str())
        .bind(meta.kind.as_str())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::KeyExists {
                    key: meta.key.clone(),
                }
            } else {
                StorageError::Database(e)
            }
        })
    }

    /// Update the note of an existing item of the same kind inside `tx`.
    /// Returns the item id.
    pub async fn update_item_row(
        tx: &mut Transaction<'_, Sqlite>,
        owner_id: i64,
        meta: &ItemMeta,
    ) -> StorageResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE items SET info = ?1
            WHERE owner_id = ?2 AND item_key = ?3 AND item_type = ?4
            RETURNING id
            "#,
        )
        .bind(meta.note.as_str())
        .bind(owner_id)
        .bind(meta.key.as_str())
        .bind(meta.kind.as_str())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| StorageError::KeyNotFound {
            key: meta.key.clone(),
        })
    }

    /// Write metadata and payload atomically. Dropping `tx` on any early
    /// return rolls both back.
    async fn write_item(
        &self,
        owner_id: i64,
        item: &VaultItem,
        mode: WriteMode,
    ) -> StorageResult<i64> {
        let kind = item.payload.kind();
        if kind != item.meta.kind {
            return Err(StorageError::Corrupt {
                item_id: item.meta.id,
                reason: format!("{kind} payload for {} item", item.meta.kind),
            });
        }
        let table = PayloadTable::of(kind);

        let mut tx = self.pool.begin().await?;

        let (item_id, sql) = match mode {
            WriteMode::Insert => (
                Self::insert_item_row(&mut tx, owner_id, &item.meta).await?,
                table.insert_sql(),
            ),
            WriteMode::Update => (
                Self::update_item_row(&mut tx, owner_id, &item.meta).await?,
                table.update_sql(),
            ),
        };

        let written = bind_payload(sqlx::query(&sql), &item.payload)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        if written.rows_affected() != 1 {
            return Err(StorageError::Corrupt {
                item_id,
                reason: format!("no {} row", table.name),
            });
        }

        tx.commit().await?;
        debug!(owner_id, item_id, %kind, "item written");
        Ok(item_id)
    }
}

#[async_trait]
impl VaultStorage for SqliteStorage {
    async fn ping(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> StorageResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2) RETURNING id",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::UserExists {
                    username: username.to_string(),
                }
            } else {
                StorageError::Database(e)
            }
        })
    }

    async fn get_password_hash(&self, username: &str) -> StorageResult<String> {
        sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::UserNotFound {
                username: username.to_string(),
            })
    }

    async fn get_user_id(&self, username: &str) -> StorageResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::UserNotFound {
                username: username.to_string(),
            })
    }

    async fn insert_item(&self, owner_id: i64, item: &VaultItem) -> StorageResult<i64> {
        self.write_item(owner_id, item, WriteMode::Insert).await
    }

    async fn update_item(&self, owner_id: i64, item: &VaultItem) -> StorageResult<i64> {
        self.write_item(owner_id, item, WriteMode::Update).await
    }

    async fn get_item(&self, owner_id: i64, key: &str) -> StorageResult<ItemMeta> {
        sqlx::query_as::<_, ItemRow>(
            "SELECT id, item_key, info, item_type FROM items WHERE owner_id = ?1 AND item_key = ?2",
        )
        .bind(owner_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::KeyNotFound {
            key: key.to_string(),
        })?
        .into_meta()
    }

    async fn get_payload(&self, meta: &ItemMeta) -> StorageResult<Payload> {
        let table = PayloadTable::of(meta.kind);
        let sql = table.select_sql();
        let corrupt = |reason: String| StorageError::Corrupt {
            item_id: meta.id,
            reason,
        };
        let missing = || corrupt(format!("no {} row", table.name));

        let payload = match meta.kind {
            ItemKind::LoginPassword => {
                let (login, password) = sqlx::query_as::<_, (String, String)>(&sql)
                    .bind(meta.id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or_else(missing)?;
                Payload::LoginPassword(LoginPassword { login, password })
            }
            ItemKind::CreditCard => {
                let (number, owner_name, cvc, month, year) =
                    sqlx::query_as::<_, (String, String, String, i64, i64)>(&sql)
                        .bind(meta.id)
                        .fetch_optional(&self.pool)
                        .await?
                        .ok_or_else(missing)?;
                Payload::CreditCard(CreditCard {
                    number,
                    owner_name,
                    cvc,
                    valid_month: u8::try_from(month)
                        .map_err(|_| corrupt(format!("valid_month {month}")))?,
                    valid_year: u16::try_from(year)
                        .map_err(|_| corrupt(format!("valid_year {year}")))?,
                })
            }
            ItemKind::Text => {
                let (data,) = sqlx::query_as::<_, (String,)>(&sql)
                    .bind(meta.id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or_else(missing)?;
                Payload::Text(TextData(data))
            }
            ItemKind::Binary => {
                let (data,) = sqlx::query_as::<_, (Vec<u8>,)>(&sql)
                    .bind(meta.id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or_else(missing)?;
                Payload::Binary(BinaryData(data))
            }
        };
        Ok(payload)
    }

    async fn get_binary(&self, owner_id: i64, key: &str) -> StorageResult<Vec<u8>> {
        sqlx::query_scalar::<_, Vec<u8>>(
            r#"
            SELECT b.data FROM binaries b
            JOIN items i ON i.id = b.item_id
            WHERE i.owner_id = ?1 AND i.item_key = ?2
            "#,
        )
        .bind(owner_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::KeyNotFound {
            key: key.to_string(),
        })
    }

    async fn list_items(
        &self,
        owner_id: i64,
        limit: u32,
        offset: u64,
    ) -> StorageResult<Vec<ItemMeta>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, item_key, info, item_type FROM items
            WHERE owner_id = ?1
            ORDER BY id ASC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(owner_id)
        .bind(i64::from(limit))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ItemRow::into_meta).collect()
    }

    async fn delete_item(&self, owner_id: i64, key: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM items WHERE owner_id = ?1 AND item_key = ?2")
            .bind(owner_id)
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::KeyNotFound {
                key: key.to_string(),
            });
        }
        debug!(owner_id, key, "item deleted");
        Ok(())
    }
}
