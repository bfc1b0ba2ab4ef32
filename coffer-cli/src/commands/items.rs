//! Item commands: add, update, get, list, download, delete.

use anyhow::{Context, Result};
use clap::Subcommand;
use coffer_types::{
    BinaryData, CreditCard, ItemData, ItemKind, ItemMeta, LoginPassword, Payload, TextData,
};
use std::path::{Path, PathBuf};

use super::{explain, open_session, unlock, Options};

/// Item shapes accepted by `add` and `update`.
#[derive(Subcommand)]
pub enum ItemArgs {
    /// Login and password pair
    LoginPassword {
        /// Item key
        key: String,
        /// Free-text note
        #[arg(long, default_value = "")]
        note: String,
        /// Stored login
        #[arg(long)]
        login: String,
        /// Stored password (will prompt if not provided)
        #[arg(long)]
        secret: Option<String>,
    },

    /// Payment card
    CreditCard {
        /// Item key
        key: String,
        /// Free-text note
        #[arg(long, default_value = "")]
        note: String,
        /// Card number
        #[arg(long)]
        number: String,
        /// Card holder name
        #[arg(long)]
        name: String,
        /// Security code (will prompt if not provided)
        #[arg(long)]
        cvc: Option<String>,
        /// Validity month
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
        month: u8,
        /// Validity year
        #[arg(long)]
        year: u16,
    },

    /// Free text
    Text {
        /// Item key
        key: String,
        /// Free-text note
        #[arg(long, default_value = "")]
        note: String,
        /// Text to store (or use --file)
        text: Option<String>,
        /// Read the text from a file
        #[arg(long, short, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// File content
    Binary {
        /// Item key
        key: String,
        /// Free-text note
        #[arg(long, default_value = "")]
        note: String,
        /// File to store
        #[arg(long, short)]
        file: PathBuf,
    },
}

/// A fully resolved item, ready to encrypt and send.
#[cfg_attr(test, derive(Debug))]
pub struct ItemInput {
    /// Item key
    pub key: String,
    /// Free-text note
    pub note: String,
    /// Plaintext payload
    pub payload: Payload,
}

impl ItemArgs {
    /// Resolve prompts and files into an item.
    pub async fn resolve(self) -> Result<ItemInput> {
        let (key, note, payload) = match self {
            ItemArgs::LoginPassword {
                key,
                note,
                login,
                secret,
            } => {
                let password = match secret {
                    Some(s) => s,
                    None => prompt_secret("Stored password: ")?,
                };
                (key, note, LoginPassword { login, password }.into_payload())
            }
            ItemArgs::CreditCard {
                key,
                note,
                number,
                name,
                cvc,
                month,
                year,
            } => {
                let cvc = match cvc {
                    Some(c) => c,
                    None => prompt_secret("CVC: ")?,
                };
                let card = CreditCard {
                    number,
                    owner_name: name,
                    cvc,
                    valid_month: month,
                    valid_year: year,
                };
                (key, note, card.into_payload())
            }
            ItemArgs::Text {
                key,
                note,
                text,
                file,
            } => {
                let text = match (text, file) {
                    (Some(t), _) => t,
                    (None, Some(path)) => tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                    (None, None) => anyhow::bail!("Must specify text or --file"),
                };
                (key, note, TextData(text).into_payload())
            }
            ItemArgs::Binary { key, note, file } => {
                let data = tokio::fs::read(&file)
                    .await
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                (key, note, BinaryData(data).into_payload())
            }
        };

        if key.is_empty() {
            anyhow::bail!("Item key cannot be empty");
        }
        payload.validate()?;
        Ok(ItemInput { key, note, payload })
    }
}

fn prompt_secret(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read secret")
}

/// Store a new item.
pub async fn add(opts: &Options, args: ItemArgs) -> Result<()> {
    let input = args.resolve().await?;
    let (client, session) = open_session(opts).await?;
    let cipher = unlock(opts, &session)?;

    client
        .create_item(&cipher, &input.key, &input.note, input.payload)
        .await
        .map_err(explain)?;
    println!("Saved '{}'.", input.key);
    Ok(())
}

/// Replace an existing item of the same kind.
pub async fn update(opts: &Options, args: ItemArgs) -> Result<()> {
    let input = args.resolve().await?;
    let (client, session) = open_session(opts).await?;
    let cipher = unlock(opts, &session)?;

    client
        .update_item(&cipher, &input.key, &input.note, input.payload)
        .await
        .map_err(explain)?;
    println!("Updated '{}'.", input.key);
    Ok(())
}

/// Show one decrypted item.
pub async fn get(opts: &Options, key: &str) -> Result<()> {
    let (client, session) = open_session(opts).await?;
    let cipher = unlock(opts, &session)?;

    let item = client.get_item(&cipher, key).await.map_err(explain)?;
    print!("{}", item.item);
    match item.data {
        Some(payload) => print!("{payload}"),
        None if item.item.kind == ItemKind::Binary => {
            println!("Run 'coffer download {key} --out <file>' to fetch the content.")
        }
        None => {}
    }
    Ok(())
}

/// List one page of item metadata.
pub async fn list(opts: &Options, page: u32, limit: u32) -> Result<()> {
    let (client, _session) = open_session(opts).await?;
    let items = client.list_items(page, limit).await.map_err(explain)?;
    print!("{}", render_list(&items));
    Ok(())
}

fn render_list(items: &[ItemMeta]) -> String {
    if items.is_empty() {
        return "No items.\n".to_string();
    }
    let width = items.iter().map(|i| i.key.len()).max().unwrap_or(0).max(3);
    let mut out = format!("{:<width$}  {:<14}  INFO\n", "KEY", "TYPE");
    for item in items {
        out.push_str(&format!(
            "{:<width$}  {:<14}  {}\n",
            item.key,
            item.kind.as_str(),
            item.note
        ));
    }
    out
}

/// Fetch a binary item and write it to `out`.
pub async fn download(opts: &Options, key: &str, out: &Path) -> Result<()> {
    let (client, session) = open_session(opts).await?;
    let cipher = unlock(opts, &session)?;

    let (_, BinaryData(data)) = client
        .get_typed::<BinaryData>(&cipher, key)
        .await
        .map_err(explain)?;
    tokio::fs::write(out, &data)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Wrote {} bytes to {}", data.len(), out.display());
    Ok(())
}

/// Delete an item.
pub async fn delete(opts: &Options, key: &str) -> Result<()> {
    let (client, _session) = open_session(opts).await?;
    client.delete_item(key).await.map_err(explain)?;
    println!("Deleted '{key}'.");
    Ok(())
}
