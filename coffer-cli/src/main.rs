//! # coffer
//!
//! Command-line front end for the Coffer secret vault.
//!
//! ## Commands
//!
//! - `register` / `login`: Authenticate and save a session
//! - `logout`: Forget the session
//! - `add` / `update`: Encrypt and store an item
//! - `get`, `list`, `download`, `delete`: Read and manage items
//!
//! ## Example
//!
//! ```bash
//! # Create an account (prompts for the password)
//! coffer --server https://localhost:8080 --ca-cert .ssl/server.crt register --user alice
//!
//! # Store a login
//! coffer add login-password mail --login alice@mail.example --note "work"
//!
//! # Read it back
//! coffer get mail
//!
//! # Store and fetch a file
//! coffer add binary passport --file scan.pdf
//! coffer download passport --out scan.pdf
//! ```
//!
//! Items are encrypted with a key derived from the account password, so the
//! password is asked for again by every command that reads or writes content.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::items::ItemArgs;
use commands::{auth, items, Options};
use coffer_types::api::{DEFAULT_LIMIT, DEFAULT_PAGE};

/// Command-line client for the Coffer secret vault.
#[derive(Parser)]
#[command(name = "coffer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for storing the session
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Server URL (defaults to the saved session's server)
    #[arg(long, global = true, env = "COFFER_SERVER")]
    server: Option<String>,

    /// PEM certificate to trust in addition to the system roots
    #[arg(long, global = true, env = "COFFER_CA_CERT")]
    ca_cert: Option<PathBuf>,

    /// Account password (will prompt if not provided)
    #[arg(long, global = true, env = "COFFER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and log in
    Register {
        /// Account name
        #[arg(long, short)]
        user: String,
    },

    /// Log in to an existing account
    Login {
        /// Account name
        #[arg(long, short)]
        user: String,
    },

    /// Forget the saved session
    Logout,

    /// Store a new item
    Add {
        #[command(subcommand)]
        item: ItemArgs,
    },

    /// Replace an existing item of the same type
    Update {
        #[command(subcommand)]
        item: ItemArgs,
    },

    /// Show a decrypted item
    Get {
        /// Item key
        key: String,
    },

    /// List item keys, types and notes
    List {
        /// Page number, starting at 1
        #[arg(long, default_value_t = DEFAULT_PAGE)]
        page: u32,

        /// Items per page
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,
    },

    /// Save the content of a binary item to a file
    Download {
        /// Item key
        key: String,

        /// Output file
        #[arg(long, short)]
        out: PathBuf,
    },

    /// Delete an item
    Delete {
        /// Item key
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    config::set_dir_permissions_0700(&data_dir).await?;

    let opts = Options {
        data_dir,
        server: cli.server,
        ca_cert: cli.ca_cert,
        password: cli.password,
    };

    match cli.command {
        Commands::Register { user } => auth::register(&opts, &user).await?,
        Commands::Login { user } => auth::login(&opts, &user).await?,
        Commands::Logout => auth::logout(&opts).await?,
        Commands::Add { item } => items::add(&opts, item).await?,
        Commands::Update { item } => items::update(&opts, item).await?,
        Commands::Get { key } => items::get(&opts, &key).await?,
        Commands::List { page, limit } => {
            if page == 0 || limit == 0 {
                anyhow::bail!("--page and --limit must be at least 1");
            }
            items::list(&opts, page, limit).await?
        }
        Commands::Download { key, out } => items::download(&opts, &key, &out).await?,
        Commands::Delete { key } => items::delete(&opts, &key).await?,
    }

    Ok(())
}

/// Get the default data directory for coffer.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "coffer", "coffer")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
