//! # coffer-server
//!
//! HTTPS vault server for Coffer.
//!
//! The server:
//! - Registers users and issues signed bearer tokens
//! - Stores per-user items of four kinds (login/password, card, text, binary)
//! - Never sees plaintext: sensitive fields arrive already encrypted by the
//!   client and are stored and returned verbatim
//!
//! ## Architecture
//!
//! ```text
//! coffer CLI ──┐
//!              │   HTTPS + X-Auth-Token
//!              ▼
//!        ┌────────────────────────────┐
//!        │  axum router               │
//!        │   ├─ /api/user/*  (public) │
//!        │   └─ /api/item/*  (gated)  │
//!        │  ┌──────────────────────┐  │
//!        │  │ SQLite (users/items) │  │
//!        │  └──────────────────────┘  │
//!        └────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod server;
pub mod storage;

pub use server::{run, VaultServer};
