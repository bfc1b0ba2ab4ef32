//! `GET /health`: liveness plus a storage round trip. Unauthenticated.

use crate::server::VaultServer;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Health report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// `ok` when the vault can serve requests, `unavailable` otherwise.
    pub status: &'static str,
    /// Server version.
    pub version: &'static str,
    pub uptime_seconds: u64,
    /// `ok` or `unreachable`.
    pub storage: &'static str,
}

impl HealthStatus {
    fn new(server: &VaultServer, storage_ok: bool) -> Self {
        Self {
            status: if storage_ok { "ok" } else { "unavailable" },
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: server.uptime().as_secs(),
            storage: if storage_ok { "ok" } else { "unreachable" },
        }
    }
}

/// Answers 200 when storage responds and 503 when it does not.
pub async fn health_handler(
    Extension(server): Extension<Arc<VaultServer>>,
) -> (StatusCode, Json<HealthStatus>) {
    match server.storage().ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthStatus::new(&server, true))),
        Err(e) => {
            warn!(error = %e, "health check: storage unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthStatus::new(&server, false)),
            )
        }
    }
}
