//! Server state and the HTTPS run loop.
//!
//! [`VaultServer`] owns the storage backend and token authority shared by all
//! handlers. [`run`] serves the router over TLS until SIGINT or SIGTERM, then
//! drains in-flight requests for the configured grace period and closes the
//! pool.

use crate::auth::TokenAuthority;
use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::http::build_router;
use crate::storage::{SqliteStorage, VaultStorage};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Shared state behind every request.
pub struct VaultServer {
    config: Config,
    storage: Arc<dyn VaultStorage>,
    tokens: TokenAuthority,
    started: Instant,
}

impl std::fmt::Debug for VaultServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultServer")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl VaultServer {
    /// Create a server over the given storage and token authority.
    pub fn new(config: Config, storage: Arc<dyn VaultStorage>, tokens: TokenAuthority) -> Self {
        Self {
            config,
            storage,
            tokens,
            started: Instant::now(),
        }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get access to the storage layer.
    pub fn storage(&self) -> &dyn VaultStorage {
        self.storage.as_ref()
    }

    /// Get the token authority.
    pub fn tokens(&self) -> &TokenAuthority {
        &self.tokens
    }

    /// Time since this server state was created.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Resolve `host:port`, accepting names such as `localhost`.
async fn resolve(bind_address: &str) -> Result<SocketAddr> {
    tokio::net::lookup_host(bind_address)
        .await
        .map_err(|e| ServerError::Resolve(format!("{bind_address}: {e}")))?
        .next()
        .ok_or_else(|| ServerError::Resolve(bind_address.to_string()))
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Serve until a shutdown signal arrives.
pub async fn run(config: Config) -> Result<()> {
    // Err means a provider is already installed
    let _ = rustls::crypto::ring::default_provider().install_default();

    let storage = SqliteStorage::new(&config.storage).await?;
    let tokens = TokenAuthority::from_config(&config.auth)?;

    let tls = RustlsConfig::from_pem_file(&config.tls.cert_path, &config.tls.key_path)
        .await
        .map_err(|source| ServerError::Tls {
            cert: config.tls.cert_path.clone(),
            key: config.tls.key_path.clone(),
            source,
        })?;
    let addr = resolve(&config.server.bind_address).await?;
    let grace = Duration::from_secs(config.server.shutdown_grace_secs);

    let server = Arc::new(VaultServer::new(
        config,
        Arc::new(storage.clone()),
        tokens,
    ));
    let app = build_router(server);

    let handle = Handle::new();
    let signal_handle = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!(grace_secs = grace.as_secs(), "shutting down");
        signal_handle.graceful_shutdown(Some(grace));
    });

    info!(%addr, "listening on https://{addr}");
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    storage.close().await;
    info!("shutdown complete");
    Ok(())
}
