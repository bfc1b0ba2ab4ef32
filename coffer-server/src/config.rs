//! Configuration loading for coffer-server.
//!
//! Configuration is loaded from a TOML file (default: `coffer.toml`), then
//! environment overrides are applied, then command-line flags.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Environment variable overriding `server.bind_address`.
pub const ENV_RUN_ADDRESS: &str = "RUN_ADDRESS";
/// Environment variable overriding `storage.database`.
pub const ENV_DATABASE_URI: &str = "DATABASE_URI";
/// Environment variable overriding `tls.cert_path`.
pub const ENV_SSL_CERT_PATH: &str = "SSL_CERT_PATH";
/// Environment variable overriding `tls.key_path`.
pub const ENV_SSL_KEY_PATH: &str = "SSL_KEY_PATH";
/// Environment variable overriding `auth.token_secret`.
pub const ENV_TOKEN_SECRET: &str = "TOKEN_SECRET";

/// Root configuration for coffer-server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener configuration.
    pub server: ServerConfig,
    /// TLS certificate and key.
    pub tls: TlsConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Token configuration.
    pub auth: AuthConfig,
    /// Log filter.
    pub log: LogConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTPS listener (default: localhost:8080).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Seconds in-flight requests get to finish on shutdown (default: 30).
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

/// TLS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// PEM certificate chain (default: .ssl/server.crt).
    #[serde(default = "default_cert_path")]
    pub cert_path: PathBuf,
    /// PEM private key (default: .ssl/server.key).
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
    /// Connection pool size (default: 10).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Largest accepted request body in bytes (default: 16MB).
    #[serde(default = "default_max_item_size")]
    pub max_item_size: usize,
}

/// Token configuration.
#[derive(Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// HMAC signing secret. A random one is generated per process when unset,
    /// which invalidates every token on restart.
    pub token_secret: Option<String>,
    /// Token lifetime in seconds. Tokens never expire when unset.
    pub token_ttl_secs: Option<u64>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default value functions
fn default_bind_address() -> String {
    "localhost:8080".to_string()
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

fn default_cert_path() -> PathBuf {
    PathBuf::from(".ssl/server.crt")
}

fn default_key_path() -> PathBuf {
    PathBuf::from(".ssl/server.key")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("coffer.db")
}

fn default_max_connections() -> u32 {
    10
}

fn default_max_item_size() -> usize {
    16 * 1024 * 1024 // 16MB
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: default_cert_path(),
            key_path: default_key_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            max_connections: default_max_connections(),
            max_item_size: default_max_item_size(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "token_secret",
                &self.token_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(addr) = get(ENV_RUN_ADDRESS) {
            self.server.bind_address = addr;
        }
        if let Some(db) = get(ENV_DATABASE_URI) {
            self.storage.database = PathBuf::from(db);
        }
        if let Some(cert) = get(ENV_SSL_CERT_PATH) {
            self.tls.cert_path = PathBuf::from(cert);
        }
        if let Some(key) = get(ENV_SSL_KEY_PATH) {
            self.tls.key_path = PathBuf::from(key);
        }
        if let Some(secret) = get(ENV_TOKEN_SECRET) {
            self.auth.token_secret = Some(secret);
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.server.bind_address, "localhost:8080");
        assert_eq!(config.server.shutdown_grace_secs, 30);
        assert_eq!(config.storage.database, PathBuf::from("coffer.db"));
        assert_eq!(config.tls.cert_path, PathBuf::from(".ssl/server.crt"));
        assert!(config.auth.token_secret.is_none());
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
bind_address = "0.0.0.0:8443"
shutdown_grace_secs = 5

[tls]
cert_path = "/etc/coffer/cert.pem"
key_path = "/etc/coffer/key.pem"

[storage]
database = "/data/coffer.db"
max_connections = 4

[auth]
token_secret = "correct horse"
token_ttl_secs = 3600

[log]
filter = "coffer_server=debug"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8443");
        assert_eq!(config.server.shutdown_grace_secs, 5);
        assert_eq!(config.tls.key_path, PathBuf::from("/etc/coffer/key.pem"));
        assert_eq!(config.storage.database, PathBuf::from("/data/coffer.db"));
        assert_eq!(config.storage.max_connections, 4);
        assert_eq!(config.auth.token_secret.as_deref(), Some("correct horse"));
        assert_eq!(config.auth.token_ttl_secs, Some(3600));
        assert_eq!(config.log.filter, "coffer_server=debug");
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: Config = toml::from_str("[storage]\nmax_connections = 2\n").unwrap();
        assert_eq!(config.storage.max_connections, 2);
        assert_eq!(config.storage.max_item_size, 16 * 1024 * 1024);
        assert_eq!(config.server.bind_address, "localhost:8080");
        assert_eq!(config.tls.key_path, PathBuf::from(".ssl/server.key"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config: Config = toml::from_str("[server]\nbind_address = \"127.0.0.1:1\"\n").unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_RUN_ADDRESS, "127.0.0.1:9000"),
            (ENV_DATABASE_URI, "/tmp/vault.db"),
            (ENV_TOKEN_SECRET, "from-env"),
            (ENV_SSL_KEY_PATH, ""),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.storage.database, PathBuf::from("/tmp/vault.db"));
        assert_eq!(config.auth.token_secret.as_deref(), Some("from-env"));
        // empty value ignored
        assert_eq!(config.tls.key_path, PathBuf::from(".ssl/server.key"));
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let config = AuthConfig {
            token_secret: Some("hunter2".into()),
            token_ttl_secs: None,
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbind_address = 42").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));

        let missing = Config::from_file(std::path::Path::new("/nonexistent/coffer.toml"));
        assert!(matches!(missing, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn example_file_matches_defaults() {
        let config: Config = toml::from_str(include_str!("../coffer.toml.example")).unwrap();
        let defaults = Config::default();
        assert_eq!(config.server.bind_address, defaults.server.bind_address);
        assert_eq!(config.tls.key_path, defaults.tls.key_path);
        assert_eq!(config.storage.max_item_size, defaults.storage.max_item_size);
        assert!(config.auth.token_secret.is_none());
        assert_eq!(config.log.filter, "info");
    }
}
