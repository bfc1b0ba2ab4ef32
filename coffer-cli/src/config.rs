//! Session file management for the coffer CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const SESSION_FILE: &str = "session.json";

/// Server used when neither a flag nor a saved session names one.
pub const DEFAULT_SERVER: &str = "https://localhost:8080";

/// Logged-in session stored locally.
#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    /// Server base URL.
    pub server: String,
    /// Account name, also the key-derivation salt.
    pub username: String,
    /// Bearer token issued at login.
    pub token: String,
}

impl Session {
    /// Create a session record.
    pub fn new(server: &str, username: &str, token: &str) -> Self {
        Self {
            server: server.to_string(),
            username: username.to_string(),
            token: token.to_string(),
        }
    }

    fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(SESSION_FILE)
    }

    /// Load the session from a directory.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(Self::path(data_dir))
            .await
            .context("Not logged in. Run 'coffer login --user <name>' first.")?;
        let session: Self = serde_json::from_str(&contents).context("Invalid session file")?;
        debug!(server = %session.server, username = %session.username, "session loaded");
        Ok(session)
    }

    /// Load the session if one exists.
    pub async fn load_optional(data_dir: &Path) -> Result<Option<Self>> {
        if Self::exists(data_dir).await {
            Self::load(data_dir).await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Save the session to a directory, readable by the owner only.
    ///
    /// A new file is created with mode 0600, so the token is never readable
    /// by others even briefly.
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = Self::path(data_dir);
        let contents = serde_json::to_string_pretty(self)?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options
            .open(&path)
            .await
            .context("Failed to save session")?;
        // mode only applies at creation; tighten a file left by older runs
        set_file_permissions_0600(&path).await?;
        file.write_all(contents.as_bytes())
            .await
            .context("Failed to save session")?;
        file.flush().await.context("Failed to save session")?;

        debug!(path = %path.display(), "session saved");
        Ok(())
    }

    /// Remove the session file. Returns whether one existed.
    pub async fn remove(data_dir: &Path) -> Result<bool> {
        if !Self::exists(data_dir).await {
            return Ok(false);
        }
        tokio::fs::remove_file(Self::path(data_dir))
            .await
            .context("Failed to remove session")?;
        debug!(dir = %data_dir.display(), "session removed");
        Ok(true)
    }

    /// Check if a session is saved.
    pub async fn exists(data_dir: &Path) -> bool {
        Self::path(data_dir).exists()
    }
}

// Don't leak the token in debug output
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn session_roundtrip() {
        let dir = tempdir().unwrap();
        let session = Session::new("https://vault.example", "alice", "tok.en.sig");
        session.save(dir.path()).await.unwrap();

        let loaded = Session::load(dir.path()).await.unwrap();
        assert_eq!(loaded.server, "https://vault.example");
        assert_eq!(loaded.username, "alice");
        assert_eq!(loaded.token, "tok.en.sig");
    }

    #[tokio::test]
    async fn missing_session_is_reported() {
        let dir = tempdir().unwrap();
        let err = Session::load(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("Not logged in"));
        assert!(Session::load_optional(dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_session() {
        let dir = tempdir().unwrap();
        assert!(!Session::remove(dir.path()).await.unwrap());

        Session::new("s", "u", "t").save(dir.path()).await.unwrap();
        assert!(Session::exists(dir.path()).await);
        assert!(Session::remove(dir.path()).await.unwrap());
        assert!(!Session::exists(dir.path()).await);
    }

    #[tokio::test]
    async fn corrupt_session_rejected() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join(SESSION_FILE), "{not json")
            .await
            .unwrap();
        let err = Session::load(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid session file"));
    }

    #[test]
    fn session_debug_hides_token() {
        let debug = format!("{:?}", Session::new("s", "alice", "very-secret-token"));
        assert!(debug.contains("alice"));
        assert!(!debug.contains("very-secret-token"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn session_file_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        Session::new("s", "u", "t").save(dir.path()).await.unwrap();

        let path = dir.path().join(SESSION_FILE);
        let perms = tokio::fs::metadata(&path).await.unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600, "file should be 0600");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn save_tightens_existing_session_file() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        tokio::fs::write(&path, "{\"stale\": true, \"padding\": \"longer than the new file\"}")
            .await
            .unwrap();
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))
            .await
            .unwrap();

        Session::new("s", "u", "t").save(dir.path()).await.unwrap();

        let perms = tokio::fs::metadata(&path).await.unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
        let loaded = Session::load(dir.path()).await.unwrap();
        assert_eq!(loaded.token, "t");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn data_dir_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("coffer-data");
        tokio::fs::create_dir_all(&data_dir).await.unwrap();
        set_dir_permissions_0700(&data_dir).await.unwrap();

        let perms = tokio::fs::metadata(&data_dir).await.unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o700, "dir should be 0700");
    }
}
