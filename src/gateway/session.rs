//! Persisted sign-in
//!
//! Each CLI invocation is a separate process, so the tokens returned at
//! sign-in are kept in a small JSON file and picked up by later commands.

use super::AuthUser;
use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Seconds before expiry at which a token is treated as expired
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Tokens and user of a signed-in session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) at which the access token expires
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    pub fn is_expired(&self, now: i64) -> bool {
        now + EXPIRY_MARGIN_SECS >= self.expires_at
    }
}

/// File-backed store for the session. A store without a path keeps nothing.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: Option<PathBuf>,
}

impl SessionStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// A store that never persists
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the stored session. A missing or unreadable file means no session.
    pub fn load(&self) -> Option<AuthSession> {
        let path = self.path.as_ref()?;
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read session file {:?}: {}", path, e);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("Ignoring corrupt session file {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn save(&self, session: &AuthSession) -> Result<(), GatewayError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GatewayError::Config(format!("Failed to create {:?}: {}", parent, e))
            })?;
        }

        let json = serde_json::to_string_pretty(session)
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        write_private(path, json.as_bytes())
            .map_err(|e| GatewayError::Config(format!("Failed to write {:?}: {}", path, e)))?;

        tracing::debug!("Saved session to {:?}", path);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), GatewayError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        match std::fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!("Removed session file {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GatewayError::Config(format!(
                "Failed to remove {:?}: {}",
                path, e
            ))),
        }
    }
}

/// Write a file only the owner can read. Tokens grant access to the account.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // mode() only applies to newly created files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session() -> AuthSession {
        AuthSession {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: 1_000,
            user: AuthUser {
                id: "u1".into(),
                email: "singer@example.com".into(),
                first_name: Some("Marie".into()),
                last_name: None,
            },
        }
    }

    #[test]
    fn test_expiry_margin() {
        let session = session();
        assert!(!session.is_expired(900));
        assert!(session.is_expired(970));
        assert!(session.is_expired(2_000));
    }

    #[test]
    fn test_save_load_clear() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(Some(dir.path().join("nested/session.json")));

        assert_eq!(store.load(), None);
        store.save(&session()).unwrap();
        assert_eq!(store.load(), Some(session()));

        store.clear().unwrap();
        assert_eq!(store.load(), None);
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        SessionStore::new(Some(path.clone())).save(&session()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_readable_file_made_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        SessionStore::new(Some(path.clone())).save(&session()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(SessionStore::new(Some(path)).load(), Some(session()));
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be
        let store = SessionStore::new(Some(dir.path().to_path_buf()));
        assert!(matches!(
            store.save(&session()),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_corrupt_file_is_no_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(SessionStore::new(Some(path)).load(), None);
    }

    #[test]
    fn test_disabled_store_keeps_nothing() {
        let store = SessionStore::disabled();
        store.save(&session()).unwrap();
        assert_eq!(store.load(), None);
        assert!(store.path().is_none());
    }
}
