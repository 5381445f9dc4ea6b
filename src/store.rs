//! File-backed stores for the session and the in-flight login.
//!
//! Each process loads, uses, optionally mutates, and exits; the files are
//! the only long-lived state. Corrupt or missing files read as absent.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::{self, PENDING_FILE, SESSION_FILE};
use crate::error::{Error, Result};

/// Authenticated account state, one per account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub api_id: i32,
    pub api_hash: String,
    pub phone: String,
    pub session_string: String,
    pub authenticated_at: String,
}

/// Single-slot in-flight login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingLogin {
    pub phone: String,
    pub phone_code_hash: String,
    pub session_string: String,
    pub api_id: i32,
    pub api_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl PendingLogin {
    pub fn is_two_factor(&self) -> bool {
        self.phase.as_deref() == Some("2fa")
    }
}

/// Store rooted at the state directory; injected into every operation so
/// tests can point it at a temp dir.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open_default() -> Self {
        Self::new(config::state_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    pub fn pending_path(&self) -> PathBuf {
        self.dir.join(PENDING_FILE)
    }

    /// Load the session. `NotConnected` if absent, `InvalidSession` if the
    /// file cannot be parsed or misses required fields.
    pub fn load_session(&self) -> Result<SessionData> {
        let raw = match fs::read_to_string(self.session_path()) {
            Ok(raw) => raw,
            Err(_) => return Err(Error::NotConnected),
        };

        let data: SessionData =
            serde_json::from_str(&raw).map_err(|_| Error::InvalidSession)?;
        if data.session_string.is_empty() || data.api_id == 0 || data.api_hash.is_empty() {
            return Err(Error::InvalidSession);
        }
        Ok(data)
    }

    pub fn session_exists(&self) -> bool {
        self.session_path().exists()
    }

    pub fn save_session(
        &self,
        api_id: i32,
        api_hash: &str,
        phone: &str,
        session_string: &str,
    ) -> Result<()> {
        let data = SessionData {
            api_id,
            api_hash: api_hash.to_string(),
            phone: phone.to_string(),
            session_string: session_string.to_string(),
            authenticated_at: Utc::now().to_rfc3339(),
        };
        self.write_secret(&self.session_path(), &serde_json::to_string_pretty(&data)?)
    }

    pub fn clear_session(&self) {
        let _ = fs::remove_file(self.session_path());
    }

    /// Load the pending login. Absent and corrupt files are the same error:
    /// the caller has to restart from `request-code` either way.
    pub fn load_pending(&self) -> Result<PendingLogin> {
        let raw =
            fs::read_to_string(self.pending_path()).map_err(|_| Error::NoPendingLogin)?;
        serde_json::from_str(&raw).map_err(|_| Error::NoPendingLogin)
    }

    pub fn save_pending(&self, pending: &PendingLogin) -> Result<()> {
        self.write_secret(
            &self.pending_path(),
            &serde_json::to_string_pretty(pending)?,
        )
    }

    pub fn clear_pending(&self) {
        let _ = fs::remove_file(self.pending_path());
    }

    fn write_secret(&self, path: &Path, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pending_fixture() -> PendingLogin {
        PendingLogin {
            phone: "+15550001111".to_string(),
            phone_code_hash: "hash123".to_string(),
            session_string: "c2Vzc2lvbg==".to_string(),
            api_id: 1234,
            api_hash: "abcd".to_string(),
            phase: None,
        }
    }

    #[test]
    fn session_round_trip() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        store
            .save_session(1234, "abcd", "+15550001111", "c2Vzc2lvbg==")
            .unwrap();

        let loaded = store.load_session().unwrap();
        assert_eq!(loaded.api_id, 1234);
        assert_eq!(loaded.api_hash, "abcd");
        assert_eq!(loaded.phone, "+15550001111");
        assert_eq!(loaded.session_string, "c2Vzc2lvbg==");
        assert!(!loaded.authenticated_at.is_empty());
    }

    #[test]
    fn missing_session_is_not_connected() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        assert_eq!(store.load_session().unwrap_err().code(), "NOT_CONNECTED");
    }

    #[test]
    fn corrupt_session_is_invalid() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(store.session_path(), "not json{{{").unwrap();

        assert_eq!(store.load_session().unwrap_err().code(), "INVALID_SESSION");
    }

    #[test]
    fn empty_session_string_is_invalid() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        store.save_session(1234, "abcd", "+1", "").unwrap();

        assert_eq!(store.load_session().unwrap_err().code(), "INVALID_SESSION");
    }

    #[test]
    fn pending_round_trip() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        let pending = pending_fixture();
        store.save_pending(&pending).unwrap();
        assert_eq!(store.load_pending().unwrap(), pending);
    }

    #[test]
    fn pending_phase_survives_round_trip() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        let mut pending = pending_fixture();
        pending.phase = Some("2fa".to_string());
        store.save_pending(&pending).unwrap();

        let loaded = store.load_pending().unwrap();
        assert!(loaded.is_two_factor());
    }

    #[test]
    fn phase_absent_when_none() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        store.save_pending(&pending_fixture()).unwrap();

        let raw = fs::read_to_string(store.pending_path()).unwrap();
        assert!(!raw.contains("phase"));
        assert!(raw.contains("phoneCodeHash"));
    }

    #[test]
    fn missing_or_corrupt_pending_is_no_pending() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        assert_eq!(store.load_pending().unwrap_err().code(), "NO_PENDING");

        fs::create_dir_all(dir.path()).unwrap();
        fs::write(store.pending_path(), "}{").unwrap();
        assert_eq!(store.load_pending().unwrap_err().code(), "NO_PENDING");
    }

    #[test]
    fn save_pending_overwrites_previous() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        store.save_pending(&pending_fixture()).unwrap();
        let mut second = pending_fixture();
        second.phone = "+15559998888".to_string();
        store.save_pending(&second).unwrap();

        assert_eq!(store.load_pending().unwrap().phone, "+15559998888");
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());

        store.clear_pending();
        store.clear_session();

        store.save_pending(&pending_fixture()).unwrap();
        store.clear_pending();
        store.clear_pending();
        assert!(store.load_pending().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn secret_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        store.save_session(1234, "abcd", "+1", "s").unwrap();

        let mode = fs::metadata(store.session_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn store_creates_directory_tree() {
        let dir = tempdir().unwrap();
        let deep = dir.path().join("a").join("b");
        let store = Store::new(&deep);

        store.save_pending(&pending_fixture()).unwrap();
        assert!(deep.join(PENDING_FILE).exists());
    }
}
