//! Configuration: state directory and credential resolution.
//!
//! All persistent state lives under one directory (default
//! `~/.config/telegram-agent`, overridable with `TELEGRAM_AGENT_DIR`).
//! App credentials resolve CLI args → environment → `app.json`, in that
//! order; sync API credentials resolve environment → `sync.json`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const SESSION_FILE: &str = "session.json";
pub const PENDING_FILE: &str = "pending.json";
pub const WATERMARKS_FILE: &str = "watermarks.json";
pub const APP_FILE: &str = "app.json";
pub const SYNC_FILE: &str = "sync.json";
pub const LOCK_FILE: &str = "session.lock";

pub const DEFAULT_SYNC_API_BASE: &str = "https://beta.seedclub.com";

/// Resolve the state directory.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TELEGRAM_AGENT_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".config").join("telegram-agent")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppFile {
    api_id: Option<i32>,
    api_hash: Option<String>,
}

/// Telegram application credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppCredentials {
    pub api_id: i32,
    pub api_hash: String,
}

/// Resolve api_id/api_hash from CLI overrides, environment, or `app.json`.
pub fn load_app_credentials(
    dir: &Path,
    cli_api_id: Option<i32>,
    cli_api_hash: Option<String>,
) -> Result<AppCredentials> {
    let mut api_id = cli_api_id
        .or_else(|| env_i32("TELEGRAM_API_ID"))
        .unwrap_or(0);
    let mut api_hash = cli_api_hash
        .or_else(|| std::env::var("TELEGRAM_API_HASH").ok())
        .unwrap_or_default();

    if api_id == 0 || api_hash.is_empty() {
        if let Ok(raw) = std::fs::read_to_string(dir.join(APP_FILE)) {
            if let Ok(app) = serde_json::from_str::<AppFile>(&raw) {
                if api_id == 0 {
                    api_id = app.api_id.unwrap_or(0);
                }
                if api_hash.is_empty() {
                    api_hash = app.api_hash.unwrap_or_default();
                }
            }
        }
    }

    if api_id == 0 || api_hash.is_empty() {
        return Err(Error::NoAppCredentials);
    }

    Ok(AppCredentials { api_id, api_hash })
}

fn env_i32(key: &str) -> Option<i32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncFile {
    token: Option<String>,
    api_base: Option<String>,
}

/// Sync API endpoint and bearer token.
#[derive(Debug, Clone)]
pub struct SyncCredentials {
    pub api_base: String,
    pub token: String,
}

/// Resolve sync API credentials from environment or `sync.json`.
pub fn load_sync_credentials(dir: &Path) -> Result<SyncCredentials> {
    let mut token = std::env::var("SYNC_API_TOKEN").ok().unwrap_or_default();
    let mut api_base = std::env::var("SYNC_API_URL")
        .unwrap_or_else(|_| DEFAULT_SYNC_API_BASE.to_string());

    if token.is_empty() {
        if let Ok(raw) = std::fs::read_to_string(dir.join(SYNC_FILE)) {
            if let Ok(sync) = serde_json::from_str::<SyncFile>(&raw) {
                token = sync.token.unwrap_or_default();
                if let Some(base) = sync.api_base {
                    api_base = base;
                }
            }
        }
    }

    if token.is_empty() {
        return Err(Error::SyncError(
            "Not connected to the sync API. Set SYNC_API_TOKEN or create sync.json.".to_string(),
        ));
    }

    Ok(SyncCredentials { api_base, token })
}
