//! Watermark tracking for the incremental digest.
//!
//! Stores `{ chatId: { lastMessageId, lastRunAt, chatName } }` in a local
//! JSON file. The watermark records what the *agent* has processed,
//! independent of Telegram's unread counts (which clear whenever the user
//! opens the app).

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::WATERMARKS_FILE;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    pub last_message_id: i32,
    pub last_run_at: String,
    #[serde(default)]
    pub chat_name: Option<String>,
}

/// A single cursor advance produced by a digest run.
#[derive(Debug, Clone)]
pub struct WatermarkUpdate {
    pub chat_id: String,
    pub message_id: i32,
    pub chat_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WatermarkStore {
    dir: PathBuf,
}

impl WatermarkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(WATERMARKS_FILE)
    }

    /// Load all watermarks. Missing or corrupt files read as empty.
    pub fn load(&self) -> BTreeMap<String, Watermark> {
        match fs::read_to_string(self.path()) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        }
    }

    pub fn save(&self, watermarks: &BTreeMap<String, Watermark>) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(), serde_json::to_string_pretty(watermarks)?)?;
        Ok(())
    }

    /// Last seen message id for a chat, if it has ever been digested.
    pub fn get(&self, chat_id: &str) -> Option<i32> {
        self.load().get(chat_id).map(|w| w.last_message_id)
    }

    pub fn set(&self, chat_id: &str, message_id: i32, chat_name: Option<&str>) -> Result<()> {
        self.set_batch(&[WatermarkUpdate {
            chat_id: chat_id.to_string(),
            message_id,
            chat_name: chat_name.map(str::to_string),
        }])
    }

    /// Apply several cursor advances in one write. Entries not present in
    /// the batch are preserved; entries present are replaced entirely.
    pub fn set_batch(&self, updates: &[WatermarkUpdate]) -> Result<()> {
        let mut watermarks = self.load();
        let now = Utc::now().to_rfc3339();

        for update in updates {
            watermarks.insert(
                update.chat_id.clone(),
                Watermark {
                    last_message_id: update.message_id,
                    last_run_at: now.clone(),
                    chat_name: update.chat_name.clone(),
                },
            );
        }

        self.save(&watermarks)
    }

    /// Delete all watermarks; the next digest processes everything fresh.
    pub fn clear(&self) {
        let _ = fs::remove_file(self.path());
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn update(chat_id: &str, message_id: i32, name: Option<&str>) -> WatermarkUpdate {
        WatermarkUpdate {
            chat_id: chat_id.to_string(),
            message_id,
            chat_name: name.map(str::to_string),
        }
    }

    #[test]
    fn load_empty_when_missing() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());

        let mut data = BTreeMap::new();
        data.insert(
            "123".to_string(),
            Watermark {
                last_message_id: 456,
                last_run_at: "2026-02-10T12:00:00+00:00".to_string(),
                chat_name: Some("Test Chat".to_string()),
            },
        );
        store.save(&data).unwrap();

        assert_eq!(store.load(), data);
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());
        fs::write(store.path(), "not json{{{").unwrap();

        assert!(store.load().is_empty());
    }

    #[test]
    fn creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let deep = dir.path().join("a").join("b").join("c");
        let store = WatermarkStore::new(&deep);

        store.set("x", 1, None).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn get_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());
        assert_eq!(store.get("999"), None);
    }

    #[test]
    fn set_and_get() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());

        store.set("123", 500, Some("Test Chat")).unwrap();
        assert_eq!(store.get("123"), Some(500));
    }

    #[test]
    fn set_updates_existing() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());

        store.set("123", 100, Some("Chat")).unwrap();
        store.set("123", 200, Some("Chat")).unwrap();
        assert_eq!(store.get("123"), Some(200));
    }

    #[test]
    fn multiple_chats_are_independent() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());

        store.set("111", 10, Some("Chat A")).unwrap();
        store.set("222", 20, Some("Chat B")).unwrap();
        assert_eq!(store.get("111"), Some(10));
        assert_eq!(store.get("222"), Some(20));
    }

    #[test]
    fn set_stores_metadata() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());

        store.set("123", 500, Some("My Chat")).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["123"]["chatName"], "My Chat");
        assert!(parsed["123"]["lastRunAt"].is_string());
        assert_eq!(parsed["123"]["lastMessageId"], 500);
    }

    #[test]
    fn batch_update_sets_all() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());

        store
            .set_batch(&[
                update("111", 100, Some("A")),
                update("222", 200, Some("B")),
                update("333", 300, None),
            ])
            .unwrap();

        assert_eq!(store.get("111"), Some(100));
        assert_eq!(store.get("222"), Some(200));
        assert_eq!(store.get("333"), Some(300));
    }

    #[test]
    fn batch_preserves_existing() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());

        store.set("111", 50, Some("Old")).unwrap();
        store.set_batch(&[update("222", 200, None)]).unwrap();

        assert_eq!(store.get("111"), Some(50));
        assert_eq!(store.get("222"), Some(200));
    }

    #[test]
    fn batch_overwrites_existing() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());

        store.set("111", 50, Some("Old")).unwrap();
        store.set_batch(&[update("111", 999, Some("New"))]).unwrap();

        assert_eq!(store.get("111"), Some(999));
        let loaded = store.load();
        assert_eq!(loaded["111"].chat_name.as_deref(), Some("New"));
    }

    #[test]
    fn clear_removes_file() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());

        store.set("123", 100, None).unwrap();
        store.clear();

        assert!(store.load().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn clear_nonexistent_does_not_panic() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());
        store.clear();
    }
}
