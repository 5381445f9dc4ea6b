//! Telegram account agent library.
//!
//! This library backs a CLI that operates a Telegram *user* account:
//! - Three-phase login (code → optional 2FA password) across process
//!   boundaries, with the mid-handshake state persisted to disk
//! - Reading, searching, sending and exporting chat messages
//! - A watermark-driven incremental digest of new messages
//! - Pushing chats and messages to an external sync API
//!
//! Every command emits a single JSON object on stdout; all state lives in
//! JSON files under one configuration directory.

pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod lock;
pub mod login;
pub mod store;
pub mod sync;
pub mod watermarks;

// Re-export common types
pub use config::AppCredentials;
pub use error::{Error, Result};
pub use lock::SessionLock;
pub use store::{PendingLogin, SessionData, Store};
pub use watermarks::{Watermark, WatermarkStore, WatermarkUpdate};

// Commands use the re-exported types, so the module is declared last.
pub mod commands;
