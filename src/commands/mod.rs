//! Command implementations.
//!
//! Each module corresponds to a subcommand in the CLI and returns the JSON
//! object the process prints on success.

pub mod chats;
pub mod contacts;
pub mod create_group;
pub mod digest;
pub mod history;
pub mod info;
pub mod invite_link;
pub mod leave;
pub mod login;
pub mod logout;
pub mod read;
pub mod search;
pub mod send;
pub mod sync_all;
pub mod unread;
pub mod watermarks;
